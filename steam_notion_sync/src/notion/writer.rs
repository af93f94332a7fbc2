//! Applies create and update decisions as Notion page writes

use super::database::{NOTES, PLATFORM, PLAYTIME, RELEASE_DATE};
use super::{NotionClient, NotionDatabase};
use crate::error::Result;
use crate::reconcile::ChangeSet;
use game_common::GameRecord;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Destination of reconciled games
#[allow(async_fn_in_trait)]
pub trait DestinationWriter {
    /// Insert a record with its full field set, returning the new page id
    async fn create(&self, record: &GameRecord) -> Result<String>;

    /// Write only the fields marked in `changes`
    async fn update(&self, record: &GameRecord, page_id: &str, changes: &ChangeSet) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
}

fn external(url: &str) -> Value {
    json!({ "type": "external", "external": { "url": url } })
}

fn playtime_property(record: &GameRecord) -> Value {
    json!({ "type": "number", "number": record.playtime_hours() })
}

fn release_date_property(record: &GameRecord) -> Option<Value> {
    record.release_date.map(|date| {
        json!({ "type": "date", "date": { "start": date.format("%Y-%m-%d").to_string() } })
    })
}

/// Page body for a new game
pub fn create_payload(record: &GameRecord, database: &NotionDatabase, use_bg_cover: bool) -> Value {
    let mut properties = Map::new();
    properties.insert(
        database.title_property.clone(),
        json!({
            "type": "title",
            "title": [{ "type": "text", "text": { "content": record.name() } }]
        }),
    );
    if database.has_property(PLATFORM, "multi_select") {
        let platforms: Vec<Value> = record
            .platforms
            .iter()
            .map(|p| json!({ "name": p }))
            .collect();
        properties.insert(
            PLATFORM.to_string(),
            json!({ "type": "multi_select", "multi_select": platforms }),
        );
    }
    if database.has_property(PLAYTIME, "number") {
        properties.insert(PLAYTIME.to_string(), playtime_property(record));
    }
    if database.has_property(RELEASE_DATE, "date") {
        if let Some(date) = release_date_property(record) {
            properties.insert(RELEASE_DATE.to_string(), date);
        }
    }
    if database.has_property(NOTES, "rich_text") {
        let note = format!("Playtime: {}", record.playtime_label());
        properties.insert(
            NOTES.to_string(),
            json!({
                "type": "rich_text",
                "rich_text": [{ "type": "text", "text": { "content": note } }]
            }),
        );
    }

    let mut payload = json!({
        "parent": { "database_id": database.database_id },
        "properties": properties,
    });
    if let Some(icon) = record.icon() {
        payload["icon"] = external(icon);
    }
    if let Some(cover) = record.cover_uri(use_bg_cover) {
        payload["cover"] = external(cover);
    }
    payload
}

/// Partial page body for the changed fields, `None` when nothing changed
pub fn update_payload(
    record: &GameRecord,
    database: &NotionDatabase,
    changes: &ChangeSet,
    use_bg_cover: bool,
) -> Option<Value> {
    let mut properties = Map::new();
    if changes.playtime && database.has_property(PLAYTIME, "number") {
        properties.insert(PLAYTIME.to_string(), playtime_property(record));
    }
    if changes.release_date && database.has_property(RELEASE_DATE, "date") {
        if let Some(date) = release_date_property(record) {
            properties.insert(RELEASE_DATE.to_string(), date);
        }
    }

    let mut payload = Map::new();
    if !properties.is_empty() {
        payload.insert("properties".to_string(), Value::Object(properties));
    }
    if changes.cover {
        if let Some(cover) = record.cover_uri(use_bg_cover) {
            payload.insert("cover".to_string(), external(cover));
        }
    }

    if payload.is_empty() {
        None
    } else {
        Some(Value::Object(payload))
    }
}

/// Writes pages into one connected database
pub struct NotionWriter<'a> {
    client: &'a NotionClient,
    database: &'a NotionDatabase,
    use_bg_cover: bool,
}

impl<'a> NotionWriter<'a> {
    pub fn new(client: &'a NotionClient, database: &'a NotionDatabase, use_bg_cover: bool) -> Self {
        Self {
            client,
            database,
            use_bg_cover,
        }
    }
}

impl DestinationWriter for NotionWriter<'_> {
    async fn create(&self, record: &GameRecord) -> Result<String> {
        let body = create_payload(record, self.database, self.use_bg_cover);
        let page: CreatedPage = self.client.request(Method::POST, "pages", Some(&body)).await?;
        log::debug!("Created page {} for {}", page.id, record.name());
        Ok(page.id)
    }

    async fn update(&self, record: &GameRecord, page_id: &str, changes: &ChangeSet) -> Result<()> {
        let Some(body) = update_payload(record, self.database, changes, self.use_bg_cover) else {
            return Ok(());
        };
        let _: Value = self
            .client
            .request(Method::PATCH, &format!("pages/{}", page_id), Some(&body))
            .await?;
        log::debug!("Updated page {} for {}", page_id, record.name());
        Ok(())
    }
}
