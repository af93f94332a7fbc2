//! Game database: schema bootstrap, connection and the existing-page index

use super::NotionClient;
use crate::error::{Result, SyncError};
use crate::reconcile::{ExistingRecord, ExistingRecordIndex};
use chrono::NaiveDate;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

pub const TITLE: &str = "Name";
pub const STATUS: &str = "Status";
pub const PLATFORM: &str = "Platform";
pub const RELEASE_DATE: &str = "Release Date";
pub const PLAYTIME: &str = "Playtime (hours)";
pub const NOTES: &str = "Notes";

const DATABASE_TITLE: &str = "Steam Game Library";
const DATABASE_ICON: &str = "🎮";
const PAGE_SIZE: u32 = 100;

/// Property schema of a freshly created game database
pub fn game_list_schema() -> Value {
    json!({
        TITLE: { "title": {} },
        STATUS: {
            "select": {
                "options": [
                    { "name": "Completed", "color": "green" },
                    { "name": "Playing", "color": "yellow" },
                    { "name": "Planned", "color": "blue" },
                    { "name": "Shelved", "color": "gray" },
                    { "name": "Abandoned", "color": "red" }
                ]
            }
        },
        PLATFORM: {
            "multi_select": {
                "options": [
                    { "name": "Steam", "color": "gray" },
                    { "name": "PC", "color": "default" },
                    { "name": "Switch", "color": "red" },
                    { "name": "PlayStation", "color": "blue" },
                    { "name": "Xbox", "color": "green" }
                ]
            }
        },
        RELEASE_DATE: { "date": {} },
        PLAYTIME: { "number": { "format": "number" } },
        NOTES: { "rich_text": {} }
    })
}

#[derive(Debug, Deserialize)]
struct PropertySchema {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct DataSourceRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DatabaseObject {
    id: String,
    #[serde(default)]
    properties: HashMap<String, PropertySchema>,
    #[serde(default)]
    data_sources: Vec<DataSourceRef>,
}

#[derive(Debug, Deserialize)]
struct DataSourceObject {
    #[serde(default)]
    properties: HashMap<String, PropertySchema>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<PageObject>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageObject {
    id: String,
    #[serde(default)]
    properties: HashMap<String, PropertyValue>,
    #[serde(default)]
    cover: Option<FileObject>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PropertyValue {
    Title {
        #[serde(default)]
        title: Vec<RichText>,
    },
    Number {
        number: Option<f64>,
    },
    Date {
        date: Option<DateValue>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RichText {
    #[serde(default)]
    plain_text: Option<String>,
    #[serde(default)]
    text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    content: String,
}

#[derive(Debug, Deserialize)]
struct DateValue {
    start: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FileObject {
    External { external: FileUrl },
    File { file: FileUrl },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct FileUrl {
    url: String,
}

impl FileObject {
    fn url(&self) -> Option<&str> {
        match self {
            FileObject::External { external } => Some(&external.url),
            FileObject::File { file } => Some(&file.url),
            FileObject::Other => None,
        }
    }
}

/// A connected game database and the properties it defines
#[derive(Debug, Clone)]
pub struct NotionDatabase {
    pub database_id: String,
    pub data_source_id: Option<String>,
    /// Property name to property type
    pub properties: HashMap<String, String>,
    pub title_property: String,
    /// Created during this run, so it holds no pages yet
    pub is_new: bool,
}

impl NotionDatabase {
    fn from_parts(
        database_id: String,
        data_source_id: Option<String>,
        properties: HashMap<String, PropertySchema>,
        is_new: bool,
    ) -> Result<Self> {
        let properties: HashMap<String, String> = properties
            .into_iter()
            .map(|(name, schema)| (name, schema.kind))
            .collect();
        let title_property = properties
            .iter()
            .find(|(_, kind)| kind.as_str() == "title")
            .map(|(name, _)| name.clone())
            .ok_or_else(|| {
                SyncError::Config(format!(
                    "Notion database {} has no title property",
                    database_id
                ))
            })?;

        Ok(Self {
            database_id,
            data_source_id,
            properties,
            title_property,
            is_new,
        })
    }

    /// Whether the database defines `name` with the given type
    pub fn has_property(&self, name: &str, kind: &str) -> bool {
        self.properties.get(name).map(String::as_str) == Some(kind)
    }

    fn query_endpoint(&self) -> String {
        match self.data_source_id {
            Some(ref id) => format!("data_sources/{}/query", id),
            None => format!("databases/{}/query", self.database_id),
        }
    }
}

fn title_text(texts: &[RichText]) -> String {
    texts
        .iter()
        .filter_map(|t| {
            t.plain_text
                .as_deref()
                .or_else(|| t.text.as_ref().map(|c| c.content.as_str()))
        })
        .collect::<String>()
}

fn parse_date_start(start: &str) -> Option<NaiveDate> {
    start
        .get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
}

impl NotionClient {
    /// Properties of a database, read from its first data source when the
    /// database object itself lists none
    async fn resolve_properties(
        &self,
        database: DatabaseObject,
        is_new: bool,
    ) -> Result<NotionDatabase> {
        let data_source_id = database.data_sources.first().map(|ds| ds.id.clone());
        let mut properties = database.properties;

        if properties.is_empty() {
            if let Some(ref ds_id) = data_source_id {
                log::debug!("Reading properties from data source {}", ds_id);
                let source: DataSourceObject = self
                    .request(Method::GET, &format!("data_sources/{}", ds_id), None)
                    .await?;
                properties = source.properties;
            }
        }

        let database = NotionDatabase::from_parts(database.id, data_source_id, properties, is_new)?;
        log::info!(
            "Database {} properties: {}",
            database.database_id,
            database.properties.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        Ok(database)
    }

    /// Connect to an existing database
    pub async fn connect_database(&self, database_id: &str) -> Result<NotionDatabase> {
        let database: DatabaseObject = self
            .request(Method::GET, &format!("databases/{}", database_id), None)
            .await?;
        let database = self.resolve_properties(database, false).await?;
        log::info!("Connected to Notion database {}", database.database_id);
        Ok(database)
    }

    /// Create a new game database under `parent_page_id`
    pub async fn create_database(&self, parent_page_id: &str) -> Result<NotionDatabase> {
        let body = json!({
            "parent": { "type": "page_id", "page_id": parent_page_id },
            "title": [{ "type": "text", "text": { "content": DATABASE_TITLE } }],
            "icon": { "type": "emoji", "emoji": DATABASE_ICON },
            "initial_data_source": { "properties": game_list_schema() }
        });
        let database: DatabaseObject = self.request(Method::POST, "databases", Some(&body)).await?;
        log::info!("Created Notion database {}", database.id);
        self.resolve_properties(database, true).await
    }

    /// Read every page of the database into an index of existing games
    pub async fn existing_records(&self, database: &NotionDatabase) -> Result<ExistingRecordIndex> {
        let mut index = ExistingRecordIndex::new();
        if database.is_new {
            return Ok(index);
        }

        let endpoint = database.query_endpoint();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(ref c) = cursor {
                body["start_cursor"] = json!(c);
            }
            let response: QueryResponse = self.request(Method::POST, &endpoint, Some(&body)).await?;

            for page in response.results {
                pages += 1;
                if let Some((name, record)) = existing_record(page, &database.title_property) {
                    if !index.insert(&name, record) {
                        log::debug!("Ignoring duplicate destination page for '{}'", name);
                    }
                }
            }

            match response.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        log::info!(
            "Indexed {} existing games from {} pages",
            index.len(),
            pages
        );
        Ok(index)
    }
}

fn existing_record(mut page: PageObject, title_property: &str) -> Option<(String, ExistingRecord)> {
    let name = match page.properties.remove(title_property) {
        Some(PropertyValue::Title { title }) => title_text(&title),
        _ => return None,
    };
    if name.trim().is_empty() {
        return None;
    }

    let playtime_hours = match page.properties.get(PLAYTIME) {
        Some(PropertyValue::Number { number }) => *number,
        _ => None,
    };
    let release_date = match page.properties.get(RELEASE_DATE) {
        Some(PropertyValue::Date { date: Some(date) }) => parse_date_start(&date.start),
        _ => None,
    };
    let cover_url = page.cover.as_ref().and_then(FileObject::url).map(str::to_string);

    Some((
        name,
        ExistingRecord {
            page_id: page.id,
            playtime_hours,
            release_date,
            cover_url,
        },
    ))
}
