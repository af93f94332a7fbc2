//! End-to-end sync runs against mock Steam and Notion servers

use serde_json::{json, Value};
use std::time::Duration;
use steam_notion_sync::config::{Destination, Endpoints, RetryPolicy, SyncConfig};
use steam_notion_sync::{run, SkipReason, SyncError};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const STEAM_ID: &str = "76561197960287930";

struct Harness {
    steam: MockServer,
    notion: MockServer,
    dir: TempDir,
}

impl Harness {
    async fn start() -> Self {
        Self {
            steam: MockServer::start().await,
            notion: MockServer::start().await,
            dir: TempDir::new().unwrap(),
        }
    }

    fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::new("secret", Destination::Database("db".into()), "key", STEAM_ID);
        config.endpoints = Endpoints {
            steam_api: self.steam.uri(),
            steam_store: self.steam.uri(),
            steam_media: "http://media.example".to_string(),
            notion: self.notion.uri(),
        };
        config.cache_path = self.dir.path().join("game_cache.db");
        config.library_retry = RetryPolicy::immediate(1);
        config.notion_retry = RetryPolicy::immediate(1);
        config.store.retry = RetryPolicy::immediate(1);
        config.write_delay = Duration::ZERO;
        config
    }

    async fn library(&self, games: Value) {
        let count = games.as_array().map(Vec::len).unwrap_or(0);
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v1/"))
            .and(query_param("steamid", STEAM_ID))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": { "game_count": count, "games": games }
            })))
            .mount(&self.steam)
            .await;
    }

    async fn store(&self, appid: u32, date: &str, is_free: bool) {
        Mock::given(method("GET"))
            .and(path("/api/appdetails"))
            .and(query_param("appids", appid.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                appid.to_string(): {
                    "success": true,
                    "data": {
                        "is_free": is_free,
                        "header_image": format!("https://cdn/{}/header.jpg", appid),
                        "release_date": { "date": date }
                    }
                }
            })))
            .mount(&self.steam)
            .await;
    }

    async fn database(&self, pages: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/databases/db"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "database",
                "id": "db",
                "properties": {
                    "Name": { "type": "title" },
                    "Platform": { "type": "multi_select" },
                    "Release Date": { "type": "date" },
                    "Playtime (hours)": { "type": "number" },
                    "Notes": { "type": "rich_text" },
                    "Status": { "type": "select" }
                }
            })))
            .mount(&self.notion)
            .await;
        Mock::given(method("POST"))
            .and(path("/databases/db/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": pages,
                "has_more": false,
                "next_cursor": null
            })))
            .mount(&self.notion)
            .await;
    }

    async fn accept_writes(&self) {
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "new-page" })))
            .mount(&self.notion)
            .await;
        Mock::given(method("PATCH"))
            .and(path_regex("^/pages/.+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "page" })))
            .mount(&self.notion)
            .await;
    }

    async fn writes(&self, verb: &str) -> Vec<(String, Value)> {
        self.notion
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r: &Request| r.method.as_str() == verb && r.url.path().starts_with("/pages"))
            .map(|r| (r.url.path().to_string(), serde_json::from_slice(&r.body).unwrap()))
            .collect()
    }
}

fn page(id: &str, name: &str, hours: f64) -> Value {
    json!({
        "object": "page",
        "id": id,
        "properties": {
            "Name": { "type": "title", "title": [{ "plain_text": name }] },
            "Playtime (hours)": { "type": "number", "number": hours }
        }
    })
}

fn portal_library() -> Value {
    json!([
        { "appid": 620, "name": "Portal 2", "playtime_forever": 600, "img_icon_url": "icon" }
    ])
}

#[tokio::test]
async fn first_run_creates_pages() {
    let h = Harness::start().await;
    h.library(portal_library()).await;
    h.store(620, "18 Apr, 2011", false).await;
    h.database(vec![]).await;
    h.accept_writes().await;

    let report = run(&h.config()).await.unwrap();
    assert_eq!(report.created, 1);
    assert!(report.failed.is_empty());

    let created = h.writes("POST").await;
    assert_eq!(created.len(), 1);
    let body = &created[0].1;
    assert_eq!(body["parent"]["database_id"], "db");
    assert_eq!(body["properties"]["Name"]["title"][0]["text"]["content"], "Portal 2");
    assert_eq!(body["properties"]["Playtime (hours)"]["number"], 10.0);
    assert_eq!(body["properties"]["Release Date"]["date"]["start"], "2011-04-18");
    assert_eq!(body["cover"]["external"]["url"], "https://cdn/620/header.jpg");
    assert_eq!(
        body["icon"]["external"]["url"],
        "http://media.example/steamcommunity/public/images/apps/620/icon.jpg"
    );
}

#[tokio::test]
async fn second_run_without_update_mode_creates_nothing() {
    let h = Harness::start().await;
    h.library(json!([
        { "appid": 620, "name": "Portal 2", "playtime_forever": 600 },
        { "appid": 400, "name": "Portal", "playtime_forever": 90 }
    ]))
    .await;
    h.store(620, "18 Apr, 2011", false).await;
    h.store(400, "10 Oct, 2007", false).await;
    h.database(vec![page("p1", "portal 2", 10.0), page("p2", "Portal", 1.5)])
        .await;
    h.accept_writes().await;

    let report = run(&h.config()).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped_for(SkipReason::AlreadyExists), 2);
    assert!(h.writes("POST").await.is_empty());
    assert!(h.writes("PATCH").await.is_empty());
}

#[tokio::test]
async fn update_mode_patches_changed_fields_only() {
    let h = Harness::start().await;
    h.library(json!([
        { "appid": 620, "name": "Portal 2", "playtime_forever": 660 },
        { "appid": 400, "name": "Portal", "playtime_forever": 90 }
    ]))
    .await;
    h.store(620, "18 Apr, 2011", false).await;
    h.store(400, "???", false).await;
    h.database(vec![page("p1", "Portal 2", 10.0), page("p2", "Portal", 1.5)])
        .await;
    h.accept_writes().await;

    let mut config = h.config();
    config.options.update_mode = true;
    let report = run(&config).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 2);

    let patches = h.writes("PATCH").await;
    assert_eq!(patches.len(), 2);
    let (portal2_path, portal2) = &patches[0];
    assert_eq!(portal2_path, "/pages/p1");
    assert_eq!(portal2["properties"]["Playtime (hours)"]["number"], 11.0);
    assert_eq!(portal2["properties"]["Release Date"]["date"]["start"], "2011-04-18");
    assert!(portal2["properties"].get("Name").is_none());

    // Unknown release date is omitted, playtime unchanged, only the cover is new
    let (portal_path, portal) = &patches[1];
    assert_eq!(portal_path, "/pages/p2");
    assert!(portal.get("properties").is_none());
    assert_eq!(portal["cover"]["external"]["url"], "https://cdn/400/header.jpg");
    assert!(h.writes("POST").await.is_empty());
}

#[tokio::test]
async fn free_games_are_excluded_when_requested() {
    let h = Harness::start().await;
    h.library(json!([
        { "appid": 570, "name": "Dota 2", "playtime_forever": 6000 },
        { "appid": 620, "name": "Portal 2", "playtime_forever": 600 }
    ]))
    .await;
    h.store(570, "9 Jul, 2013", true).await;
    h.store(620, "18 Apr, 2011", false).await;
    h.database(vec![]).await;
    h.accept_writes().await;

    let mut config = h.config();
    config.options.skip_free = true;
    let report = run(&config).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped_for(SkipReason::ExcludedFree), 1);
}

#[tokio::test]
async fn cache_persists_between_runs() {
    let h = Harness::start().await;
    h.library(portal_library()).await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "620": { "success": true, "data": { "release_date": { "date": "18 Apr, 2011" } } }
        })))
        .expect(2)
        .mount(&h.steam)
        .await;
    h.database(vec![]).await;
    h.accept_writes().await;

    let config = h.config();
    let first = run(&config).await.unwrap();
    assert_eq!(first.fetch.store_calls, 1);

    let second = run(&config).await.unwrap();
    assert_eq!(second.fetch.store_calls, 0);
    assert_eq!(second.fetch.cache_hits, 1);

    // Bypass forces one fresh call, for the second expected hit
    let mut bypass = h.config();
    bypass.options.cache_bypass = true;
    let third = run(&bypass).await.unwrap();
    assert_eq!(third.fetch.store_calls, 1);
}

#[tokio::test]
async fn purge_cache_empties_it_after_success() {
    let h = Harness::start().await;
    h.library(portal_library()).await;
    h.store(620, "18 Apr, 2011", false).await;
    h.database(vec![]).await;
    h.accept_writes().await;

    let mut config = h.config();
    config.purge_cache = true;
    run(&config).await.unwrap();

    let cache = steam_notion_sync::GameCache::open(&config.cache_path, false).unwrap();
    assert!(cache.is_empty());
}

#[tokio::test]
async fn failed_writes_are_reported() {
    let h = Harness::start().await;
    h.library(json!([
        { "appid": 620, "name": "Portal 2", "playtime_forever": 600 },
        { "appid": 400, "name": "Portal", "playtime_forever": 90 }
    ]))
    .await;
    h.store(620, "18 Apr, 2011", false).await;
    h.store(400, "10 Oct, 2007", false).await;
    h.database(vec![]).await;
    Mock::given(method("POST"))
        .and(path("/pages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "invalid" })))
        .up_to_n_times(1)
        .mount(&h.notion)
        .await;
    h.accept_writes().await;

    let report = run(&h.config()).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "Portal 2");
}

#[tokio::test]
async fn nothing_written_is_an_error() {
    let h = Harness::start().await;
    h.library(portal_library()).await;
    h.store(620, "18 Apr, 2011", false).await;
    h.database(vec![]).await;
    Mock::given(method("POST"))
        .and(path("/pages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "invalid" })))
        .mount(&h.notion)
        .await;

    let err = run(&h.config()).await.unwrap_err();
    assert!(matches!(err, SyncError::NothingWritten { failed: 1 }));
}

#[tokio::test]
async fn private_profile_aborts_the_run() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/IPlayerService/GetOwnedGames/v1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": {} })))
        .mount(&h.steam)
        .await;
    h.database(vec![]).await;

    let err = run(&h.config()).await.unwrap_err();
    assert!(matches!(err, SyncError::PrivateProfile(_)));
}

#[tokio::test]
async fn empty_library_is_an_error() {
    let h = Harness::start().await;
    h.library(json!([])).await;
    h.database(vec![]).await;

    let err = run(&h.config()).await.unwrap_err();
    assert!(matches!(err, SyncError::EmptyLibrary));
}

#[tokio::test]
async fn new_database_is_created_under_the_page() {
    let h = Harness::start().await;
    h.library(portal_library()).await;
    h.store(620, "18 Apr, 2011", false).await;
    Mock::given(method("POST"))
        .and(path("/databases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "database",
            "id": "fresh-db",
            "properties": {
                "Name": { "type": "title" },
                "Playtime (hours)": { "type": "number" }
            }
        })))
        .expect(1)
        .mount(&h.notion)
        .await;
    Mock::given(method("POST"))
        .and(path_regex("/query$"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.notion)
        .await;
    h.accept_writes().await;

    let mut config = h.config();
    config.destination = Destination::NewUnderPage("parent".into());
    let report = run(&config).await.unwrap();
    assert_eq!(report.created, 1);

    let created = h.writes("POST").await;
    assert_eq!(created[0].1["parent"]["database_id"], "fresh-db");
}
