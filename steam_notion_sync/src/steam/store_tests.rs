//! Tests for the Steam Store client

use super::{parse_app_details, StoreLookup};
use crate::config::Endpoints;
use crate::error::SyncError;
use crate::steam::SteamClient;
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn portal_body() -> serde_json::Value {
    json!({
        "620": {
            "success": true,
            "data": {
                "type": "game",
                "name": "Portal 2",
                "is_free": false,
                "header_image": "https://cdn.example.com/620/header.jpg",
                "background": "https://cdn.example.com/620/page_bg.jpg",
                "release_date": { "coming_soon": false, "date": "18 Apr, 2011" }
            }
        }
    })
}

fn client(server: &MockServer) -> SteamClient {
    let endpoints = Endpoints {
        steam_store: server.uri(),
        ..Endpoints::default()
    };
    SteamClient::new("key", &endpoints).unwrap()
}

#[test]
fn test_parse_found() {
    let lookup = parse_app_details(620, &portal_body().to_string());
    let StoreLookup::Found(meta) = lookup else {
        panic!("expected Found, got {:?}", lookup);
    };
    assert_eq!(meta.release_date_raw.as_deref(), Some("18 Apr, 2011"));
    assert_eq!(
        meta.header_image.as_deref(),
        Some("https://cdn.example.com/620/header.jpg")
    );
    assert!(!meta.is_free);
    assert!(!meta.delisted);
}

#[test]
fn test_parse_unsuccessful_is_delisted() {
    let lookup = parse_app_details(999, r#"{"999": {"success": false}}"#);
    assert!(matches!(lookup, StoreLookup::Delisted));
}

#[test]
fn test_parse_malformed_is_transient() {
    assert!(matches!(
        parse_app_details(620, "<html>busy</html>"),
        StoreLookup::Transient(SyncError::Parse(_))
    ));
    assert!(matches!(
        parse_app_details(620, "null"),
        StoreLookup::Transient(_)
    ));
    assert!(matches!(
        parse_app_details(620, r#"{"621": {"success": true, "data": {}}}"#),
        StoreLookup::Transient(_)
    ));
}

#[test]
fn test_parse_blank_fields_become_none() {
    let body = json!({
        "10": {
            "success": true,
            "data": {
                "is_free": true,
                "header_image": "",
                "release_date": { "coming_soon": true, "date": "" }
            }
        }
    });
    let StoreLookup::Found(meta) = parse_app_details(10, &body.to_string()) else {
        panic!("expected Found");
    };
    assert!(meta.is_free);
    assert!(meta.header_image.is_none());
    assert!(meta.release_date_raw.is_none());
}

#[tokio::test]
async fn test_app_details_sends_language() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", "620"))
        .and(query_param("l", "german"))
        .respond_with(ResponseTemplate::new(200).set_body_json(portal_body()))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = client(&server).app_details(620, "german").await;
    assert!(matches!(lookup, StoreLookup::Found(_)));
}

#[tokio::test]
async fn test_app_details_http_classification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("appids", "404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("appids", "429"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("appids", "403"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(matches!(
        client.app_details(404, "english").await,
        StoreLookup::Delisted
    ));
    assert!(matches!(
        client.app_details(429, "english").await,
        StoreLookup::Transient(SyncError::HttpStatus(StatusCode::TOO_MANY_REQUESTS))
    ));
    assert!(matches!(
        client.app_details(403, "english").await,
        StoreLookup::Transient(SyncError::HttpStatus(StatusCode::FORBIDDEN))
    ));
}

#[tokio::test]
async fn test_app_details_unreachable_is_transient() {
    let endpoints = Endpoints {
        steam_store: "http://127.0.0.1:9".to_string(),
        ..Endpoints::default()
    };
    let client = SteamClient::new("key", &endpoints).unwrap();
    assert!(matches!(
        client.app_details(620, "english").await,
        StoreLookup::Transient(SyncError::Network(_))
    ));
}
