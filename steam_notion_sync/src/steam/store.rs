//! Steam Store `appdetails` lookups

use super::SteamClient;
use crate::error::SyncError;
use game_common::{AppId, StoreMetadata};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one store lookup
#[derive(Debug)]
pub enum StoreLookup {
    Found(StoreMetadata),
    /// The store has no page for this app
    Delisted,
    /// Network failure, throttling, or a malformed answer; worth retrying
    Transient(SyncError),
}

#[derive(Debug, Deserialize)]
struct AppDetailsEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<AppDetails>,
}

#[derive(Debug, Deserialize)]
struct AppDetails {
    #[serde(default)]
    is_free: bool,
    #[serde(default)]
    header_image: Option<String>,
    #[serde(default)]
    background: Option<String>,
    #[serde(default)]
    release_date: Option<ReleaseDate>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDate {
    #[serde(default)]
    date: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<AppDetails> for StoreMetadata {
    fn from(details: AppDetails) -> Self {
        StoreMetadata {
            release_date_raw: non_empty(details.release_date.map(|r| r.date)),
            header_image: non_empty(details.header_image),
            background: non_empty(details.background),
            is_free: details.is_free,
            delisted: false,
        }
    }
}

/// Classify a raw `appdetails` body for `app_id`
pub fn parse_app_details(app_id: AppId, body: &str) -> StoreLookup {
    let mut envelopes: HashMap<String, AppDetailsEnvelope> = match serde_json::from_str(body) {
        Ok(envelopes) => envelopes,
        Err(e) => return StoreLookup::Transient(e.into()),
    };

    match envelopes.remove(&app_id.to_string()) {
        Some(AppDetailsEnvelope { success: false, .. }) => StoreLookup::Delisted,
        Some(AppDetailsEnvelope {
            success: true,
            data: Some(details),
        }) => StoreLookup::Found(details.into()),
        _ => StoreLookup::Transient(SyncError::Parse(<serde_json::Error as serde::de::Error>::custom(
            format!("appdetails response has no data for app {}", app_id),
        ))),
    }
}

impl SteamClient {
    /// Look up one app in the store, rendered in `language`
    pub async fn app_details(&self, app_id: AppId, language: &str) -> StoreLookup {
        let url = format!("{}/api/appdetails", self.store_url);
        let app_id_param = app_id.to_string();

        log::debug!("Fetching store details for app {}", app_id);
        let response = match self
            .http
            .get(&url)
            .query(&[("appids", app_id_param.as_str()), ("l", language)])
            .timeout(STORE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return StoreLookup::Transient(e.into()),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return StoreLookup::Delisted;
        }
        if !status.is_success() {
            return StoreLookup::Transient(SyncError::HttpStatus(status));
        }

        match response.text().await {
            Ok(body) => parse_app_details(app_id, &body),
            Err(e) => StoreLookup::Transient(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
