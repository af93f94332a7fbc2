//! Notion REST client
//!
//! Thin wrapper over the Notion API: every request carries the integration
//! token and API version, is retried on rate limiting (honouring
//! `Retry-After`) and on network errors (doubling the delay), and decodes the
//! JSON answer into typed structs.

pub mod database;
pub mod writer;

pub use database::NotionDatabase;
pub use writer::{DestinationWriter, NotionWriter};

use crate::config::RetryPolicy;
use crate::error::{Result, SyncError};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const NOTION_VERSION: &str = "2025-09-03";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
    retry: RetryPolicy,
}

impl NotionClient {
    pub fn new(token: &str, base_url: &str, retry: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Send a request and decode the answer
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.token)
                .header("Notion-Version", NOTION_VERSION);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    log::warn!(
                        "Notion request {} {} failed ({}), retrying in {:?} ({}/{})",
                        method,
                        endpoint,
                        e,
                        delay,
                        attempt,
                        max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < max_attempts {
                    let delay = retry_after(&response).unwrap_or_else(|| self.retry.delay_after(attempt));
                    log::warn!(
                        "Notion rate limit hit, waiting {:?} ({}/{})",
                        delay,
                        attempt,
                        max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(SyncError::Notion {
                    status,
                    message: "rate limited, retries exhausted".to_string(),
                });
            }

            let text = response.text().await?;
            if !status.is_success() {
                let message = serde_json::from_str::<ErrorBody>(&text)
                    .ok()
                    .and_then(|b| b.message)
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                return Err(SyncError::Notion { status, message });
            }
            return Ok(serde_json::from_str(&text)?);
        }
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
