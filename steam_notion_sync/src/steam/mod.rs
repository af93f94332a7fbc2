//! Steam Web API and Steam Store clients
//!
//! Uses async reqwest; all base URLs come from [`Endpoints`] so the clients
//! can be pointed at a mock server.

pub mod library;
pub mod rate_limit;
pub mod store;

pub use library::{OwnedGame, UserRef};
pub use rate_limit::QuotaTracker;
pub use store::StoreLookup;

use crate::config::{Endpoints, RetryPolicy};
use crate::error::Result;
use std::future::Future;
use std::time::Duration;

const USER_AGENT: &str = concat!("steam_notion_sync/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for the Steam services
#[derive(Debug, Clone)]
pub struct SteamClient {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    store_url: String,
    media_url: String,
}

impl SteamClient {
    pub fn new(api_key: &str, endpoints: &Endpoints) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            api_url: endpoints.steam_api.trim_end_matches('/').to_string(),
            store_url: endpoints.steam_store.trim_end_matches('/').to_string(),
            media_url: endpoints.steam_media.trim_end_matches('/').to_string(),
        })
    }

    /// Community image URL for an app icon or logo hash
    pub fn image_url(&self, app_id: u32, hash: &str) -> String {
        format!(
            "{}/steamcommunity/public/images/apps/{}/{}.jpg",
            self.media_url, app_id, hash
        )
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy runs out
pub(crate) async fn retry_transient<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                log::warn!(
                    "{} failed ({}), retrying in {:?} ({}/{})",
                    what,
                    e,
                    delay,
                    attempt,
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
