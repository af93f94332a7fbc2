//! Run configuration
//!
//! Every option can be given on the command line or through the environment
//! (a `.env`-style setup exports the same names). The parsed [`Cli`] is
//! validated once into an immutable [`SyncConfig`] that is passed by
//! reference to each component.

use crate::error::{Result, SyncError};
use clap::builder::BoolishValueParser;
use clap::{Parser, ValueEnum};
use game_common::Locale;
use std::path::PathBuf;
use std::time::Duration;

pub const STEAM_API_URL: &str = "https://api.steampowered.com";
pub const STEAM_STORE_URL: &str = "https://store.steampowered.com";
pub const STEAM_MEDIA_URL: &str = "http://media.steampowered.com";
pub const NOTION_API_URL: &str = "https://api.notion.com/v1";

/// Import a Steam game library into a Notion database
#[derive(Parser, Debug, Clone)]
#[command(name = "steam_notion_sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Notion integration token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: Option<String>,

    /// Page under which a new game database is created
    #[arg(long, env = "NOTION_PAGE_ID")]
    pub notion_page_id: Option<String>,

    /// Existing game database to sync into (takes precedence over the page)
    #[arg(long, env = "NOTION_DATABASE_ID")]
    pub notion_database_id: Option<String>,

    /// Steam Web API key
    #[arg(long, env = "STEAM_TOKEN", hide_env_values = true)]
    pub steam_token: Option<String>,

    /// SteamID64, vanity name, or steamcommunity.com profile URL
    #[arg(long, env = "STEAM_USER")]
    pub steam_user: Option<String>,

    /// Use the store background instead of the header image as page cover
    #[arg(long = "bg-cover", env = "STORE_BG_COVER", default_value_t = false, value_parser = BoolishValueParser::new())]
    pub store_bg_cover: bool,

    /// Drop games the Steam Store no longer lists
    #[arg(long, env = "SKIP_NON_STEAM", default_value_t = false, value_parser = BoolishValueParser::new())]
    pub skip_non_steam: bool,

    /// Never call the Steam Store, use library data only
    #[arg(long = "library-only", env = "USE_ONLY_LIBRARY", default_value_t = false, value_parser = BoolishValueParser::new())]
    pub use_only_library: bool,

    /// Skip free-to-play games
    #[arg(long = "skip-free", env = "SKIP_FREE_STEAM", default_value_t = false, value_parser = BoolishValueParser::new())]
    pub skip_free_steam: bool,

    /// Update games that already exist in the database instead of skipping them
    #[arg(long, env = "UPDATE_MODE", default_value_t = false, value_parser = BoolishValueParser::new())]
    pub update_mode: bool,

    /// Create pages even when a game with the same name already exists
    #[arg(long, env = "ALLOW_DUPLICATES", default_value_t = false, value_parser = BoolishValueParser::new())]
    pub allow_duplicates: bool,

    /// Ignore cached store metadata (the cache is still refreshed)
    #[arg(long, env = "NO_CACHE", default_value_t = false, value_parser = BoolishValueParser::new())]
    pub no_cache: bool,

    /// Import at most this many games (0 means no limit)
    #[arg(long = "limit", env = "TEST_LIMIT", default_value_t = 0)]
    pub test_limit: usize,

    /// Verbose logging and full error chains
    #[arg(long, env = "DEBUG", default_value_t = false, value_parser = BoolishValueParser::new())]
    pub debug: bool,

    /// Store language, also used as the release date locale hint
    #[arg(long, env = "STORE_LANGUAGE", default_value = "english")]
    pub store_language: String,

    /// Store calls allowed per quota window
    #[arg(long, env = "STORE_QUOTA", default_value_t = 200)]
    pub store_quota: usize,

    /// Length of the store quota window in seconds
    #[arg(long, env = "STORE_QUOTA_WINDOW_SECS", default_value_t = 300)]
    pub store_quota_window_secs: u64,

    /// What to do when the store quota is exhausted
    #[arg(long, env = "QUOTA_MODE", value_enum, default_value_t = QuotaMode::Wait)]
    pub quota_mode: QuotaMode,

    /// Retries for a store lookup that failed transiently
    #[arg(long, env = "STORE_RETRIES", default_value_t = 2)]
    pub store_retries: u32,

    /// Wait before retrying a failed store lookup, in seconds
    #[arg(long, env = "STORE_RETRY_WAIT_SECS", default_value_t = 90)]
    pub store_retry_wait_secs: u64,

    /// Pause between Notion writes, in milliseconds
    #[arg(long, env = "WRITE_DELAY_MS", default_value_t = 300)]
    pub write_delay_ms: u64,

    /// Path to the store metadata cache
    #[arg(long, env = "CACHE_PATH", default_value_t = default_cache_path())]
    pub cache_path: String,

    /// Empty the cache after a run in which every write succeeded
    #[arg(long, env = "PURGE_CACHE", default_value_t = false, value_parser = BoolishValueParser::new())]
    pub purge_cache: bool,
}

/// Returns the default cache path: ~/.cache/steam_notion_sync/game_cache.db
pub fn default_cache_path() -> String {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("steam_notion_sync")
        .join("game_cache.db")
        .to_string_lossy()
        .to_string()
}

/// Behaviour once the store quota window is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QuotaMode {
    /// Block until the oldest call leaves the window
    Wait,
    /// Stop calling the store and use library data for the rest of the run
    LibraryOnly,
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: u32,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: u32) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_factor,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.initial_delay * self.backoff_factor.saturating_pow(exponent)
    }

    /// A policy that never waits, for tests
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, 1)
    }
}

/// Where games are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Connect to an existing database
    Database(String),
    /// Create a fresh game database under this page
    NewUnderPage(String),
}

/// Base URLs of the remote services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub steam_api: String,
    pub steam_store: String,
    pub steam_media: String,
    pub notion: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            steam_api: STEAM_API_URL.to_string(),
            steam_store: STEAM_STORE_URL.to_string(),
            steam_media: STEAM_MEDIA_URL.to_string(),
            notion: NOTION_API_URL.to_string(),
        }
    }
}

/// Policy switches that shape which games are fetched and how they are written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub use_bg_cover: bool,
    pub skip_delisted: bool,
    pub library_only: bool,
    pub skip_free: bool,
    pub update_mode: bool,
    pub allow_duplicates: bool,
    pub cache_bypass: bool,
    pub limit: Option<usize>,
}

/// Store client settings
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub language: String,
    pub locale: Option<Locale>,
    pub quota: usize,
    pub quota_window: Duration,
    pub quota_mode: QuotaMode,
    pub retry: RetryPolicy,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            language: "english".to_string(),
            locale: Some(Locale::English),
            quota: 200,
            quota_window: Duration::from_secs(300),
            quota_mode: QuotaMode::Wait,
            retry: RetryPolicy::new(3, Duration::from_secs(90), 1),
        }
    }
}

/// Immutable configuration of one sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub notion_token: String,
    pub destination: Destination,
    pub steam_token: String,
    pub steam_user: String,
    pub options: SyncOptions,
    pub store: StoreSettings,
    pub library_retry: RetryPolicy,
    pub notion_retry: RetryPolicy,
    pub write_delay: Duration,
    pub cache_path: PathBuf,
    pub purge_cache: bool,
    pub endpoints: Endpoints,
    pub debug: bool,
}

impl SyncConfig {
    /// Configuration with default settings for the given credentials
    pub fn new(
        notion_token: impl Into<String>,
        destination: Destination,
        steam_token: impl Into<String>,
        steam_user: impl Into<String>,
    ) -> Self {
        Self {
            notion_token: notion_token.into(),
            destination,
            steam_token: steam_token.into(),
            steam_user: steam_user.into(),
            options: SyncOptions::default(),
            store: StoreSettings::default(),
            library_retry: RetryPolicy::new(3, Duration::from_secs(5), 2),
            notion_retry: RetryPolicy::new(3, Duration::from_secs(1), 2),
            write_delay: Duration::from_millis(300),
            cache_path: PathBuf::from(default_cache_path()),
            purge_cache: false,
            endpoints: Endpoints::default(),
            debug: false,
        }
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SyncError::Config(format!("{} is not set", name))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<Cli> for SyncConfig {
    type Error = SyncError;

    fn try_from(cli: Cli) -> Result<Self> {
        if cli.skip_non_steam && cli.use_only_library {
            return Err(SyncError::Config(
                "SKIP_NON_STEAM and USE_ONLY_LIBRARY cannot both be enabled".to_string(),
            ));
        }

        let destination = match (
            non_empty(cli.notion_database_id),
            non_empty(cli.notion_page_id),
        ) {
            (Some(database_id), _) => Destination::Database(database_id),
            (None, Some(page_id)) => Destination::NewUnderPage(page_id),
            (None, None) => {
                return Err(SyncError::Config(
                    "either NOTION_DATABASE_ID or NOTION_PAGE_ID must be set".to_string(),
                ))
            }
        };

        if cli.store_quota == 0 || cli.store_quota_window_secs == 0 {
            return Err(SyncError::Config(
                "store quota and quota window must be positive".to_string(),
            ));
        }

        // Unknown languages still go to the store, dates are then parsed without a hint
        let locale = match cli.store_language.parse::<Locale>() {
            Ok(locale) => Some(locale),
            Err(e) => {
                log::warn!("{}, release dates are parsed without a locale hint", e);
                None
            }
        };

        let mut config = SyncConfig::new(
            required(cli.notion_token, "NOTION_TOKEN")?,
            destination,
            required(cli.steam_token, "STEAM_TOKEN")?,
            required(cli.steam_user, "STEAM_USER")?,
        );

        config.options = SyncOptions {
            use_bg_cover: cli.store_bg_cover,
            skip_delisted: cli.skip_non_steam,
            library_only: cli.use_only_library,
            skip_free: cli.skip_free_steam,
            update_mode: cli.update_mode,
            allow_duplicates: cli.allow_duplicates,
            cache_bypass: cli.no_cache,
            limit: (cli.test_limit > 0).then_some(cli.test_limit),
        };
        config.store = StoreSettings {
            language: cli.store_language,
            locale,
            quota: cli.store_quota,
            quota_window: Duration::from_secs(cli.store_quota_window_secs),
            quota_mode: cli.quota_mode,
            retry: RetryPolicy::new(
                cli.store_retries.saturating_add(1),
                Duration::from_secs(cli.store_retry_wait_secs),
                1,
            ),
        };
        config.write_delay = Duration::from_millis(cli.write_delay_ms);
        config.cache_path = PathBuf::from(cli.cache_path);
        config.purge_cache = cli.purge_cache;
        config.debug = cli.debug;

        Ok(config)
    }
}
