//! Error types for steam_notion_sync

use thiserror::Error;

/// Unified error type for sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or conflicting configuration, raised before any fetch
    #[error("Configuration error: {0}")]
    Config(String),
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Failed to parse JSON response
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// HTTP error status code
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Cache database operation failed
    #[error("Cache error: {0}")]
    Cache(#[from] rusqlite::Error),
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The Steam profile hides its game list
    #[error("Steam profile {0} is private, the game library cannot be read")]
    PrivateProfile(String),
    /// A vanity URL did not resolve to a Steam account
    #[error("Steam user not found: {0}")]
    UserNotFound(String),
    /// Notion answered with an error status
    #[error("Notion API error ({status}): {message}")]
    Notion {
        status: reqwest::StatusCode,
        message: String,
    },
    /// The Steam library returned no games
    #[error("No games found in the Steam library")]
    EmptyLibrary,
    /// Every destination write of the run failed
    #[error("No games were written to Notion ({failed} failed)")]
    NothingWritten { failed: usize },
}

impl SyncError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Network(_) | SyncError::Parse(_) => true,
            SyncError::HttpStatus(status) | SyncError::Notion { status, .. } => {
                status.as_u16() == 429 || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Result alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
