//! Steam Notion Sync - Steam library to Notion database importer
//!
//! Fetches a user's owned games from the Steam Web API, augments them with
//! Steam Store metadata through a local SQLite cache, reconciles them against
//! the pages already in a Notion database and creates or updates pages.

pub mod cache;
pub mod config;
pub mod error;
pub mod notion;
pub mod pipeline;
pub mod reconcile;
pub mod steam;
pub mod sync;

pub use cache::{CacheEntry, GameCache};
pub use config::{Cli, Destination, QuotaMode, RetryPolicy, SyncConfig, SyncOptions};
pub use error::{Result, SyncError};
pub use pipeline::{FetchPipeline, FetchStats};
pub use reconcile::{
    reconcile, ChangeSet, Decision, ExistingRecord, ExistingRecordIndex, ReconcilePolicy,
    Reconciler, SkipReason,
};
pub use sync::{run, SyncReport};
