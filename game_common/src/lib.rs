//! Game Common - shared types for the Steam library sync
//!
//! Game records, natural keys, cached store metadata and the release date
//! normalizer used by both the fetch pipeline and the reconciliation engine.

pub mod error;
pub mod models;
pub mod release_date;

pub use error::{RecordError, UnknownLocale};
pub use models::{AppId, GameRecord, NaturalKey, StoreMetadata, STEAM_PLATFORM};
pub use release_date::{format_release_date, DateNormalizer, DateStyle, Locale};
