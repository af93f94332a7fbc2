//! Error types shared by the sync crates

use crate::models::AppId;
use thiserror::Error;

/// A game record could not be built from upstream data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The display name is empty once trimmed
    #[error("game {0} has an empty name")]
    EmptyName(AppId),
}

/// A language or locale code that the date normalizer does not know
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown locale: {0}")]
pub struct UnknownLocale(pub String);
