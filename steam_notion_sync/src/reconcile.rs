//! Reconciliation of fetched games against the existing Notion database
//!
//! Each fetched [`GameRecord`] gets exactly one [`Decision`]: create a page,
//! update the page that already carries its name, or skip it.

use crate::config::SyncOptions;
use chrono::NaiveDate;
use game_common::{GameRecord, NaturalKey};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Playtime differences below this many hours are rounding noise
const PLAYTIME_EPSILON: f64 = 0.005;

/// Last-known sync-owned values of one destination page
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingRecord {
    pub page_id: String,
    pub playtime_hours: Option<f64>,
    pub release_date: Option<NaiveDate>,
    pub cover_url: Option<String>,
}

impl ExistingRecord {
    pub fn new(page_id: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            playtime_hours: None,
            release_date: None,
            cover_url: None,
        }
    }
}

/// Snapshot of the destination, keyed by natural key
#[derive(Debug, Clone, Default)]
pub struct ExistingRecordIndex {
    records: HashMap<NaturalKey, ExistingRecord>,
}

impl ExistingRecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page; when the key is already present the first page wins
    /// and `false` is returned
    pub fn insert(&mut self, name: &str, record: ExistingRecord) -> bool {
        let key = NaturalKey::from_name(name);
        if key.is_empty() || self.records.contains_key(&key) {
            return false;
        }
        self.records.insert(key, record);
        true
    }

    pub fn get(&self, key: &NaturalKey) -> Option<&ExistingRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, ExistingRecord)> for ExistingRecordIndex {
    fn from_iter<I: IntoIterator<Item = (S, ExistingRecord)>>(iter: I) -> Self {
        let mut index = Self::new();
        for (name, record) in iter {
            index.insert(name.as_ref(), record);
        }
        index
    }
}

/// Duplicate and update policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub skip_free: bool,
    pub allow_duplicates: bool,
    pub update_mode: bool,
    /// Cover comparison uses the background image
    pub use_bg_cover: bool,
}

impl From<&SyncOptions> for ReconcilePolicy {
    fn from(options: &SyncOptions) -> Self {
        Self {
            skip_free: options.skip_free,
            allow_duplicates: options.allow_duplicates,
            update_mode: options.update_mode,
            use_bg_cover: options.use_bg_cover,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyExists,
    ExcludedFree,
    /// A page for this name was already created earlier in the run
    DuplicateInSource,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyExists => write!(f, "already exists"),
            SkipReason::ExcludedFree => write!(f, "excluded: free"),
            SkipReason::DuplicateInSource => write!(f, "duplicate in library"),
        }
    }
}

/// Sync-owned fields that differ from the destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub cover: bool,
    pub playtime: bool,
    pub release_date: bool,
}

impl ChangeSet {
    /// Compare a fetched record with the destination's last-known values.
    ///
    /// Unknown dates and missing covers never clear a destination field.
    pub fn between(record: &GameRecord, existing: &ExistingRecord, use_bg_cover: bool) -> Self {
        let playtime = match existing.playtime_hours {
            Some(hours) => (hours - record.playtime_hours()).abs() > PLAYTIME_EPSILON,
            None => true,
        };
        let release_date = match record.release_date {
            Some(date) => existing.release_date != Some(date),
            None => false,
        };
        let cover = match record.cover_uri(use_bg_cover) {
            Some(url) => existing.cover_url.as_deref() != Some(url),
            None => false,
        };
        Self {
            cover,
            playtime,
            release_date,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.cover || self.playtime || self.release_date)
    }
}

/// Outcome for one record
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Create(GameRecord),
    Update {
        record: GameRecord,
        page_id: String,
        changes: ChangeSet,
    },
    Skip {
        record: GameRecord,
        reason: SkipReason,
    },
}

impl Decision {
    pub fn record(&self) -> &GameRecord {
        match self {
            Decision::Create(record)
            | Decision::Update { record, .. }
            | Decision::Skip { record, .. } => record,
        }
    }
}

/// Decides records one by one against an immutable index
#[derive(Debug)]
pub struct Reconciler<'a> {
    index: &'a ExistingRecordIndex,
    policy: ReconcilePolicy,
    created: HashSet<NaturalKey>,
}

impl<'a> Reconciler<'a> {
    pub fn new(index: &'a ExistingRecordIndex, policy: ReconcilePolicy) -> Self {
        Self {
            index,
            policy,
            created: HashSet::new(),
        }
    }

    pub fn decide(&mut self, record: GameRecord) -> Decision {
        if self.policy.skip_free && record.free {
            return Decision::Skip {
                record,
                reason: SkipReason::ExcludedFree,
            };
        }

        let key = record.natural_key();
        match self.index.get(&key) {
            Some(existing) if !self.policy.allow_duplicates => {
                if self.policy.update_mode {
                    let changes = ChangeSet::between(&record, existing, self.policy.use_bg_cover);
                    Decision::Update {
                        record,
                        page_id: existing.page_id.clone(),
                        changes,
                    }
                } else {
                    Decision::Skip {
                        record,
                        reason: SkipReason::AlreadyExists,
                    }
                }
            }
            _ => {
                if !self.policy.allow_duplicates && !self.created.insert(key) {
                    return Decision::Skip {
                        record,
                        reason: SkipReason::DuplicateInSource,
                    };
                }
                Decision::Create(record)
            }
        }
    }
}

/// Decide a whole sequence of records
pub fn reconcile(
    records: impl IntoIterator<Item = GameRecord>,
    index: &ExistingRecordIndex,
    policy: ReconcilePolicy,
) -> Vec<Decision> {
    let mut reconciler = Reconciler::new(index, policy);
    records.into_iter().map(|r| reconciler.decide(r)).collect()
}
