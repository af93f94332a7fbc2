//! Source fetch pipeline
//!
//! Turns the owned-games list into [`GameRecord`]s one at a time, augmenting
//! each with store metadata through the cache and the store quota. A failed
//! store lookup never aborts the run: the record falls back to library data.

use crate::cache::{CacheEntry, GameCache};
use crate::config::{QuotaMode, SyncConfig};
use crate::steam::{OwnedGame, QuotaTracker, SteamClient, StoreLookup};
use game_common::{DateNormalizer, GameRecord, StoreMetadata};

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub library_games: usize,
    pub yielded: usize,
    pub cache_hits: usize,
    pub store_calls: usize,
    /// Records built from library data only (by choice, quota, or failure)
    pub library_only: usize,
    /// Store lookups that kept failing after every retry
    pub store_failures: usize,
    pub delisted: usize,
    /// Entries dropped for an empty name or a delisted store page
    pub dropped: usize,
}

/// Lazy, single-pass sequence of enriched records
pub struct FetchPipeline<'a> {
    client: &'a SteamClient,
    cache: &'a mut GameCache,
    config: &'a SyncConfig,
    games: std::vec::IntoIter<OwnedGame>,
    quota: QuotaTracker,
    normalizer: DateNormalizer,
    library_only: bool,
    /// Set once the quota runs out in [`QuotaMode::LibraryOnly`]; only
    /// uncached records are affected
    quota_exhausted: bool,
    stats: FetchStats,
}

impl<'a> FetchPipeline<'a> {
    pub fn new(
        client: &'a SteamClient,
        cache: &'a mut GameCache,
        config: &'a SyncConfig,
        games: Vec<OwnedGame>,
    ) -> Self {
        let stats = FetchStats {
            library_games: games.len(),
            ..FetchStats::default()
        };
        Self {
            client,
            cache,
            config,
            games: games.into_iter(),
            quota: QuotaTracker::new(config.store.quota, config.store.quota_window),
            normalizer: DateNormalizer::new(config.store.locale),
            library_only: config.options.library_only,
            quota_exhausted: false,
            stats,
        }
    }

    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Next record in library order, or `None` once the library or the
    /// import limit is exhausted
    pub async fn next(&mut self) -> Option<GameRecord> {
        loop {
            if let Some(limit) = self.config.options.limit {
                if self.stats.yielded >= limit {
                    return None;
                }
            }

            let game = self.games.next()?;
            let record = match game.to_record(self.client) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping library entry: {}", e);
                    self.stats.dropped += 1;
                    continue;
                }
            };

            if let Some(record) = self.enrich(record).await {
                self.stats.yielded += 1;
                return Some(record);
            }
        }
    }

    async fn enrich(&mut self, record: GameRecord) -> Option<GameRecord> {
        if self.library_only {
            self.stats.library_only += 1;
            return Some(self.normalize(record));
        }

        let metadata = match self.cache.get(record.id()) {
            Some(entry) => {
                log::debug!("Cache hit for {} ({})", record.name(), record.id());
                self.stats.cache_hits += 1;
                entry.metadata.clone()
            }
            None => match self.lookup(&record).await {
                Some(metadata) => metadata,
                None => {
                    self.stats.library_only += 1;
                    return Some(self.normalize(record));
                }
            },
        };

        let record = record.with_store_metadata(&metadata);
        if record.delisted {
            self.stats.delisted += 1;
            if self.config.options.skip_delisted {
                log::info!(
                    "Skipping {} ({}): not listed on the Steam Store",
                    record.name(),
                    record.id()
                );
                self.stats.dropped += 1;
                return None;
            }
            log::info!(
                "{} ({}) is not listed on the Steam Store, using library data",
                record.name(),
                record.id()
            );
        }
        Some(self.normalize(record))
    }

    /// Store lookup with quota and retries; `None` means fall back to the library
    async fn lookup(&mut self, record: &GameRecord) -> Option<StoreMetadata> {
        if self.quota_exhausted {
            return None;
        }
        let retry = self.config.store.retry;
        let mut attempt = 1;

        loop {
            if !self.quota.try_acquire() {
                match self.config.store.quota_mode {
                    QuotaMode::Wait => self.quota.acquire().await,
                    QuotaMode::LibraryOnly => {
                        log::warn!(
                            "Store quota exhausted, using library data for the remaining games"
                        );
                        self.quota_exhausted = true;
                        return None;
                    }
                }
            }

            self.stats.store_calls += 1;
            let metadata = match self
                .client
                .app_details(record.id(), &self.config.store.language)
                .await
            {
                StoreLookup::Found(metadata) => metadata,
                StoreLookup::Delisted => StoreMetadata::delisted(),
                StoreLookup::Transient(e) if attempt < retry.max_attempts => {
                    let delay = retry.delay_after(attempt);
                    log::warn!(
                        "Store lookup for {} failed ({}), retrying in {:?} ({}/{})",
                        record.name(),
                        e,
                        delay,
                        attempt,
                        retry.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                StoreLookup::Transient(e) => {
                    log::warn!(
                        "Store lookup for {} failed ({}), using library data",
                        record.name(),
                        e
                    );
                    self.stats.store_failures += 1;
                    return None;
                }
            };

            self.cache
                .put(CacheEntry::new(record.id(), record.name(), metadata.clone()));
            return Some(metadata);
        }
    }

    fn normalize(&self, mut record: GameRecord) -> GameRecord {
        if let Some(raw) = record.release_date_raw.as_deref() {
            record.release_date = self.normalizer.parse(raw);
            if record.release_date.is_none() {
                log::debug!(
                    "Release date '{}' of {} not recognised, leaving it empty",
                    raw,
                    record.name()
                );
            }
        }
        record
    }
}
