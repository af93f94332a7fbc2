//! One sync run, end to end
//!
//! Connects the destination, indexes existing pages, fetches the library and
//! then processes games strictly one at a time: fetch, reconcile, write.

use crate::cache::GameCache;
use crate::config::{Destination, SyncConfig};
use crate::error::{Result, SyncError};
use crate::notion::{DestinationWriter, NotionClient, NotionWriter};
use crate::pipeline::{FetchPipeline, FetchStats};
use crate::reconcile::{Decision, ReconcilePolicy, Reconciler, SkipReason};
use crate::steam::{SteamClient, UserRef};
use std::collections::BTreeMap;
use std::time::Duration;

/// A write that failed
#[derive(Debug)]
pub struct FailedWrite {
    pub name: String,
    pub error: SyncError,
}

/// Outcome of a run
#[derive(Debug, Default)]
pub struct SyncReport {
    pub fetch: FetchStats,
    pub created: usize,
    pub updated: usize,
    /// Update decisions with nothing to change
    pub unchanged: usize,
    pub skipped: BTreeMap<String, usize>,
    pub failed: Vec<FailedWrite>,
}

impl SyncReport {
    pub fn written(&self) -> usize {
        self.created + self.updated
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason.to_string()).copied().unwrap_or(0)
    }

    fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Log the final summary
    pub fn log_summary(&self) {
        let fetch = &self.fetch;
        log::info!(
            "Fetched {} of {} library games ({} from cache, {} store calls, {} library-only, {} delisted, {} dropped)",
            fetch.yielded,
            fetch.library_games,
            fetch.cache_hits,
            fetch.store_calls,
            fetch.library_only,
            fetch.delisted,
            fetch.dropped
        );
        for (reason, count) in &self.skipped {
            log::info!("Skipped {} games: {}", count, reason);
        }
        log::info!(
            "Created {}, updated {}, unchanged {}, failed {}",
            self.created,
            self.updated,
            self.unchanged,
            self.failed.len()
        );
        if !self.failed.is_empty() {
            log::warn!("Games not written:");
            let mut names: Vec<&str> = self.failed.iter().map(|f| f.name.as_str()).collect();
            names.sort_unstable();
            for name in names {
                log::warn!("- {}", name);
            }
        }
    }
}

/// Apply one decision through `writer`, pausing after every request
pub async fn apply_decision<W: DestinationWriter>(
    writer: &W,
    decision: Decision,
    write_delay: Duration,
    report: &mut SyncReport,
) {
    let (record, result) = match decision {
        Decision::Skip { record, reason } => {
            log::debug!("Skipping {}: {}", record.name(), reason);
            report.record_skip(reason);
            return;
        }
        Decision::Update { changes, .. } if changes.is_empty() => {
            report.unchanged += 1;
            return;
        }
        Decision::Create(record) => {
            let result = writer.create(&record).await.map(|_| {
                log::info!("Created {}", record.name());
                report.created += 1;
            });
            (record, result)
        }
        Decision::Update {
            record,
            page_id,
            changes,
        } => {
            let result = writer.update(&record, &page_id, &changes).await.map(|_| {
                log::info!("Updated {}", record.name());
                report.updated += 1;
            });
            (record, result)
        }
    };

    if let Err(error) = result {
        log::error!("Failed to write {}: {}", record.name(), error);
        log::debug!("{:?}", error);
        report.failed.push(FailedWrite {
            name: record.name().to_string(),
            error,
        });
    }
    if !write_delay.is_zero() {
        tokio::time::sleep(write_delay).await;
    }
}

/// Drain the pipeline through the reconciler into the writer
pub async fn process<W: DestinationWriter>(
    pipeline: &mut FetchPipeline<'_>,
    reconciler: &mut Reconciler<'_>,
    writer: &W,
    write_delay: Duration,
) -> SyncReport {
    let mut report = SyncReport::default();
    while let Some(record) = pipeline.next().await {
        let decision = reconciler.decide(record);
        apply_decision(writer, decision, write_delay, &mut report).await;
    }
    report.fetch = pipeline.stats().clone();
    report
}

/// Run a full sync with the given configuration
pub async fn run(config: &SyncConfig) -> Result<SyncReport> {
    let user = UserRef::parse(&config.steam_user)?;
    let notion = NotionClient::new(&config.notion_token, &config.endpoints.notion, config.notion_retry)?;
    let steam = SteamClient::new(&config.steam_token, &config.endpoints)?;

    let database = match config.destination {
        Destination::Database(ref id) => notion.connect_database(id).await?,
        Destination::NewUnderPage(ref page_id) => notion.create_database(page_id).await?,
    };
    let index = notion.existing_records(&database).await?;

    let games = steam
        .fetch_library(&user, !config.options.skip_free, &config.library_retry)
        .await?;
    if games.is_empty() {
        return Err(SyncError::EmptyLibrary);
    }

    let mut cache = GameCache::open(&config.cache_path, config.options.cache_bypass)?;
    let report = {
        let mut pipeline = FetchPipeline::new(&steam, &mut cache, config, games);
        let mut reconciler = Reconciler::new(&index, ReconcilePolicy::from(&config.options));
        let writer = NotionWriter::new(&notion, &database, config.options.use_bg_cover);
        process(&mut pipeline, &mut reconciler, &writer, config.write_delay).await
    };

    let flushed = cache.flush()?;
    log::debug!("Saved {} new cache entries", flushed);

    if report.written() == 0 && !report.failed.is_empty() {
        report.log_summary();
        return Err(SyncError::NothingWritten {
            failed: report.failed.len(),
        });
    }

    if config.purge_cache && report.failed.is_empty() {
        cache.clear()?;
    }

    Ok(report)
}
