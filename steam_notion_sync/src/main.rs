//! Steam Notion Sync
//!
//! Imports a Steam game library into a Notion database in a single run.

use clap::Parser;
use std::error::Error;
use steam_notion_sync::{run, Cli, SyncConfig, SyncError};

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

fn report_error(err: &SyncError, debug: bool) {
    if !debug {
        log::error!("{}", err);
        return;
    }
    log::error!("{:?}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        log::error!("  caused by: {}", cause);
        source = cause.source();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let debug = cli.debug;
    let config = match SyncConfig::try_from(cli) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e, debug);
            std::process::exit(1);
        }
    };

    log::info!("Starting steam_notion_sync...");
    log::info!("Cache path: {}", config.cache_path.display());

    let mut sync = Box::pin(run(&config));
    let outcome = tokio::select! {
        result = &mut sync => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(Ok(report)) => {
            report.log_summary();
            log::info!("Sync completed successfully.");
        }
        Some(Err(e)) => {
            report_error(&e, config.debug);
            std::process::exit(1);
        }
        None => {
            // Dropping the run flushes the store cache
            drop(sync);
            log::warn!("Interrupted, fetched store data has been cached");
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}
