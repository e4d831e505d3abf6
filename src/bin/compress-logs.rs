//! Compresses the log files passed as arguments, one after the other, then exits.
//!
//! Configured through the environment, see `CompressorConfig::from_env`.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use log_compressor::{log, stats::report_stats_periodically, CompressorConfig, LogCompressor};
use tokio::{select, signal};
use tracing::{info, warn};

const STATS_REPORT_PERIOD: Duration = Duration::from_secs(8);

#[tokio::main]
async fn main() -> Result<()> {
    log::init();

    let config = CompressorConfig::from_env().context("failed to read compressor config")?;
    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();

    info!(files = paths.len(), algorithm = %config.kind, "starting log compression");

    let compressor = LogCompressor::new(config);
    compressor
        .init()
        .context("failed to start log compression worker")?;

    let stats = compressor.stats();
    let report_thread = tokio::spawn(async move {
        report_stats_periodically(&stats, STATS_REPORT_PERIOD).await;
    });

    for path in paths {
        compressor
            .append(path)
            .context("failed to queue log file")?;
    }

    select! {
        _ = compressor.settled() => {
            info!("all log files processed");
        }
        result = signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            warn!("received ctrl-c, finishing current file and discarding the rest");
        }
    }

    compressor.destroy().await;
    report_thread.abort();
    compressor.stats().log();

    Ok(())
}
