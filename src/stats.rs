use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use tokio::time::interval;
use tracing::info;

/// Counts what the compression worker did with the paths it was handed. Failures are otherwise
/// only visible in the logs, producers never hear about them.
#[derive(Debug)]
pub struct CompressionStats {
    compressed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    discarded: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    started_on: Instant,
}

impl Default for CompressionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionStats {
    pub fn new() -> Self {
        Self {
            compressed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            started_on: Instant::now(),
        }
    }

    pub fn record_compressed(&self, bytes_read: u64, bytes_written: u64) {
        self.compressed.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes_read, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes_written, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn compressed(&self) -> u64 {
        self.compressed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    // Source megabytes compressed per second since start.
    fn read_mb_per_second(&self) -> f64 {
        let seconds = self.started_on.elapsed().as_secs_f64();
        self.bytes_read() as f64 / 1_000_000.0 / seconds
    }

    pub fn log(&self) {
        info!(
            compressed = self.compressed(),
            failed = self.failed(),
            skipped = self.skipped(),
            discarded = self.discarded(),
            bytes_read = self.bytes_read(),
            bytes_written = self.bytes_written(),
            read_mb_per_second = self.read_mb_per_second(),
            "log compression stats"
        );
    }
}

pub async fn report_stats_periodically(stats: &CompressionStats, period: Duration) {
    let mut interval = interval(period);
    loop {
        interval.tick().await;
        stats.log();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_test() {
        let stats = CompressionStats::new();
        stats.record_compressed(100, 10);
        stats.record_compressed(50, 5);
        stats.record_failed();
        stats.record_skipped();
        stats.record_discarded(3);

        assert_eq!(stats.compressed(), 2);
        assert_eq!(stats.bytes_read(), 150);
        assert_eq!(stats.bytes_written(), 15);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.skipped(), 1);
        assert_eq!(stats.discarded(), 3);
    }
}
