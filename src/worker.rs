//! The log compression worker. One background task takes rotated log paths off a queue and
//! compresses them one at a time, in the order they were appended.
//!
//! ## Lifecycle
//! `Uninitialized -> Running -> Stopping -> Stopped`. Stopped is terminal, construct a new
//! `LogCompressor` to start again.
//!
//! Shutdown is cooperative. `destroy` discards every path still queued but lets the file being
//! compressed finish, success or failure, before it returns.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{fs, runtime::Handle, sync::watch, time::sleep};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    block_compressor::BlockCompressor,
    config::CompressorConfig,
    error::{InitError, NotRunning},
    session::{FileCompressor, FileOutcome},
    stats::CompressionStats,
    work_queue::WorkQueue,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    Running,
    Stopping,
    Stopped,
}

// `done` flips to true when the task returns. A sender dropped without sending means the task
// panicked, which counts as finished too.
enum Lifecycle {
    Uninitialized,
    Running {
        queue: Arc<WorkQueue>,
        done: watch::Receiver<bool>,
    },
    Stopping {
        done: watch::Receiver<bool>,
    },
    Stopped,
}

fn task_finished(done: &watch::Receiver<bool>) -> bool {
    *done.borrow() || done.has_changed().is_err()
}

impl Lifecycle {
    // A destroy call that was cancelled mid-wait leaves Stopping behind, whoever looks next
    // completes the transition.
    fn promote_finished(&mut self) {
        if let Lifecycle::Stopping { done } = self {
            if task_finished(done) {
                *self = Lifecycle::Stopped;
            }
        }
    }
}

struct CompressionTask {
    queue: Arc<WorkQueue>,
    files: FileCompressor,
    stats: Arc<CompressionStats>,
    missing_source_backoff: Duration,
}

impl CompressionTask {
    async fn run(mut self) {
        debug!("log compression task started");

        while let Some(path) = self.queue.pop().await {
            self.process(&path).await;
            self.queue.task_done();
        }

        debug!("log compression task exiting");
    }

    async fn process(&mut self, path: &Path) {
        if path.as_os_str().is_empty() {
            debug!("skipping empty path");
            self.stats.record_skipped();
            return;
        }

        if self.queue.is_closed() {
            debug!(path = %path.display(), "worker stopping, skipping");
            self.stats.record_skipped();
            return;
        }

        if !fs::try_exists(path).await.unwrap_or(false) {
            debug!(path = %path.display(), "log file no longer exists, skipping");
            self.stats.record_skipped();
            // A run of vanished paths would otherwise spin through the queue.
            sleep(self.missing_source_backoff).await;
            return;
        }

        match self.files.compress(path).await {
            Ok(FileOutcome::Compressed {
                output,
                bytes_read,
                bytes_written,
            }) => {
                let compression_ratio_truncated = if bytes_written == 0 {
                    0.0
                } else {
                    ((bytes_read as f64 / bytes_written as f64) * 100.0).trunc() / 100.0
                };
                info!(
                    path = %path.display(),
                    output = %output.display(),
                    bytes_read,
                    bytes_written,
                    compression_ratio = compression_ratio_truncated,
                    "compressed log file"
                );
                self.stats.record_compressed(bytes_read, bytes_written);
            }
            Ok(FileOutcome::SourceVanished { output }) => {
                warn!(
                    path = %path.display(),
                    output = %output.display(),
                    "log file removed while compressing, discarded output"
                );
                self.stats.record_skipped();
            }
            Err(e) => {
                error!(path = %path.display(), error = ?e, "failed to compress log file");
                self.stats.record_failed();
            }
        }
    }
}

/// Compresses rotated log files in the background.
///
/// Construct one per service and share it by reference with whatever rotates the logs.
pub struct LogCompressor {
    config: CompressorConfig,
    compressor: Arc<dyn BlockCompressor>,
    stats: Arc<CompressionStats>,
    lifecycle: Mutex<Lifecycle>,
}

impl LogCompressor {
    pub fn new(config: CompressorConfig) -> Self {
        let compressor = config.kind.block_compressor();
        Self::with_compressor(config, compressor)
    }

    /// Uses `compressor` instead of resolving one from `config.kind`. The output suffix follows
    /// the compressor's kind.
    pub fn with_compressor(config: CompressorConfig, compressor: Arc<dyn BlockCompressor>) -> Self {
        Self {
            config,
            compressor,
            stats: Arc::new(CompressionStats::new()),
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the background task on the current tokio runtime.
    pub fn init(&self) -> Result<(), InitError> {
        let mut lifecycle = self
            .lifecycle
            .lock()
            .map_err(|_| InitError::SyncPrimitive)?;

        lifecycle.promote_finished();
        match *lifecycle {
            Lifecycle::Uninitialized => {}
            Lifecycle::Running { .. } | Lifecycle::Stopping { .. } => {
                return Err(InitError::AlreadyInitialized)
            }
            Lifecycle::Stopped => return Err(InitError::Stopped),
        }

        let runtime = Handle::try_current().map_err(InitError::ThreadSpawn)?;

        let queue = Arc::new(WorkQueue::new());
        let task = CompressionTask {
            queue: queue.clone(),
            files: FileCompressor::new(self.compressor.clone(), &self.config),
            stats: self.stats.clone(),
            missing_source_backoff: self.config.missing_source_backoff,
        };
        let (done_tx, done) = watch::channel(false);
        runtime.spawn(
            async move {
                task.run().await;
                let _ = done_tx.send(true);
            }
            .instrument(info_span!("log_compress")),
        );

        *lifecycle = Lifecycle::Running { queue, done };

        info!(
            algorithm = %self.compressor.kind(),
            block_size = self.config.block_size,
            block_delay_ms = self.config.block_delay.as_millis() as u64,
            "started log compression worker"
        );

        Ok(())
    }

    /// Queues `path` for compression. Duplicates are processed independently.
    pub fn append(&self, path: impl Into<PathBuf>) -> Result<(), NotRunning> {
        let queue = match &*self.lock_lifecycle() {
            Lifecycle::Running { queue, .. } => queue.clone(),
            _ => return Err(NotRunning),
        };
        queue.push(path.into())
    }

    /// Stops the worker. Paths still queued are discarded, the file being compressed is finished
    /// first. Concurrent calls all wait for the task to finish. Does nothing when the worker was
    /// never started or has already stopped.
    pub async fn destroy(&self) {
        let mut done = {
            let mut lifecycle = self.lock_lifecycle();
            match &*lifecycle {
                Lifecycle::Running { queue, done } => {
                    let done = done.clone();
                    let discarded = queue.close();
                    if discarded > 0 {
                        warn!(discarded, "discarding queued log files on shutdown");
                        self.stats.record_discarded(discarded as u64);
                    }
                    *lifecycle = Lifecycle::Stopping { done: done.clone() };
                    done
                }
                Lifecycle::Stopping { done } => done.clone(),
                Lifecycle::Uninitialized | Lifecycle::Stopped => return,
            }
        };

        if done.wait_for(|finished| *finished).await.is_err() {
            error!("log compression task ended abnormally");
        }

        let mut lifecycle = self.lock_lifecycle();
        if let Lifecycle::Stopping { .. } = *lifecycle {
            *lifecycle = Lifecycle::Stopped;
            info!("stopped log compression worker");
        }
    }

    /// Resolves once the queue is empty and no file is being compressed. Resolves immediately
    /// when the worker is not running.
    pub async fn settled(&self) {
        let queue = match &*self.lock_lifecycle() {
            Lifecycle::Running { queue, .. } => queue.clone(),
            _ => return,
        };
        queue.settled().await;
    }

    pub fn state(&self) -> WorkerState {
        let mut lifecycle = self.lock_lifecycle();
        lifecycle.promote_finished();
        match *lifecycle {
            Lifecycle::Uninitialized => WorkerState::Uninitialized,
            Lifecycle::Running { .. } => WorkerState::Running,
            Lifecycle::Stopping { .. } => WorkerState::Stopping,
            Lifecycle::Stopped => WorkerState::Stopped,
        }
    }

    pub fn stats(&self) -> Arc<CompressionStats> {
        self.stats.clone()
    }
}

impl Drop for LogCompressor {
    // Without a close the task would wait on the queue forever.
    fn drop(&mut self) {
        let lifecycle = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Lifecycle::Running { queue, .. } = lifecycle {
            queue.close();
        }
    }
}
