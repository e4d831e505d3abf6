//! # Log Compressor
//! Compresses rotated log files in the background, so the process writing the logs does not pay
//! for it on its hot path.
//!
//! ## Architecture
//! - Producers, usually whatever rotates the logs, call `LogCompressor::append` with the path of
//!   a file they are done writing.
//! - A `WorkQueue` hands those paths, in order, to a single background task.
//! - The task streams each file through a `BlockCompressor` in fixed size blocks, pausing after
//!   every block to bound the load it puts on the host.
//! - Once a file is fully compressed the original is removed. When anything goes wrong the
//!   partial output is removed instead and the original stays where it was.
//!
//! Compression is best effort. Failures are logged and counted in `CompressionStats`, they are
//! never reported back to the producer.
pub mod block_compressor;
pub mod config;
pub mod env;
pub mod error;
pub mod log;
pub mod naming;
pub mod session;
pub mod stats;
pub mod work_queue;
pub mod worker;

pub use block_compressor::{BlockCompressor, CompressorKind};
pub use config::CompressorConfig;
pub use error::{CompressError, FileError, InitError, NotRunning};
pub use stats::CompressionStats;
pub use worker::{LogCompressor, WorkerState};
