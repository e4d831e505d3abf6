use std::{io, path::PathBuf};

use thiserror::Error;

/// Returned to producers when the worker is not accepting paths, either because it was never
/// started or because it is shutting down.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("log compressor is not running")]
pub struct NotRunning;

/// Failures of `LogCompressor::init`. The instance is left uninitialized on every variant.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("log compressor has already been initialized")]
    AlreadyInitialized,
    #[error("log compressor has been stopped, construct a new one to restart")]
    Stopped,
    #[error("log compressor lifecycle lock is poisoned")]
    SyncPrimitive,
    #[error("no async runtime available to run the compression task")]
    ThreadSpawn(#[source] tokio::runtime::TryCurrentError),
}

#[derive(Debug, Error)]
pub enum CompressError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("compressed block of {len} bytes exceeds buffer capacity of {capacity} bytes")]
    Overflow { len: usize, capacity: usize },
    #[error("compression task panicked")]
    Panicked,
}

/// Per-file failures. These never stop the worker, they are logged and resolved by removing any
/// partial output.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to open source {}", path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open destination {}", path.display())]
    DestOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read source {}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to compress block of {}", path.display())]
    Compression {
        path: PathBuf,
        #[source]
        source: CompressError,
    },
    #[error("failed to write {expected} compressed bytes to {}", path.display())]
    ShortWrite {
        path: PathBuf,
        expected: usize,
        #[source]
        source: io::Error,
    },
    #[error("output path for {} is the source itself", path.display())]
    OutputIsSource { path: PathBuf },
}
