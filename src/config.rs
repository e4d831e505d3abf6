use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::block_compressor::CompressorKind;

/// 2 MiB, the amount of source read and compressed per iteration.
pub const DEFAULT_BLOCK_SIZE: usize = 2 * 1024 * 1024;
pub const DEFAULT_BLOCK_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MISSING_SOURCE_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
#[error("invalid value {value:?} for {key}")]
pub struct ConfigError {
    key: &'static str,
    value: String,
}

#[derive(Clone, Debug)]
pub struct CompressorConfig {
    pub kind: CompressorKind,
    pub block_size: usize,
    /// Pause after every block, bounding the I/O and CPU load the worker puts on the host.
    pub block_delay: Duration,
    /// Pause after skipping a path whose file no longer exists.
    pub missing_source_backoff: Duration,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            kind: CompressorKind::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            block_delay: DEFAULT_BLOCK_DELAY,
            missing_source_backoff: DEFAULT_MISSING_SOURCE_BACKOFF,
        }
    }
}

fn parse_env_var<T, F>(key: &'static str, parse: F) -> Result<Option<T>, ConfigError>
where
    F: FnOnce(&str) -> Option<T>,
{
    let value = match std::env::var(key) {
        Err(std::env::VarError::NotPresent) => return Ok(None),
        Err(std::env::VarError::NotUnicode(raw)) => {
            return Err(ConfigError {
                key,
                value: raw.to_string_lossy().into_owned(),
            })
        }
        Ok(value) => value,
    };
    debug!("env var {key}: {value}");

    parse(value.trim())
        .map(Some)
        .ok_or(ConfigError { key, value })
}

fn parse_millis(value: &str) -> Option<Duration> {
    value.parse::<u64>().ok().map(Duration::from_millis)
}

impl CompressorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();

        let kind = parse_env_var("LOG_COMPRESS_ALGORITHM", |value| value.parse().ok())?
            .unwrap_or(default.kind);
        let block_size = parse_env_var("LOG_COMPRESS_BLOCK_SIZE", |value| {
            value.parse::<usize>().ok().filter(|size| *size > 0)
        })?
        .unwrap_or(default.block_size);
        let block_delay = parse_env_var("LOG_COMPRESS_BLOCK_DELAY_MS", parse_millis)?
            .unwrap_or(default.block_delay);
        let missing_source_backoff =
            parse_env_var("LOG_COMPRESS_MISSING_BACKOFF_MS", parse_millis)?
                .unwrap_or(default.missing_source_backoff);

        Ok(Self {
            kind,
            block_size,
            block_delay,
            missing_source_backoff,
        })
    }
}
