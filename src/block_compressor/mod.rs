mod gzip_compressor;
mod zstd_compressor;

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
    sync::Arc,
};

pub use gzip_compressor::GzipBlockCompressor;
pub use zstd_compressor::ZstdBlockCompressor;

use crate::error::CompressError;

/// Compresses one bounded block of bytes into a caller supplied buffer.
///
/// Every call produces a self-contained frame, so a file written as a sequence of blocks can be
/// decoded by any reader which accepts concatenated frames.
pub trait BlockCompressor: Send + Sync {
    fn kind(&self) -> CompressorKind;

    /// Upper bound on the compressed size of `block_len` incompressible bytes.
    fn max_compressed_len(&self, block_len: usize) -> usize;

    /// Compresses `source` into `destination`, returning the number of bytes written.
    fn compress_block(&self, source: &[u8], destination: &mut [u8])
        -> Result<usize, CompressError>;
}

/// Identifies the algorithm a worker compresses with. The worker resolves it once, at
/// construction, and never switches at runtime.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum CompressorKind {
    #[default]
    Zstd,
    Gzip,
}

impl CompressorKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            CompressorKind::Zstd => ".zst",
            CompressorKind::Gzip => ".gz",
        }
    }

    pub fn block_compressor(&self) -> Arc<dyn BlockCompressor> {
        match self {
            CompressorKind::Zstd => Arc::new(ZstdBlockCompressor::default()),
            CompressorKind::Gzip => Arc::new(GzipBlockCompressor::default()),
        }
    }
}

impl Display for CompressorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CompressorKind::Zstd => write!(f, "zstd"),
            CompressorKind::Gzip => write!(f, "gzip"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown compression algorithm {0}, expected one of zstd, gzip")]
pub struct UnknownCompressorKind(String);

impl FromStr for CompressorKind {
    type Err = UnknownCompressorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zstd" | "zst" => Ok(CompressorKind::Zstd),
            "gzip" | "gz" => Ok(CompressorKind::Gzip),
            _ => Err(UnknownCompressorKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kind_test() {
        assert_eq!("zstd".parse::<CompressorKind>().unwrap(), CompressorKind::Zstd);
        assert_eq!("GZIP".parse::<CompressorKind>().unwrap(), CompressorKind::Gzip);
        assert!("lz4".parse::<CompressorKind>().is_err());
    }

    #[test]
    fn resolved_compressor_matches_kind_test() {
        for kind in [CompressorKind::Zstd, CompressorKind::Gzip] {
            assert_eq!(kind.block_compressor().kind(), kind);
        }
    }
}
