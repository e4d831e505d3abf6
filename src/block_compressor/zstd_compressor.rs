use crate::error::CompressError;

use super::{BlockCompressor, CompressorKind};

const DEFAULT_LEVEL: i32 = 3;

pub struct ZstdBlockCompressor {
    level: i32,
}

impl ZstdBlockCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdBlockCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

impl BlockCompressor for ZstdBlockCompressor {
    fn kind(&self) -> CompressorKind {
        CompressorKind::Zstd
    }

    fn max_compressed_len(&self, block_len: usize) -> usize {
        zstd::zstd_safe::compress_bound(block_len)
    }

    fn compress_block(
        &self,
        source: &[u8],
        destination: &mut [u8],
    ) -> Result<usize, CompressError> {
        let len = zstd::bulk::compress_to_buffer(source, destination, self.level)?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_block_decodes_test() {
        let compressor = ZstdBlockCompressor::default();
        let source = b"2023-10-16 12:00:00 INFO request served\n".repeat(512);
        let mut destination = vec![0; compressor.max_compressed_len(source.len())];

        let len = compressor
            .compress_block(&source, &mut destination)
            .unwrap();

        assert!(len < source.len());
        let decoded = zstd::decode_all(&destination[..len]).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn compress_block_too_small_buffer_test() {
        let compressor = ZstdBlockCompressor::default();
        let source: Vec<u8> = (0..4096u32).map(|i| (i * 7919 % 251) as u8).collect();
        let mut destination = vec![0; 8];

        assert!(compressor
            .compress_block(&source, &mut destination)
            .is_err());
    }
}
