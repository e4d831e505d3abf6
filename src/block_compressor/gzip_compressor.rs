use std::io::{Cursor, Write};

use flate2::{write::GzEncoder, Compression};

use crate::error::CompressError;

use super::{BlockCompressor, CompressorKind};

// Gzip member header plus CRC32 and size trailer.
const GZIP_FRAMING_LEN: usize = 18;

/// Writes every block as its own gzip member. Readers must accept multi-member streams, like
/// `flate2::read::MultiGzDecoder` or `gunzip`.
#[derive(Default)]
pub struct GzipBlockCompressor {
    compression: Compression,
}

impl BlockCompressor for GzipBlockCompressor {
    fn kind(&self) -> CompressorKind {
        CompressorKind::Gzip
    }

    // Same bound zlib's compressBound uses for deflate streams.
    fn max_compressed_len(&self, block_len: usize) -> usize {
        block_len + (block_len >> 12) + (block_len >> 14) + (block_len >> 25) + 13 + GZIP_FRAMING_LEN
    }

    fn compress_block(
        &self,
        source: &[u8],
        destination: &mut [u8],
    ) -> Result<usize, CompressError> {
        let capacity = destination.len();
        let mut encoder = GzEncoder::new(Cursor::new(destination), self.compression);
        encoder.write_all(source)?;
        let cursor = encoder.finish()?;
        let len = cursor.position() as usize;
        if len > capacity {
            return Err(CompressError::Overflow { len, capacity });
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::MultiGzDecoder;

    use super::*;

    #[test]
    fn concatenated_blocks_decode_test() {
        let compressor = GzipBlockCompressor::default();
        let first = b"first block\n".repeat(100);
        let second = b"second block\n".repeat(100);

        let mut out = vec![];
        for block in [&first, &second] {
            let mut destination = vec![0; compressor.max_compressed_len(block.len())];
            let len = compressor.compress_block(block, &mut destination).unwrap();
            out.extend_from_slice(&destination[..len]);
        }

        let mut decoded = vec![];
        MultiGzDecoder::new(&out[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, [first, second].concat());
    }
}
