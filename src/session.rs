//! Compresses a single file block by block and retires whichever side should not survive.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncReadExt, AsyncWriteExt},
    task::spawn_blocking,
    time::sleep,
};
use tracing::{debug, instrument, warn};

use crate::{
    block_compressor::BlockCompressor,
    config::CompressorConfig,
    error::{CompressError, FileError},
    naming::output_path,
};

#[derive(Default)]
struct BlockBuffers {
    source: Vec<u8>,
    compressed: Vec<u8>,
}

impl BlockBuffers {
    fn new(block_size: usize, compressor: &dyn BlockCompressor) -> Self {
        Self {
            source: vec![0; block_size],
            compressed: vec![0; compressor.max_compressed_len(block_size)],
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum FileOutcome {
    /// The artifact is complete and the source has been removed.
    Compressed {
        output: PathBuf,
        bytes_read: u64,
        bytes_written: u64,
    },
    /// Someone else removed the source while we were compressing it, the artifact was removed
    /// with it.
    SourceVanished { output: PathBuf },
}

/// Owns the block buffers for the lifetime of the worker, they are allocated once and reused for
/// every file.
pub struct FileCompressor {
    compressor: Arc<dyn BlockCompressor>,
    block_size: usize,
    block_delay: Duration,
    buffers: BlockBuffers,
}

async fn read_block(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

async fn remove_output(output: &Path) {
    match fs::remove_file(output).await {
        Ok(()) => debug!(output = %output.display(), "removed partial output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(output = %output.display(), error = %e, "failed to remove partial output"),
    }
}

impl FileCompressor {
    pub fn new(compressor: Arc<dyn BlockCompressor>, config: &CompressorConfig) -> Self {
        let buffers = BlockBuffers::new(config.block_size, compressor.as_ref());
        Self {
            compressor,
            block_size: config.block_size,
            block_delay: config.block_delay,
            buffers,
        }
    }

    pub fn suffix(&self) -> &'static str {
        self.compressor.kind().suffix()
    }

    /// Compresses `source` into its derived output path.
    ///
    /// On success the source is removed. On any failure, or when the source disappears while we
    /// work, the output is removed and the source is left alone. Neither step is crash atomic, a
    /// crash in between leaves both files on disk.
    #[instrument(skip_all, fields(source = %source.display()))]
    pub async fn compress(&mut self, source: &Path) -> Result<FileOutcome, FileError> {
        let output = output_path(source, self.suffix());
        if output == source {
            return Err(FileError::OutputIsSource {
                path: source.to_path_buf(),
            });
        }

        let mut input = File::open(source)
            .await
            .map_err(|e| FileError::SourceOpen {
                path: source.to_path_buf(),
                source: e,
            })?;
        let mut destination = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&output)
            .await
            .map_err(|e| FileError::DestOpen {
                path: output.clone(),
                source: e,
            })?;

        let streamed = self
            .stream_blocks(source, &output, &mut input, &mut destination)
            .await;
        // Surfaces errors of writes tokio still has in flight.
        let flushed = destination.flush().await;
        drop(input);
        drop(destination);

        let streamed = streamed.and_then(|counts| {
            flushed
                .map(|()| counts)
                .map_err(|e| FileError::ShortWrite {
                    path: output.clone(),
                    expected: counts.1 as usize,
                    source: e,
                })
        });

        let source_present = fs::try_exists(source).await.unwrap_or(false);
        match streamed {
            Ok((bytes_read, bytes_written)) if source_present => {
                if let Err(e) = fs::remove_file(source).await {
                    warn!(error = %e, "failed to remove compressed source, both files remain");
                }
                Ok(FileOutcome::Compressed {
                    output,
                    bytes_read,
                    bytes_written,
                })
            }
            Ok(_) => {
                remove_output(&output).await;
                Ok(FileOutcome::SourceVanished { output })
            }
            Err(e) => {
                remove_output(&output).await;
                Err(e)
            }
        }
    }

    async fn stream_blocks(
        &mut self,
        source: &Path,
        output: &Path,
        input: &mut File,
        destination: &mut File,
    ) -> Result<(u64, u64), FileError> {
        let mut bytes_read = 0u64;
        let mut bytes_written = 0u64;

        loop {
            let len = read_block(input, &mut self.buffers.source)
                .await
                .map_err(|e| FileError::SourceRead {
                    path: source.to_path_buf(),
                    source: e,
                })?;

            if len > 0 {
                let compressed_len =
                    self.compress_block(len)
                        .await
                        .map_err(|e| FileError::Compression {
                            path: source.to_path_buf(),
                            source: e,
                        })?;

                destination
                    .write_all(&self.buffers.compressed[..compressed_len])
                    .await
                    .map_err(|e| FileError::ShortWrite {
                        path: output.to_path_buf(),
                        expected: compressed_len,
                        source: e,
                    })?;

                bytes_read += len as u64;
                bytes_written += compressed_len as u64;
            }

            sleep(self.block_delay).await;

            // A short read means end of file.
            if len < self.block_size {
                break;
            }
        }

        Ok((bytes_read, bytes_written))
    }

    // Compression is CPU bound, it runs on the blocking pool. The buffers travel with it and
    // come back afterwards.
    async fn compress_block(&mut self, len: usize) -> Result<usize, CompressError> {
        let compressor = self.compressor.clone();
        let mut buffers = std::mem::take(&mut self.buffers);

        let joined = spawn_blocking(move || {
            let result =
                compressor.compress_block(&buffers.source[..len], &mut buffers.compressed);
            (buffers, result)
        })
        .await;

        match joined {
            Ok((buffers, result)) => {
                let capacity = buffers.compressed.len();
                self.buffers = buffers;
                let compressed_len = result?;
                if compressed_len > capacity {
                    return Err(CompressError::Overflow {
                        len: compressed_len,
                        capacity,
                    });
                }
                Ok(compressed_len)
            }
            Err(e) => {
                warn!(error = %e, "compression task failed, reallocating block buffers");
                self.buffers = BlockBuffers::new(self.block_size, self.compressor.as_ref());
                Err(CompressError::Panicked)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::MultiGzDecoder;
    use tempfile::tempdir;

    use crate::block_compressor::CompressorKind;

    use super::*;

    fn test_config(kind: CompressorKind) -> CompressorConfig {
        CompressorConfig {
            kind,
            block_size: 64 * 1024,
            block_delay: Duration::ZERO,
            ..CompressorConfig::default()
        }
    }

    fn log_lines(len: usize) -> Vec<u8> {
        let line = b"2023-10-16T12:00:00Z INFO server: handled request path=/api/v1/items\n";
        line.iter().copied().cycle().take(len).collect()
    }

    #[tokio::test]
    async fn compress_zstd_multi_block_test() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("app.log");
        // Not a multiple of the block size, the last block is short.
        let content = log_lines(64 * 1024 * 3 + 1234);
        std::fs::write(&source, &content).unwrap();

        let config = test_config(CompressorKind::Zstd);
        let mut files = FileCompressor::new(config.kind.block_compressor(), &config);
        let outcome = files.compress(&source).await.unwrap();

        let output = dir.path().join("app.log.zst");
        match outcome {
            FileOutcome::Compressed {
                output: ref path,
                bytes_read,
                ..
            } => {
                assert_eq!(path, &output);
                assert_eq!(bytes_read, content.len() as u64);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!source.exists());
        let decoded = zstd::decode_all(std::fs::File::open(&output).unwrap()).unwrap();
        assert_eq!(decoded, content);
    }

    #[tokio::test]
    async fn compress_exact_block_multiple_test() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("exact.log");
        let content = log_lines(64 * 1024 * 2);
        std::fs::write(&source, &content).unwrap();

        let config = test_config(CompressorKind::Zstd);
        let mut files = FileCompressor::new(config.kind.block_compressor(), &config);
        files.compress(&source).await.unwrap();

        let output = dir.path().join("exact.log.zst");
        let decoded = zstd::decode_all(std::fs::File::open(&output).unwrap()).unwrap();
        assert_eq!(decoded, content);
    }

    #[tokio::test]
    async fn compress_gzip_test() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("app.log");
        let content = log_lines(200_000);
        std::fs::write(&source, &content).unwrap();

        let config = test_config(CompressorKind::Gzip);
        let mut files = FileCompressor::new(config.kind.block_compressor(), &config);
        files.compress(&source).await.unwrap();

        let output = dir.path().join("app.log.gz");
        let mut decoded = vec![];
        MultiGzDecoder::new(std::fs::File::open(&output).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, content);
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn compress_empty_file_test() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("empty.log");
        std::fs::write(&source, b"").unwrap();

        let config = test_config(CompressorKind::Zstd);
        let mut files = FileCompressor::new(config.kind.block_compressor(), &config);
        let outcome = files.compress(&source).await.unwrap();

        assert_eq!(
            outcome,
            FileOutcome::Compressed {
                output: dir.path().join("empty.log.zst"),
                bytes_read: 0,
                bytes_written: 0,
            }
        );
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn rejects_already_suffixed_source_test() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("app.log.zst");
        std::fs::write(&source, b"already compressed").unwrap();

        let config = test_config(CompressorKind::Zstd);
        let mut files = FileCompressor::new(config.kind.block_compressor(), &config);
        let result = files.compress(&source).await;

        assert!(matches!(result, Err(FileError::OutputIsSource { .. })));
        assert_eq!(std::fs::read(&source).unwrap(), b"already compressed");
    }

    #[tokio::test]
    async fn missing_source_fails_to_open_test() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("gone.log");

        let config = test_config(CompressorKind::Zstd);
        let mut files = FileCompressor::new(config.kind.block_compressor(), &config);
        let result = files.compress(&source).await;

        assert!(matches!(result, Err(FileError::SourceOpen { .. })));
        assert!(!dir.path().join("gone.log.zst").exists());
    }

    #[tokio::test]
    async fn pauses_after_every_block_test() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("app.log");
        std::fs::write(&source, log_lines(4 * 1024)).unwrap();

        let block_delay = Duration::from_millis(50);
        let config = CompressorConfig {
            block_size: 1024,
            block_delay,
            ..CompressorConfig::default()
        };
        let mut files = FileCompressor::new(config.kind.block_compressor(), &config);

        let started = std::time::Instant::now();
        files.compress(&source).await.unwrap();

        assert!(started.elapsed() >= block_delay * 4);
        assert!(!source.exists());
    }
}
