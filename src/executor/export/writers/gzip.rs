//! Gzip compression of finished bin files.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::debug;

use crate::error::{ExportError, Result};

/// Extension appended to compressed files.
pub const EXTENSION: &str = "gz";

/// Turns a finished file into its compressed sibling.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress `source` into `target`, replacing `target` if it exists.
    async fn compress(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Gzip compressor backed by flate2.
///
/// The encoding runs on the blocking pool so large bins do not stall the
/// runtime.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    /// Create a compressor with `level` in `0..=9`; larger values are clamped.
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

fn gzip_file(source: &Path, target: &Path, level: Compression) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(source)?);
    let out = BufWriter::new(File::create(target)?);
    let mut encoder = GzEncoder::new(out, level);
    io::copy(&mut reader, &mut encoder)?;
    let mut out = encoder.finish()?;
    out.flush()?;
    Ok(())
}

#[async_trait]
impl Compressor for GzipCompressor {
    async fn compress(&self, source: &Path, target: &Path) -> Result<()> {
        let src: PathBuf = source.to_path_buf();
        let dst: PathBuf = target.to_path_buf();
        let level = self.level;

        tokio::task::spawn_blocking(move || gzip_file(&src, &dst, level))
            .await
            .map_err(|e| ExportError::CompressFailed(format!("Compression task failed: {}", e)))?
            .map_err(|e| {
                ExportError::CompressFailed(format!(
                    "Failed to compress {}: {}",
                    source.display(),
                    e
                ))
            })?;

        debug!("Compressed {} -> {}", source.display(), target.display());
        Ok(())
    }
}
