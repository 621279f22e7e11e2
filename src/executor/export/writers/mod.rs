//! Output writers for exported bins
//!
//! This module provides the line-delimited JSON writer used for the raw,
//! bin-scoped file and the compressor that turns it into the final `.gz`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mongodb::bson::Document;
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::error::{ExportError, Result};
use crate::planner::ConsolidatedBin;
use crate::utils::fs::sanitize_file_component;
use crate::utils::time::to_iso8601;

pub mod gzip;
pub mod jsonl;

pub use gzip::{Compressor, GzipCompressor};
pub use jsonl::JsonLWriter;

/// Extension of the raw, uncompressed bin file.
pub const RAW_EXTENSION: &str = "ndjson";

/// Trait for writing documents to an output file
#[async_trait]
pub trait FormatWriter: Send {
    /// Write a batch of documents
    ///
    /// # Arguments
    /// * `docs` - Slice of documents to write
    ///
    /// # Returns
    /// * `Result<usize>` - Number of documents written
    async fn write_batch(&mut self, docs: &[Document]) -> Result<usize>;

    /// Finalize the output (flush buffers)
    async fn finalize(&mut self) -> Result<()>;

    /// Get the current file size in bytes
    async fn file_size(&self) -> Result<u64>;
}

/// File stem for a bin: `{table}_{start}_{end}` with every part made filesystem safe.
pub fn bin_file_stem(table: &str, bin: &ConsolidatedBin) -> String {
    format!(
        "{}_{}_{}",
        sanitize_file_component(table),
        sanitize_file_component(&to_iso8601(&bin.start())),
        sanitize_file_component(&to_iso8601(&bin.end()))
    )
}

/// Raw and compressed paths for a bin inside `dir`.
pub fn bin_paths(dir: &Path, table: &str, bin: &ConsolidatedBin) -> (PathBuf, PathBuf) {
    let stem = bin_file_stem(table, bin);
    let raw = dir.join(format!("{stem}.{RAW_EXTENSION}"));
    let compressed = dir.join(format!("{stem}.{RAW_EXTENSION}.{}", gzip::EXTENSION));
    (raw, compressed)
}

/// Helper function to create a buffered file writer
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).await.map_err(|e| {
        ExportError::SerializeFailed(format!("Failed to create {}: {}", path.display(), e))
    })?;
    Ok(BufWriter::with_capacity(1024 * 1024, file))
}

/// Helper function to validate that the parent directory exists
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ExportError::SerializeFailed(format!(
                "Directory does not exist: {}",
                parent.display()
            ))
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::TimeRange;
    use chrono::{TimeDelta, TimeZone, Utc};

    fn bin() -> ConsolidatedBin {
        let start = Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap();
        ConsolidatedBin {
            range: TimeRange::new(start, start + TimeDelta::minutes(90)).unwrap(),
            count: 12,
        }
    }

    #[test]
    fn test_bin_file_stem_is_filesystem_safe() {
        let stem = bin_file_stem("app logs/prod", &bin());
        assert_eq!(
            stem,
            "app_logs_prod_2024-02-29T23_00_00.000Z_2024-03-01T00_30_00.000Z"
        );
        assert!(!stem.contains(':'));
    }

    #[test]
    fn test_bin_paths() {
        let (raw, gz) = bin_paths(Path::new("out"), "events", &bin());
        assert!(raw.to_string_lossy().ends_with(".ndjson"));
        assert!(gz.to_string_lossy().ends_with(".ndjson.gz"));
        assert_eq!(raw.parent(), Some(Path::new("out")));
    }

    #[test]
    fn test_validate_path_missing_parent() {
        assert!(validate_path(Path::new("/nonexistent/dir/file.ndjson")).is_err());
        assert!(validate_path(Path::new("file.ndjson")).is_ok());
    }
}
