//! CSV manifest describing every exported file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::utils::time::to_iso8601;

/// Header row written once at the top of the manifest.
pub const MANIFEST_HEADER: &str = "FileName,TableName,StartTime,EndTime,RecordCount";

/// One row of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub file_name: String,
    pub table_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub record_count: u64,
}

impl ManifestEntry {
    /// Render as a CSV line without the trailing newline.
    pub fn to_csv_row(&self) -> String {
        [
            escape_csv(&self.file_name),
            escape_csv(&self.table_name),
            to_iso8601(&self.start_time),
            to_iso8601(&self.end_time),
            self.record_count.to_string(),
        ]
        .join(",")
    }
}

/// Appends rows to the manifest file, adding the header when the file is new or empty.
///
/// Requires `&mut self` so a single writer owns the file during a run.
#[derive(Debug)]
pub struct ManifestWriter {
    path: PathBuf,
}

impl ManifestWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and flush it.
    pub async fn append(&mut self, entry: &ManifestEntry) -> Result<()> {
        let needs_header = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(self.failure(e)),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.failure(e))?;

        let mut buf = String::new();
        if needs_header {
            buf.push_str(MANIFEST_HEADER);
            buf.push('\n');
        }
        buf.push_str(&entry.to_csv_row());
        buf.push('\n');

        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| self.failure(e))?;
        file.flush().await.map_err(|e| self.failure(e))?;

        debug!("Manifest row added for {}", entry.file_name);
        Ok(())
    }

    fn failure(&self, err: std::io::Error) -> crate::error::BinExportError {
        ExportError::ManifestFailed(format!("{}: {}", self.path.display(), err)).into()
    }
}

/// Escape CSV special characters
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
