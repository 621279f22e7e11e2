//! Export coordinator for the consolidated bins
//!
//! For every bin the coordinator fetches its records through the retry layer,
//! writes them to a raw JSON Lines file, compresses it, verifies the compressed
//! file, removes the raw file and finally appends a manifest row. A bin that
//! fails at any step is recorded and the run moves on to the next one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::QueryBackend;
use crate::error::{BinExportError, ExportError, Result};
use crate::executor::progress::ProgressTracker;
use crate::executor::retry::RetryExecutor;
use crate::planner::ConsolidatedBin;

use super::manifest::{ManifestEntry, ManifestWriter};
use super::writers::{Compressor, FormatWriter, GzipCompressor, JsonLWriter, bin_paths};

/// A bin that could not be exported.
#[derive(Debug, Clone)]
pub struct BinFailure {
    pub bin: ConsolidatedBin,
    pub error: String,
}

/// What happened to a single bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinOutcome {
    /// Written, compressed and recorded in the manifest.
    Exported {
        entry: ManifestEntry,
        bytes: u64,
    },
    /// The fetch returned no records; nothing was written.
    Skipped,
}

/// Totals for an export run
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    /// Number of bins handed to the coordinator
    pub total_bins: u64,
    /// Bins written and recorded in the manifest
    pub exported: u64,
    /// Bins whose fetch returned no records
    pub skipped: u64,
    /// Bins that failed
    pub failed: u64,
    /// Records written across all exported bins
    pub records_exported: u64,
    /// Compressed bytes written
    pub bytes_written: u64,
    /// Failure details in bin order
    pub failures: Vec<BinFailure>,
    /// Whether the run stopped early on cancellation
    pub cancelled: bool,
    /// Time taken for the export
    pub elapsed_ms: u64,
}

impl ExportSummary {
    /// Bins that reached a final state.
    pub fn processed(&self) -> u64 {
        self.exported + self.skipped + self.failed
    }

    /// Bins never attempted because the run was cancelled.
    pub fn not_attempted(&self) -> u64 {
        self.total_bins.saturating_sub(self.processed())
    }

    /// True when every bin was processed without failure.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

/// Coordinator for export operations
pub struct ExportCoordinator {
    /// Backend records are fetched from
    backend: Arc<dyn QueryBackend>,
    /// Retry layer for fetches
    executor: RetryExecutor,
    /// Directory receiving the compressed files
    output_dir: PathBuf,
    /// Single writer of the manifest
    manifest: ManifestWriter,
    /// Compression step
    compressor: Box<dyn Compressor>,
    /// Progress tracker for user feedback
    tracker: ProgressTracker,
    /// Cancellation token checked between bins
    cancel_token: Option<CancellationToken>,
}

impl ExportCoordinator {
    /// Create a new export coordinator with gzip compression and no progress display
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        executor: RetryExecutor,
        output_dir: impl Into<PathBuf>,
        manifest: ManifestWriter,
    ) -> Self {
        Self {
            backend,
            executor,
            output_dir: output_dir.into(),
            manifest,
            compressor: Box::new(GzipCompressor::default()),
            tracker: ProgressTracker::hidden(),
            cancel_token: None,
        }
    }

    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_progress(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export `bins` in order.
    ///
    /// Never fails as a whole: per-bin failures are collected in the summary.
    /// Cancellation is honoured between bins only, so a bin is never left half
    /// written.
    pub async fn execute(&mut self, bins: &[ConsolidatedBin]) -> ExportSummary {
        let start_time = Instant::now();
        let mut summary = ExportSummary {
            total_bins: bins.len() as u64,
            ..ExportSummary::default()
        };

        info!(
            "Exporting {} bins from {} into {}",
            bins.len(),
            self.backend.table_name(),
            self.output_dir.display()
        );

        for (index, bin) in bins.iter().enumerate() {
            if let Some(ref token) = self.cancel_token {
                if token.is_cancelled() {
                    info!(
                        "Export cancelled, {} bins not attempted",
                        bins.len() - index
                    );
                    summary.cancelled = true;
                    break;
                }
            }

            self.tracker.set_message(bin.range.to_string());

            match self.export_bin(bin).await {
                Ok(BinOutcome::Exported { entry, bytes }) => {
                    info!(
                        "Exported {} ({} records, {} bytes)",
                        entry.file_name, entry.record_count, bytes
                    );
                    summary.exported += 1;
                    summary.records_exported += entry.record_count;
                    summary.bytes_written += bytes;
                }
                Ok(BinOutcome::Skipped) => {
                    info!("No records in {}, skipping", bin.range);
                    summary.skipped += 1;
                }
                Err(err) => {
                    warn!("Failed to export {}: {}", bin.range, err);
                    summary.failed += 1;
                    summary.failures.push(BinFailure {
                        bin: *bin,
                        error: err.to_string(),
                    });
                }
            }

            self.tracker.update(index as u64 + 1);
        }

        self.tracker.finish();
        summary.elapsed_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Export finished: {} exported, {} skipped, {} failed, {} records, {} bytes, {} ms",
            summary.exported,
            summary.skipped,
            summary.failed,
            summary.records_exported,
            summary.bytes_written,
            summary.elapsed_ms
        );

        summary
    }

    /// Export a single bin.
    ///
    /// On failure no compressed file for the bin is left behind and the raw
    /// file is always removed.
    pub async fn export_bin(&mut self, bin: &ConsolidatedBin) -> Result<BinOutcome> {
        let backend = Arc::clone(&self.backend);
        let range = bin.range;
        let docs = self
            .executor
            .execute("fetch", move || {
                let backend = Arc::clone(&backend);
                async move { backend.fetch(&range).await }
            })
            .await
            .map_err(|e| ExportError::FetchFailed(e.to_string()))?;

        if docs.is_empty() {
            return Ok(BinOutcome::Skipped);
        }
        if docs.len() as u64 != bin.count {
            debug!(
                "{} planned with {} records, fetched {}",
                bin.range,
                bin.count,
                docs.len()
            );
        }

        let table = self.backend.table_name().to_string();
        let (raw, compressed) = bin_paths(&self.output_dir, &table, bin);

        let written = self.write_compressed(&docs, &raw, &compressed).await;
        remove_if_present(&raw).await;
        let bytes = match written {
            Ok(bytes) => bytes,
            Err(err) => {
                remove_if_present(&compressed).await;
                return Err(err);
            }
        };

        let entry = ManifestEntry {
            file_name: file_name_of(&compressed),
            table_name: table,
            start_time: bin.start(),
            end_time: bin.end(),
            record_count: docs.len() as u64,
        };
        if let Err(err) = self.manifest.append(&entry).await {
            remove_if_present(&compressed).await;
            return Err(err);
        }

        Ok(BinOutcome::Exported { entry, bytes })
    }

    async fn write_compressed(
        &self,
        docs: &[mongodb::bson::Document],
        raw: &Path,
        compressed: &Path,
    ) -> Result<u64> {
        let mut writer = JsonLWriter::new(raw).await.map_err(serialize_failure)?;
        writer.write_batch(docs).await.map_err(serialize_failure)?;
        writer.finalize().await.map_err(serialize_failure)?;
        debug!(
            "Wrote {} records ({} bytes) to {}",
            writer.written(),
            writer.file_size().await.unwrap_or(0),
            raw.display()
        );

        self.compressor.compress(raw, compressed).await?;

        let bytes = tokio::fs::metadata(compressed)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if bytes == 0 {
            return Err(ExportError::EmptyOutput(compressed.display().to_string()).into());
        }
        Ok(bytes)
    }
}

fn serialize_failure(err: BinExportError) -> BinExportError {
    match err {
        BinExportError::Export(_) => err,
        other => ExportError::SerializeFailed(other.to_string()).into(),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn remove_if_present(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
