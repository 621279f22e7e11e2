//! Execution engine for binexport
//!
//! This module provides the layer that talks to the backend and produces
//! files. It includes:
//! - Retry executor with per-attempt timeout and exponential backoff
//! - Range counter applying the zero-on-failure policy
//! - Export coordinator writing, compressing and recording each bin
//! - Progress tracking
//! - The pipeline tying planning, consolidation and export together

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backend::QueryBackend;
use crate::config::ExportSettings;
use crate::error::Result;
use crate::planner::{BinPlanner, ConsolidatedBin, PlanReport, consolidate};

pub mod counter;
pub mod export;
pub mod progress;
pub mod retry;

pub use counter::RangeCounter;
pub use export::{BinFailure, Compressor, ExportCoordinator, ExportSummary, GzipCompressor};
pub use progress::ProgressTracker;
pub use retry::{RetryExecutor, RetryPolicy};

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Bins accepted by the planner
    pub plan: PlanReport,
    /// Bins after consolidation, in export order
    pub consolidated_bins: Vec<ConsolidatedBin>,
    /// Export totals; `None` for a plan-only run
    pub summary: Option<ExportSummary>,
}

impl RunReport {
    /// True unless a bin failed or the export was cancelled.
    pub fn succeeded(&self) -> bool {
        self.summary.as_ref().is_none_or(ExportSummary::is_clean)
    }
}

/// Plan, consolidate and export one range
pub struct ExportPipeline {
    /// Backend for counts and fetches
    backend: Arc<dyn QueryBackend>,
    /// Resolved settings
    settings: ExportSettings,
    /// Compression step; gzip at the configured level when unset
    compressor: Option<Box<dyn Compressor>>,
    /// Cancellation token checked between bins
    cancel_token: Option<CancellationToken>,
}

impl ExportPipeline {
    pub fn new(backend: Arc<dyn QueryBackend>, settings: ExportSettings) -> Self {
        Self {
            backend,
            settings,
            compressor: None,
            cancel_token: None,
        }
    }

    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    /// Set cancellation token for the export stage
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Plan the range and consolidate the result.
    pub async fn plan(&self) -> (PlanReport, Vec<ConsolidatedBin>) {
        let settings = &self.settings;
        let counter = RangeCounter::new(
            Arc::clone(&self.backend),
            RetryExecutor::new(settings.retry),
            settings.count_pause,
        );
        let tracker = ProgressTracker::new(None, "windows", settings.show_progress);

        let report = BinPlanner::new(&counter, settings.planner)
            .with_progress(&tracker)
            .plan_between(settings.start, settings.end)
            .await;
        tracker.finish();

        let consolidated = consolidate(
            report.bins.iter().copied(),
            settings.planner.max_records_per_bin,
        );
        info!(
            "Consolidated {} bins into {}",
            report.bins.len(),
            consolidated.len()
        );

        (report, consolidated)
    }

    /// Run the whole pipeline
    ///
    /// # Returns
    /// * `Result<RunReport>` - Plan and export results; errors only for an unusable output directory
    pub async fn run(self) -> Result<RunReport> {
        self.settings.prepare_output_dir()?;

        let (plan, consolidated_bins) = self.plan().await;

        if self.settings.plan_only {
            info!("Plan only, skipping export");
            return Ok(RunReport {
                plan,
                consolidated_bins,
                summary: None,
            });
        }

        let settings = self.settings;
        let tracker = ProgressTracker::new(
            Some(consolidated_bins.len() as u64),
            "bins",
            settings.show_progress,
        );
        let compressor = self
            .compressor
            .unwrap_or_else(|| {
                Box::new(GzipCompressor::new(settings.compression_level)) as Box<dyn Compressor>
            });

        let mut coordinator = ExportCoordinator::new(
            self.backend,
            RetryExecutor::new(settings.retry),
            settings.output_dir.clone(),
            export::ManifestWriter::new(settings.manifest_path.clone()),
        )
        .with_compressor(compressor)
        .with_progress(tracker);
        if let Some(token) = self.cancel_token {
            coordinator = coordinator.with_cancellation(token);
        }

        let summary = coordinator.execute(&consolidated_bins).await;

        Ok(RunReport {
            plan,
            consolidated_bins,
            summary: Some(summary),
        })
    }
}
