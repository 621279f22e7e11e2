//! Statistics formatting for planning and export runs
//!
//! This module renders the end-of-run report:
//! - Planning statistics (windows counted, unmeasured windows, oversized bins)
//! - Export totals (bins exported, skipped, failed; records; bytes)
//! - One line per failed bin

use crate::executor::ExportSummary;
use crate::planner::PlanReport;
use crate::utils::time::to_iso8601;

/// Statistics formatter for a run
pub struct StatsFormatter {
    /// List every failed bin
    show_failures: bool,
}

impl StatsFormatter {
    pub fn new(show_failures: bool) -> Self {
        Self { show_failures }
    }

    /// Format planning statistics
    pub fn format_plan(&self, plan: &PlanReport, consolidated: usize) -> String {
        let mut parts = vec![
            format!("{} windows counted", plan.windows_counted),
            format!("{} bins planned", plan.bins.len()),
            format!("{} after consolidation", consolidated),
            format!("{} records", plan.total_records()),
        ];

        if plan.unmeasured_windows > 0 {
            parts.push(format!(
                "{} unmeasured windows taken as empty",
                plan.unmeasured_windows
            ));
        }
        if plan.oversized_bins > 0 {
            parts.push(format!(
                "{} bins above the ceiling at the minimum slice",
                plan.oversized_bins
            ));
        }

        format!("Plan: {}", parts.join(", "))
    }

    /// Format export totals
    pub fn format_export(&self, summary: &ExportSummary) -> String {
        let mut lines = vec![format!(
            "Export: {} exported, {} skipped, {} failed of {} bins ({} records, {}, {} ms)",
            summary.exported,
            summary.skipped,
            summary.failed,
            summary.total_bins,
            summary.records_exported,
            format_bytes(summary.bytes_written),
            summary.elapsed_ms
        )];

        if summary.cancelled {
            lines.push(format!(
                "Cancelled: {} bins not attempted",
                summary.not_attempted()
            ));
        }

        if self.show_failures {
            for failure in &summary.failures {
                lines.push(format!(
                    "  failed {} .. {}: {}",
                    to_iso8601(&failure.bin.start()),
                    to_iso8601(&failure.bin.end()),
                    failure.error
                ));
            }
        }

        lines.join("\n")
    }
}

impl Default for StatsFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Human readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
