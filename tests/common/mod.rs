#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use binexport::backend::QueryBackend;
use binexport::config::ExportSettings;
use binexport::error::{BinExportError, Result};
use binexport::executor::RetryPolicy;
use binexport::planner::{PlannerSettings, TimeRange};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use mongodb::bson::{Document, doc};

pub type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// In-memory, time-indexed table.
pub struct SyntheticBackend {
    name: String,
    timestamps: Vec<DateTime<Utc>>,
    fail_counts: bool,
    fail_fetches: bool,
    pub count_calls: AtomicU32,
    pub fetch_calls: AtomicU32,
}

impl SyntheticBackend {
    /// `per_hour` evenly spaced records in every hour of `range`.
    pub fn uniform(range: &TimeRange, per_hour: i64) -> Self {
        let step = TimeDelta::milliseconds(3_600_000 / per_hour);
        let mut timestamps = Vec::new();
        let mut ts = range.start();
        while ts < range.end() {
            timestamps.push(ts);
            ts += step;
        }
        Self::from_timestamps(timestamps)
    }

    pub fn from_timestamps(mut timestamps: Vec<DateTime<Utc>>) -> Self {
        timestamps.sort();
        Self {
            name: "events".to_string(),
            timestamps,
            fail_counts: false,
            fail_fetches: false,
            count_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
        }
    }

    pub fn failing_counts(mut self) -> Self {
        self.fail_counts = true;
        self
    }

    pub fn failing_fetches(mut self) -> Self {
        self.fail_fetches = true;
        self
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    fn slice(&self, range: &TimeRange) -> &[DateTime<Utc>] {
        let lo = self.timestamps.partition_point(|t| *t < range.start());
        let hi = self.timestamps.partition_point(|t| *t < range.end());
        &self.timestamps[lo..hi]
    }
}

#[async_trait]
impl QueryBackend for SyntheticBackend {
    async fn count(&self, range: &TimeRange) -> Result<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_counts {
            return Err(BinExportError::Generic("count rejected".to_string()));
        }
        Ok(self.slice(range).len() as u64)
    }

    async fn fetch(&self, range: &TimeRange) -> Result<Vec<Document>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches {
            return Err(BinExportError::Generic("cursor killed".to_string()));
        }
        Ok(self
            .slice(range)
            .iter()
            .map(|t| {
                doc! {
                    "timestamp": mongodb::bson::DateTime::from_millis(t.timestamp_millis()),
                    "msg": "tick",
                }
            })
            .collect())
    }

    fn table_name(&self) -> &str {
        &self.name
    }
}

pub fn day() -> TimeRange {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    TimeRange::new(start, start + TimeDelta::days(1)).unwrap()
}

/// Settings with millisecond retry timings and no progress output.
pub fn settings(
    range: &TimeRange,
    planner: PlannerSettings,
    output_dir: &Path,
) -> ExportSettings {
    ExportSettings {
        database: "telemetry".to_string(),
        collection: "events".to_string(),
        time_field: "timestamp".to_string(),
        filter: None,
        start: range.start(),
        end: range.end(),
        planner,
        retry: RetryPolicy {
            max_retries: 3,
            timeout: Duration::from_millis(500),
            grace: Duration::from_millis(10),
            backoff_base: Duration::from_millis(1),
        },
        count_pause: Duration::ZERO,
        output_dir: output_dir.to_path_buf(),
        manifest_path: output_dir.join("manifest.csv"),
        compression_level: 6,
        plan_only: false,
        show_progress: false,
    }
}

pub fn planner(initial: TimeDelta, min: TimeDelta, ceiling: u64) -> PlannerSettings {
    PlannerSettings {
        initial_slice: initial,
        min_slice: min,
        max_records_per_bin: ceiling,
    }
}

pub fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.to_string_lossy().ends_with(suffix))
                .collect()
        })
        .unwrap_or_default();
    out.sort();
    out
}

/// Manifest rows without the header.
pub fn manifest_rows(path: &Path) -> Vec<Vec<String>> {
    std::fs::read_to_string(path)
        .map(|content| {
            content
                .lines()
                .skip(1)
                .map(|l| l.split(',').map(str::to_string).collect())
                .collect()
        })
        .unwrap_or_default()
}
