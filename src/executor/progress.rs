//! Progress tracking for planning and export
//!
//! This module provides a spinner while windows are being counted and a bar
//! over the consolidated bins while they are exported, giving users real-time
//! feedback on long runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker for planning and export
///
/// Tracks processed units and displays an optional progress bar with
/// throughput statistics.
pub struct ProgressTracker {
    /// Number of units processed so far
    processed: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `total` - Total number of units if known (None for a spinner)
    /// * `unit` - Label for the unit being counted ("windows", "bins")
    /// * `enable_bar` - Whether to display anything
    ///
    /// # Returns
    /// * `Self` - New progress tracker instance
    pub fn new(total: Option<u64>, unit: &str, enable_bar: bool) -> Self {
        let bar = if enable_bar {
            let pb = match total {
                Some(n) => {
                    let bar = ProgressBar::new(n);
                    let template = format!(
                        "{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} {{msg}}"
                    );
                    if let Ok(style) = ProgressStyle::default_bar().template(&template) {
                        bar.set_style(style.progress_chars("#>-"));
                    }
                    bar
                }
                None => {
                    let bar = ProgressBar::new_spinner();
                    let template = format!("{{spinner:.green}} {{pos}} {unit} {{msg}}");
                    if let Ok(style) = ProgressStyle::default_spinner().template(&template) {
                        bar.set_style(style);
                    }
                    bar
                }
            };
            Some(pb)
        } else {
            None
        };

        Self {
            processed: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Tracker that displays nothing.
    pub fn hidden() -> Self {
        Self::new(None, "", false)
    }

    /// Update progress with new count
    ///
    /// # Arguments
    /// * `count` - Total number of units processed so far
    pub fn update(&self, count: u64) {
        self.processed.store(count, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_position(count);
        }
    }

    /// Replace the trailing message.
    pub fn set_message(&self, msg: String) {
        if let Some(ref bar) = self.bar {
            bar.set_message(msg);
        }
    }

    /// Units processed so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Units per second since the tracker was created.
    pub fn rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.processed() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
