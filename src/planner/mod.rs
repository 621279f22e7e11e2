//! Adaptive range partitioning
//!
//! The planner turns a requested time range into bins whose record counts
//! stay under a ceiling:
//!
//! 1. **BinPlanner** walks the range in slices and bisects any window whose
//!    count exceeds the ceiling, down to a minimum slice
//! 2. **consolidate** greedily merges adjacent bins back together while the
//!    combined count still fits
//!
//! Counting is abstracted behind [`CountSource`] so the planner can run
//! against the retrying MongoDB counter or a synthetic distribution.

use async_trait::async_trait;

pub mod bisect;
pub mod consolidate;
pub mod range;

pub use bisect::{BinPlanner, PlanReport, PlannerSettings};
pub use consolidate::consolidate;
pub use range::{Bin, ConsolidatedBin, TimeRange};

/// Result of counting one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountOutcome {
    /// The backend answered.
    Measured(u64),
    /// Every attempt failed; treated as an empty window.
    Unmeasured,
}

impl CountOutcome {
    /// Record count used for sizing decisions. Unmeasured windows count as zero.
    pub fn records(&self) -> u64 {
        match self {
            CountOutcome::Measured(n) => *n,
            CountOutcome::Unmeasured => 0,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, CountOutcome::Measured(_))
    }
}

/// Anything that can report how many records fall inside a window.
#[async_trait]
pub trait CountSource: Send + Sync {
    /// Count records in `[range.start, range.end)`. Never fails.
    async fn count(&self, range: &TimeRange) -> CountOutcome;
}
