//! Time ranges and the bins carved out of them.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::utils::time::to_iso8601;

/// Half-open interval `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, returning `None` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn width(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Join with a range that starts exactly where this one ends.
    pub fn join(&self, next: &TimeRange) -> Option<TimeRange> {
        (self.end == next.start).then_some(TimeRange {
            start: self.start,
            end: next.end,
        })
    }

    /// Split into consecutive windows of `step`, the last one clamped to `end`.
    ///
    /// `step` must be positive.
    pub fn windows(&self, step: TimeDelta) -> Vec<TimeRange> {
        debug_assert!(step > TimeDelta::zero());
        let mut out = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = cursor
                .checked_add_signed(step)
                .map_or(self.end, |n| n.min(self.end));
            out.push(TimeRange {
                start: cursor,
                end: next,
            });
            cursor = next;
        }
        out
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", to_iso8601(&self.start), to_iso8601(&self.end))
    }
}

/// A window accepted by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bin {
    pub range: TimeRange,
    pub count: u64,
    /// Slice width that produced the window. Diagnostic only.
    pub slice: TimeDelta,
}

/// A window after consolidation; the unit of export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsolidatedBin {
    pub range: TimeRange,
    pub count: u64,
}

impl ConsolidatedBin {
    pub fn start(&self) -> DateTime<Utc> {
        self.range.start()
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.range.end()
    }
}

impl From<Bin> for ConsolidatedBin {
    fn from(bin: Bin) -> Self {
        Self {
            range: bin.range,
            count: bin.count,
        }
    }
}
