//! Recursive bisection of a time range into bins.
//!
//! The walk is depth-first and left to right, driven by an explicit stack so
//! that pathological slice ratios cannot grow the call stack.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::executor::progress::ProgressTracker;
use crate::utils::time::format_duration;

use super::range::{Bin, TimeRange};
use super::{CountOutcome, CountSource};

/// Sizing parameters for the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerSettings {
    pub initial_slice: TimeDelta,
    pub min_slice: TimeDelta,
    pub max_records_per_bin: u64,
}

/// Output of a planning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanReport {
    /// Accepted bins, contiguous and ordered by start time.
    pub bins: Vec<Bin>,
    /// Count queries issued.
    pub windows_counted: u64,
    /// Windows whose count could not be measured and were taken as empty.
    pub unmeasured_windows: u64,
    /// Bins accepted above the ceiling because the floor was reached.
    pub oversized_bins: u64,
}

impl PlanReport {
    pub fn total_records(&self) -> u64 {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// A window waiting to be sized.
struct Pending {
    window: TimeRange,
    slice: TimeDelta,
    depth: u32,
    known: Option<CountOutcome>,
}

/// Splits a range into bins that fit under `max_records_per_bin`.
pub struct BinPlanner<'a, C: CountSource + ?Sized> {
    counter: &'a C,
    settings: PlannerSettings,
    max_depth: u32,
    progress: Option<&'a ProgressTracker>,
}

impl<'a, C: CountSource + ?Sized> BinPlanner<'a, C> {
    /// Create a planner. Slices must be positive with `min_slice <= initial_slice`;
    /// configuration validation guarantees both.
    pub fn new(counter: &'a C, settings: PlannerSettings) -> Self {
        let mut planner = Self {
            counter,
            settings,
            max_depth: 0,
            progress: None,
        };
        planner.max_depth = planner.depth_bound();
        planner
    }

    /// Report windows counted and bins accepted on a progress spinner.
    pub fn with_progress(mut self, progress: &'a ProgressTracker) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Number of halvings needed to get from the initial slice to the floor.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Plan `[start, end)`. An empty or inverted range yields no bins.
    pub async fn plan_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> PlanReport {
        match TimeRange::new(start, end) {
            Some(range) => self.plan(&range).await,
            None => {
                info!("Requested range is empty, nothing to plan");
                PlanReport::default()
            }
        }
    }

    /// Plan a range into ordered, contiguous bins covering it exactly.
    pub async fn plan(&self, range: &TimeRange) -> PlanReport {
        let mut report = PlanReport::default();
        let initial = self.settings.initial_slice;

        info!(
            "Planning {} with initial slice {}, floor {}, ceiling {}",
            range,
            format_duration(initial),
            format_duration(self.settings.min_slice),
            self.settings.max_records_per_bin
        );

        let mut stack: Vec<Pending> = range
            .windows(initial)
            .into_iter()
            .rev()
            .map(|window| Pending {
                window,
                slice: initial,
                depth: 0,
                known: None,
            })
            .collect();

        while let Some(item) = stack.pop() {
            let outcome = match item.known {
                Some(outcome) => outcome,
                None => {
                    let outcome = self.counter.count(&item.window).await;
                    report.windows_counted += 1;
                    if !outcome.is_measured() {
                        report.unmeasured_windows += 1;
                    }
                    self.tick(&report);
                    outcome
                }
            };
            let count = outcome.records();

            let at_floor = item.slice <= self.settings.min_slice || item.depth >= self.max_depth;
            if count <= self.settings.max_records_per_bin || at_floor {
                if count > self.settings.max_records_per_bin {
                    warn!(
                        "Window {} holds {} records at the minimum slice, accepting it oversized",
                        item.window, count
                    );
                    report.oversized_bins += 1;
                }
                debug!(
                    "Accepted {} with {} records (slice {})",
                    item.window,
                    count,
                    format_duration(item.slice)
                );
                report.bins.push(Bin {
                    range: item.window,
                    count,
                    slice: item.slice,
                });
                continue;
            }

            let next = self.halve(item.slice);
            debug!(
                "Splitting {} ({} records) with slice {}",
                item.window,
                count,
                format_duration(next)
            );

            let windows = item.window.windows(next);
            if windows.len() == 1 {
                // Same window at a smaller slice; its count is already known.
                stack.push(Pending {
                    window: item.window,
                    slice: next,
                    depth: item.depth + 1,
                    known: Some(outcome),
                });
            } else {
                stack.extend(windows.into_iter().rev().map(|window| Pending {
                    window,
                    slice: next,
                    depth: item.depth + 1,
                    known: None,
                }));
            }
        }

        info!(
            "Planned {} bins from {} count queries ({} unmeasured)",
            report.bins.len(),
            report.windows_counted,
            report.unmeasured_windows
        );
        report
    }

    /// Halve a slice in whole milliseconds, rounded down to a multiple of the
    /// floor and never below it.
    pub fn halve(&self, slice: TimeDelta) -> TimeDelta {
        let floor_ms = self.settings.min_slice.num_milliseconds().max(1);
        let half = slice.num_milliseconds() / 2;
        let snapped = (half / floor_ms) * floor_ms;
        TimeDelta::milliseconds(snapped.max(floor_ms))
    }

    fn depth_bound(&self) -> u32 {
        let mut slice = self.settings.initial_slice;
        let mut depth = 0;
        while slice > self.settings.min_slice {
            let next = self.halve(slice);
            if next >= slice {
                break;
            }
            slice = next;
            depth += 1;
        }
        depth
    }

    fn tick(&self, report: &PlanReport) {
        if let Some(progress) = self.progress {
            progress.update(report.windows_counted);
            progress.set_message(format!("{} bins accepted", report.bins.len()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Counter backed by a closure, recording every window it was asked about.
    struct SyntheticCounter<F> {
        f: F,
        calls: Mutex<Vec<TimeRange>>,
    }

    impl<F> SyntheticCounter<F>
    where
        F: Fn(&TimeRange) -> CountOutcome + Send + Sync,
    {
        fn new(f: F) -> Self {
            Self {
                f,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl<F> CountSource for SyntheticCounter<F>
    where
        F: Fn(&TimeRange) -> CountOutcome + Send + Sync,
    {
        async fn count(&self, range: &TimeRange) -> CountOutcome {
            self.calls.lock().unwrap().push(*range);
            (self.f)(range)
        }
    }

    fn day() -> TimeRange {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TimeRange::new(start, start + TimeDelta::days(1)).unwrap()
    }

    fn settings(initial: TimeDelta, min: TimeDelta, max: u64) -> PlannerSettings {
        PlannerSettings {
            initial_slice: initial,
            min_slice: min,
            max_records_per_bin: max,
        }
    }

    fn assert_covers(range: &TimeRange, bins: &[Bin]) {
        assert!(!bins.is_empty());
        assert_eq!(bins[0].range.start(), range.start());
        assert_eq!(bins[bins.len() - 1].range.end(), range.end());
        for pair in bins.windows(2) {
            assert_eq!(pair[0].range.end(), pair[1].range.start());
        }
    }

    #[tokio::test]
    async fn test_day_splits_into_hours() {
        let counter = SyntheticCounter::new(|r: &TimeRange| {
            if r.width() <= TimeDelta::hours(1) {
                CountOutcome::Measured(200)
            } else {
                CountOutcome::Measured(5000)
            }
        });
        let planner = BinPlanner::new(
            &counter,
            settings(TimeDelta::days(1), TimeDelta::hours(1), 1000),
        );

        let report = planner.plan(&day()).await;

        assert_eq!(report.bins.len(), 24);
        assert!(report.bins.iter().all(|b| b.range.width() == TimeDelta::hours(1)));
        assert_covers(&day(), &report.bins);
        assert_eq!(report.unmeasured_windows, 0);
    }

    #[tokio::test]
    async fn test_low_density_accepts_initial_slice() {
        let counter = SyntheticCounter::new(|_: &TimeRange| CountOutcome::Measured(10));
        let planner = BinPlanner::new(
            &counter,
            settings(TimeDelta::hours(6), TimeDelta::minutes(1), 1000),
        );

        let report = planner.plan(&day()).await;

        assert_eq!(report.bins.len(), 4);
        assert_eq!(counter.calls(), 4);
        assert!(report.bins.iter().all(|b| b.slice == TimeDelta::hours(6)));
    }

    #[tokio::test]
    async fn test_unmeasured_window_is_accepted_as_empty() {
        let counter = SyntheticCounter::new(|_: &TimeRange| CountOutcome::Unmeasured);
        let planner = BinPlanner::new(
            &counter,
            settings(TimeDelta::days(1), TimeDelta::hours(1), 1000),
        );

        let report = planner.plan(&day()).await;

        assert_eq!(report.bins.len(), 1);
        assert_eq!(report.bins[0].count, 0);
        assert_eq!(report.unmeasured_windows, 1);
        assert_eq!(counter.calls(), 1);
    }

    #[tokio::test]
    async fn test_ceiling_is_inclusive() {
        let counter = SyntheticCounter::new(|_: &TimeRange| CountOutcome::Measured(1000));
        let planner = BinPlanner::new(
            &counter,
            settings(TimeDelta::days(1), TimeDelta::hours(1), 1000),
        );

        let report = planner.plan(&day()).await;

        assert_eq!(report.bins.len(), 1);
        assert_eq!(report.bins[0].count, 1000);
    }

    #[tokio::test]
    async fn test_floor_accepts_oversized_window() {
        let counter = SyntheticCounter::new(|_: &TimeRange| CountOutcome::Measured(1_000_000));
        let planner = BinPlanner::new(
            &counter,
            settings(TimeDelta::hours(4), TimeDelta::hours(1), 1000),
        );
        let start = day().start();
        let range = TimeRange::new(start, start + TimeDelta::hours(4)).unwrap();

        let report = planner.plan(&range).await;

        assert_eq!(report.bins.len(), 4);
        assert_eq!(report.oversized_bins, 4);
        assert!(report.bins.iter().all(|b| b.slice == TimeDelta::hours(1)));
        assert_covers(&range, &report.bins);
    }

    #[tokio::test]
    async fn test_dense_spike_only_splits_its_window() {
        let spike = day().start() + TimeDelta::hours(13) + TimeDelta::minutes(20);
        let counter = SyntheticCounter::new(move |r: &TimeRange| {
            if r.start() <= spike && spike < r.end() {
                CountOutcome::Measured(5000)
            } else {
                CountOutcome::Measured(0)
            }
        });
        let planner = BinPlanner::new(
            &counter,
            settings(TimeDelta::days(1), TimeDelta::minutes(15), 1000),
        );

        let report = planner.plan(&day()).await;

        assert_covers(&day(), &report.bins);
        let spiked: Vec<_> = report.bins.iter().filter(|b| b.count > 1000).collect();
        assert_eq!(spiked.len(), 1);
        assert_eq!(spiked[0].range.width(), TimeDelta::minutes(15));
        // Only the spike's path is refined: 24h, then 12h, 6h, 3h, 90m, 45m
        // pairs, then the 45m window walked in 15m steps.
        assert_eq!(counter.calls(), 14);
        assert_eq!(planner.max_depth(), 6);
    }

    #[tokio::test]
    async fn test_clamped_tail_window_is_not_recounted() {
        let counter = SyntheticCounter::new(|r: &TimeRange| {
            CountOutcome::Measured(r.width().num_minutes() as u64 * 10)
        });
        let planner = BinPlanner::new(
            &counter,
            settings(TimeDelta::hours(2), TimeDelta::minutes(10), 100),
        );
        let start = day().start();
        let range = TimeRange::new(start, start + TimeDelta::minutes(20)).unwrap();

        let report = planner.plan(&range).await;

        assert_eq!(report.bins.len(), 2);
        assert!(report.bins.iter().all(|b| b.count == 100));
        // One count for the 20 minute window, then two for the 10 minute halves.
        assert_eq!(counter.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_range_yields_no_bins() {
        let counter = SyntheticCounter::new(|_: &TimeRange| CountOutcome::Measured(1));
        let planner = BinPlanner::new(
            &counter,
            settings(TimeDelta::hours(1), TimeDelta::minutes(1), 10),
        );
        let t = day().start();

        let report = planner.plan_between(t, t).await;

        assert!(report.bins.is_empty());
        assert_eq!(counter.calls(), 0);
    }

    #[test]
    fn test_halve_snaps_to_floor_grid() {
        let counter = SyntheticCounter::new(|_: &TimeRange| CountOutcome::Measured(0));
        let planner = BinPlanner::new(
            &counter,
            settings(TimeDelta::days(1), TimeDelta::hours(1), 10),
        );
        assert_eq!(planner.halve(TimeDelta::days(1)), TimeDelta::hours(12));
        assert_eq!(planner.halve(TimeDelta::hours(3)), TimeDelta::hours(1));
        assert_eq!(planner.halve(TimeDelta::hours(1)), TimeDelta::hours(1));
        assert_eq!(planner.max_depth(), 4);
    }

    #[test]
    fn test_halve_indivisible_durations() {
        let counter = SyntheticCounter::new(|_: &TimeRange| CountOutcome::Measured(0));
        let planner = BinPlanner::new(
            &counter,
            settings(
                TimeDelta::milliseconds(7),
                TimeDelta::milliseconds(1),
                10,
            ),
        );
        assert_eq!(planner.halve(TimeDelta::milliseconds(7)), TimeDelta::milliseconds(3));
        assert_eq!(planner.halve(TimeDelta::milliseconds(1)), TimeDelta::milliseconds(1));
        assert_eq!(planner.max_depth(), 2);
    }
}
