//! Window counting with the zero-on-failure policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::QueryBackend;
use crate::planner::{CountOutcome, CountSource, TimeRange};

use super::retry::RetryExecutor;

/// Counts windows through the retry layer.
///
/// A window that cannot be counted is reported as [`CountOutcome::Unmeasured`]
/// (zero records) with a warning instead of aborting the export. Every call,
/// successful or not, is followed by `pause` to cap the request rate.
pub struct RangeCounter {
    backend: Arc<dyn QueryBackend>,
    executor: RetryExecutor,
    pause: Duration,
}

impl RangeCounter {
    pub fn new(backend: Arc<dyn QueryBackend>, executor: RetryExecutor, pause: Duration) -> Self {
        Self {
            backend,
            executor,
            pause,
        }
    }

    /// Count `range`, never failing.
    pub async fn count_range(&self, range: &TimeRange) -> CountOutcome {
        let backend = Arc::clone(&self.backend);
        let window = *range;
        let result = self
            .executor
            .execute("count", move || {
                let backend = Arc::clone(&backend);
                async move { backend.count(&window).await }
            })
            .await;

        let outcome = match result {
            Ok(count) => {
                debug!("{} holds {} records", range, count);
                CountOutcome::Measured(count)
            }
            Err(err) => {
                warn!("Unable to count {}, treating it as empty: {}", range, err);
                CountOutcome::Unmeasured
            }
        };

        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
        outcome
    }
}

#[async_trait]
impl CountSource for RangeCounter {
    async fn count(&self, range: &TimeRange) -> CountOutcome {
        self.count_range(range).await
    }
}
