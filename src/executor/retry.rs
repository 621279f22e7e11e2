//! Timeout, retry and exponential backoff for remote operations.
//!
//! Each attempt runs on its own tokio task so a hung driver call can be cut
//! off at a hard deadline. The task handle is owned by a guard that aborts it
//! on drop, so no attempt outlives the call that started it.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{QueryError, Result};

/// Retry settings for one kind of remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts before giving up.
    pub max_retries: u32,
    /// Timeout the caller asked for.
    pub timeout: Duration,
    /// Extra time granted before the attempt is cancelled.
    pub grace: Duration,
    /// Delay after the first failure; doubles after each further failure.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(600),
            grace: Duration::from_secs(5),
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Hard deadline for one attempt, always strictly above `timeout`.
    pub fn deadline(&self) -> Duration {
        self.timeout + self.grace.max(Duration::from_millis(1))
    }

    /// Sleep before the attempt following failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }
}

/// Aborts the wrapped task when dropped.
struct WorkerGuard<T>(JoinHandle<T>);

impl<T> Drop for WorkerGuard<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `make_attempt` until it succeeds or the attempts are used up.
    ///
    /// `make_attempt` is called once per attempt and must build a fresh future.
    ///
    /// # Arguments
    /// * `operation` - Name used in logs and errors
    /// * `make_attempt` - Factory for one attempt of the operation
    ///
    /// # Returns
    /// * `Ok(T)` - Result of the first successful attempt
    /// * `Err(QueryError::Exhausted)` - Every attempt failed
    pub async fn execute<F, Fut, T>(
        &self,
        operation: &str,
        mut make_attempt: F,
    ) -> std::result::Result<T, QueryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let attempts = self.policy.max_retries.max(1);
        let mut attempt = 1;

        loop {
            match self.run_attempt(operation, make_attempt()).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}/{}", operation, attempt, attempts);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    warn!(
                        "{} failed on attempt {}/{}: {}",
                        operation, attempt, attempts, err
                    );
                    if attempt >= attempts {
                        return Err(QueryError::Exhausted {
                            operation: operation.to_string(),
                            attempts,
                            last_error: Box::new(err),
                        });
                    }
                    let delay = self.policy.backoff(attempt);
                    debug!("Retrying {} in {} ms", operation, delay.as_millis());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn run_attempt<Fut, T>(
        &self,
        operation: &str,
        attempt: Fut,
    ) -> Result<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut worker = WorkerGuard(tokio::spawn(attempt));
        let deadline = self.policy.deadline();

        match tokio::time::timeout(deadline, &mut worker.0).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(join_err)) => Err(QueryError::TaskFailed(join_err.to_string()).into()),
            Err(_) => Err(QueryError::Timeout {
                operation: operation.to_string(),
                limit: deadline,
            }
            .into()),
        }
    }
}
