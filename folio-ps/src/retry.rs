//! Conflict retry logic
//!
//! Re-runs a read-merge-write cycle when the store reports a write conflict.
//! Linear backoff: after attempt `n` fails, wait `n * backoff_step` before
//! attempt `n + 1`. Any non-conflict error ends the loop immediately.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::store::StoreError;

/// Retry budget for conflicting writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_step: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one attempt
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the given (1-based) failed attempt
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError {
    /// Every attempt hit a write conflict
    Exhausted { attempts: u32, last: StoreError },
    /// A non-conflict error, returned without retrying
    Fatal(StoreError),
}

/// Run `operation` until it succeeds, fails fatally, or exhausts the policy
///
/// The closure receives the 1-based attempt number and must re-read any
/// state it depends on, so a retry merges against the winner's write.
pub async fn retry_on_conflict<F, Fut, T>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Write succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_conflict() => {
                if attempt >= policy.max_attempts() {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Write conflict persisted, retry budget exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                let backoff = policy.backoff_after(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Write conflict, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(RetryError::Fatal(err)),
        }
    }
}
