//! Exponential back-off retry for export attempts.

use super::{ExportError, ExportResult};
use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// Retry limits for one sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Cap on the delay between attempts.
    pub max_interval: Duration,
    /// Bound on each attempt.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Builds a policy from exporter configuration.
    #[must_use]
    pub fn from_config(retry: &RetryConfig, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: retry.max_attempts.max(1),
            initial_interval: Duration::from_millis(retry.initial_interval_ms),
            max_interval: Duration::from_millis(retry.max_interval_ms),
            attempt_timeout,
        }
    }

    /// Back-off schedule for one delivery.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.initial_interval, self.max_interval)
    }
}

/// Tracks the doubling delay between attempts.
///
/// Each call to [`next_wait`](Self::next_wait) returns the current delay and
/// doubles it for the next call, capped at `max_wait`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current_wait: Duration,
    max_wait: Duration,
}

impl ExponentialBackoff {
    /// Creates a back-off starting at `init_wait`.
    #[must_use]
    pub fn new(init_wait: Duration, max_wait: Duration) -> Self {
        Self {
            current_wait: init_wait.min(max_wait),
            max_wait,
        }
    }

    /// Returns the next wait and advances the schedule.
    pub fn next_wait(&mut self) -> Duration {
        let wait = self.current_wait;
        self.current_wait = self.current_wait.saturating_mul(2).min(self.max_wait);
        wait
    }
}

/// Result of delivering one request with retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Final outcome.
    pub result: ExportResult,
    /// Attempts made, at least 1.
    pub attempts: u32,
}

impl Delivery {
    /// Number of retries after the first attempt.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Calls `attempt` until it succeeds, fails permanently, or the policy's
/// attempts run out.
///
/// Each attempt is bounded by `policy.attempt_timeout`; a timed-out attempt
/// counts as a retryable failure.
pub async fn deliver_with_retry<F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Delivery
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExportResult>,
{
    let mut backoff = policy.backoff();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = match tokio::time::timeout(policy.attempt_timeout, attempt()).await {
            Ok(result) => result,
            Err(_) => Err(ExportError::Retryable(format!(
                "attempt timed out after {}ms",
                policy.attempt_timeout.as_millis()
            ))),
        };

        match result {
            Err(ExportError::Retryable(ref reason)) if attempts < policy.max_attempts => {
                let delay = backoff.next_wait();
                tracing::debug!(
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis(),
                    reason = %reason,
                    "Retrying export after failure"
                );
                tokio::time::sleep(delay).await;
            }
            result => return Delivery { result, attempts },
        }
    }
}
