//! Retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::FetchError;

/// Backoff settings for idempotent requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the default delays.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (0-based): `min(base * 2^attempt, max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

/// Default retry predicate: server errors and 429, never cooldown errors.
pub fn default_retry_on(error: &FetchError) -> bool {
    error.is_retryable()
}

/// Runs `op`, retrying while `retry_on` accepts the error and retries remain.
///
/// Cooldown errors ([`FetchError::RateLimited`]) are never retried, whatever
/// `retry_on` says.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first error
/// `retry_on` rejects.
pub async fn with_retry<T, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    retry_on: P,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    P: Fn(&FetchError) -> bool,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt = attempt + 1, "Request succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                let retryable = !error.is_silent() && retry_on(&error);
                if !retryable || attempt >= policy.max_retries {
                    if attempt > 0 {
                        warn!(operation, error = %error, attempts = attempt + 1, "Request failed after retries");
                    }
                    return Err(error);
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation,
                    error = %error,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis(),
                    "Retryable error, will retry after delay"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::Utc;
    use tokio::time::Instant;

    use super::*;

    fn server_error() -> FetchError {
        FetchError::Transport {
            status: Some(503),
            message: "unavailable".to_string(),
            body: None,
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_three_times_then_succeeds() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let mut seen = Vec::new();

        let result = with_retry(&RetryPolicy::default(), "test", default_retry_on, || {
            seen.push(start.elapsed());
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 3 { Err(server_error()) } else { Ok(n) } }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            seen,
            vec![
                Duration::ZERO,
                Duration::from_millis(1000),
                Duration::from_millis(3000),
                Duration::from_millis(7000),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            with_retry(&RetryPolicy::default(), "test", default_retry_on, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(FetchError::Transport {
                        status: Some(401),
                        message: "unauthorized".to_string(),
                        body: None,
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&RetryPolicy::default(), "test", |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::RateLimited { until: Utc::now() }) }
        })
        .await;

        assert!(result.unwrap_err().is_silent());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&RetryPolicy::new(2), "test", default_retry_on, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(server_error()) }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(503));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
