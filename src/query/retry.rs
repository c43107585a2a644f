//! Retry with capped exponential backoff for reads.

use std::future::Future;
use std::time::Duration;

use crate::error::{AutoPartError, ErrorCategory};

/// Retry policy for cached reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// No retries at all; the write policy.
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Execute an async operation with retry.
    ///
    /// Session errors are never retried: the refresh coordinator has already
    /// given up and another attempt would only end the session again.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, AutoPartError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AutoPartError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt >= self.retries || !should_retry(&e) {
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        retries = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying read after error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn should_retry(error: &AutoPartError) -> bool {
    !matches!(
        error.category(),
        ErrorCategory::Authentication | ErrorCategory::SessionExpired
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(31), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_once_by_default() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result = RetryPolicy::default()
            .execute(|| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AutoPartError::api(503, "down"))
                }
            })
            .await;

        assert!(matches!(result, Err(AutoPartError::Api { status: 503, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result = RetryPolicy::default()
            .execute(|| {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(AutoPartError::Timeout(30_000))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
    }

    #[tokio::test]
    async fn session_errors_are_not_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result = RetryPolicy::default()
            .execute(|| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AutoPartError::NoRefreshToken)
                }
            })
            .await;

        assert!(matches!(result, Err(AutoPartError::NoRefreshToken)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn none_policy_runs_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let _ = RetryPolicy::none()
            .execute(|| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AutoPartError::Timeout(1))
                }
            })
            .await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
