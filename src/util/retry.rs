//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::MasError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy for a configured hop retry budget: the first attempt plus
    /// `retry_budget` retries.
    pub fn from_budget(retry_budget: u32) -> Self {
        Self {
            max_attempts: retry_budget.saturating_add(1),
            ..Self::default()
        }
    }

    /// Execute an async operation with retry.
    ///
    /// Only errors reporting [`MasError::is_retryable`] are retried; all
    /// others propagate on the first failure. The last error propagates
    /// once the budget is spent.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, MasError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MasError>>,
    {
        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() || attempt >= self.max_attempts {
                return Err(err);
            }

            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                error = %err,
                "retrying hop"
            );
            tokio::time::sleep(self.backoff_before(attempt + 1)).await;
            attempt += 1;
        }
    }

    /// Pause before the given attempt (1-based): exponential in the
    /// attempt number, capped at `max_backoff`, jittered to 75%-125%.
    fn backoff_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2) as i32;
        let base = (self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent))
            .min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(base * (0.75 + jitter() * 0.5))
    }
}

/// Pseudo-random factor in [0, 1), hashed from the clock and thread id.
fn jitter() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    (hasher.finish() % 10_000) as f64 / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 1.0,
        }
    }

    #[tokio::test]
    async fn succeeds_first_try_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = fast_policy(3)
            .execute(|| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, MasError>(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_timeout_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = fast_policy(3)
            .execute(|| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(MasError::HopTimeout {
                            recipient: "slow_tool".into(),
                            timeout_ms: 1,
                        })
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = fast_policy(5)
            .execute(|| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(MasError::HopLimitExceeded { limit: 16 })
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MasError::HopLimitExceeded { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_returns_last_error() {
        let err = fast_policy(2)
            .execute(|| async {
                Err::<(), _>(MasError::HopTimeout {
                    recipient: "slow_tool".into(),
                    timeout_ms: 1,
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MasError::HopTimeout { .. }));
    }

    #[test]
    fn from_budget_counts_first_attempt() {
        assert_eq!(RetryPolicy::from_budget(0).max_attempts, 1);
        assert_eq!(RetryPolicy::from_budget(2).max_attempts, 3);
    }

    #[test]
    fn backoff_grows_with_attempts_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            multiplier: 2.0,
        };
        // First retry: jittered around the initial backoff.
        let second = policy.backoff_before(2);
        assert!(second >= Duration::from_millis(75));
        assert!(second <= Duration::from_millis(125));
        // Deep retries hit the cap (plus jitter headroom).
        let fifth = policy.backoff_before(5);
        assert!(fifth <= Duration::from_millis(375));
        assert!(fifth >= Duration::from_millis(225));
    }
}
