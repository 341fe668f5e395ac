//! Single-retry policy with jittered backoff.
//!
//! Every remote step gets exactly two attempts. Between them the caller sleeps
//! for a delay drawn uniformly from `[backoff_min, backoff_max]`.

use heirloom_core::config::AnalysisConfig;
use heirloom_core::constants::{DEFAULT_RETRY_BACKOFF_MAX_MS, DEFAULT_RETRY_BACKOFF_MIN_MS};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// The last error of an operation that used up its attempts.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub error: E,
    /// Attempt on which `error` occurred (1-based).
    pub attempts: u32,
}

impl<E> RetryExhausted<E> {
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff_min: Duration,
    backoff_max: Duration,
}

impl RetryPolicy {
    /// Initial attempt plus one retry.
    pub const MAX_ATTEMPTS: u32 = 2;

    /// A `max` below `min` is raised to `min`.
    pub fn new(backoff_min: Duration, backoff_max: Duration) -> Self {
        Self {
            backoff_min,
            backoff_max: backoff_max.max(backoff_min),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_backoff_min_ms),
            Duration::from_millis(config.retry_backoff_max_ms),
        )
    }

    pub fn backoff_min(&self) -> Duration {
        self.backoff_min
    }

    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }

    /// Draw the delay before the retry.
    pub fn next_backoff(&self) -> Duration {
        let min = self.backoff_min.as_millis() as u64;
        let max = self.backoff_max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Run `operation`, retrying once after a jittered backoff if it fails.
    ///
    /// `operation` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Succeeded on retry");
                    }
                    return Ok(value);
                }
                Err(error) if attempt < Self::MAX_ATTEMPTS => {
                    let delay = self.next_backoff();
                    tracing::warn!(
                        error = %error,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        "Attempt failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(RetryExhausted {
                        error,
                        attempts: attempt,
                    })
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_RETRY_BACKOFF_MIN_MS),
            Duration::from_millis(DEFAULT_RETRY_BACKOFF_MAX_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..500 {
            let delay = policy.next_backoff();
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_inverted_bounds_collapse_to_min() {
        let policy = RetryPolicy::new(Duration::from_millis(800), Duration::from_millis(100));
        assert_eq!(policy.backoff_max(), Duration::from_millis(800));
        assert_eq!(policy.next_backoff(), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryExhausted<String>> = RetryPolicy::default()
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(attempt) }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exactly_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryExhausted<String>> = RetryPolicy::default()
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {}", attempt)) }
            })
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.error, "failure 2");
        assert_eq!(exhausted.attempts, 2);
        assert!(exhausted.was_retried());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_backoff_before_retry() {
        let policy = RetryPolicy::new(Duration::from_millis(500), Duration::from_millis(1500));
        let start = tokio::time::Instant::now();

        let result: Result<&str, RetryExhausted<&str>> = policy
            .run(|attempt| async move {
                if attempt == 1 {
                    Err("transient")
                } else {
                    Ok("recovered")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(500), "{:?}", waited);
        assert!(waited <= Duration::from_millis(1500), "{:?}", waited);
    }
}
