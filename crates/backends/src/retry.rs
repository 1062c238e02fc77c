//! Exponential-backoff retry around fallible external calls.
//!
//! Only `Err` results are retried. A backend that wants a failure to be
//! final returns it inside `Ok` (see
//! [`GenerationOutcome::Rejected`](crate::image::GenerationOutcome)), and
//! the policy hands it straight back to the caller.

use std::future::Future;
use std::time::Duration;

use storyreel_core::generation::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY};

/// How many times to try a call and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, the first one included. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Wait after the first failure; doubles after each further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay after the failed try numbered `attempt` (0-based):
    /// `base_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Invoke `operation` until it returns `Ok` or the attempts run out,
    /// returning the last error on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(operation = name, attempt = attempt + 1, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt + 1 >= max_attempts => {
                    tracing::error!(
                        operation = name,
                        attempts = max_attempts,
                        error = %e,
                        "Giving up",
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation = name,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying",
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;
    use crate::image::GenerationOutcome;

    fn policy(base_secs: u64) -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(base_secs))
    }

    #[test]
    fn delays_double_from_base() {
        let p = policy(2);
        assert_eq!(p.delay_for(0), Duration::from_secs(2));
        assert_eq!(p.delay_for(1), Duration::from_secs(4));
        assert_eq!(p.delay_for(2), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_try_after_backoff() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<&str, String> = policy(2)
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient".to_string())
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(7), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy(1)
            .run("always-fails", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("failure {n}"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result, Err("failure 2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn structured_rejection_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<GenerationOutcome<()>, String> = policy(1)
            .run("rejects", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(GenerationOutcome::Rejected("content policy".to_string()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Ok(GenerationOutcome::Rejected(_))));
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = RetryPolicy::new(0, Duration::ZERO)
            .run("once", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("nope")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
