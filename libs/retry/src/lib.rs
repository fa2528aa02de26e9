//! Bounded retry primitives.
//!
//! This library provides a fixed-delay retry policy for fallible async
//! operations. Key properties:
//!
//! - **Bounded**: at most `max_attempts` invocations, never more.
//! - **Fixed delay**: the same pause between consecutive attempts, and no
//!   pause after the final one.
//! - **Transparent**: the caller sees either the first success or the last
//!   error along with the attempt count.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// All attempts of a retried operation failed.
///
/// Carries the last error so callers can decide whether to surface it or
/// degrade.
#[derive(Debug, Error)]
#[error("retries exhausted after {attempts} attempts: {last_error}")]
pub struct RetriesExhausted<E> {
    /// Number of attempts that were made.
    pub attempts: u32,

    /// The error returned by the final attempt.
    #[source]
    pub last_error: E,
}

/// A fixed-delay retry policy.
///
/// `max_attempts` counts every invocation, so `max_attempts = 21` means one
/// initial attempt plus twenty retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a new policy.
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number, which is useful for
    /// logging. The delay is applied between attempts only.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetriesExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(last_error) if attempt >= self.max_attempts => {
                    return Err(RetriesExhausted {
                        attempts: attempt,
                        last_error,
                    });
                }
                Err(_) => tokio::time::sleep(self.delay).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Error, PartialEq)]
    #[error("boom {0}")]
    struct Boom(u32);

    #[tokio::test]
    async fn test_first_attempt_success_skips_delay() {
        let policy = RetryPolicy::new(5, Duration::from_secs(3600));

        let start = std::time::Instant::now();
        let result: Result<u32, RetriesExhausted<Boom>> = policy.run(|_| async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        let result = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(Boom(attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let result: Result<(), _> = policy.run(|attempt| async move { Err(Boom(attempt)) }).await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, Boom(3));
    }

    #[tokio::test]
    async fn test_single_attempt_policy_never_sleeps() {
        let policy = RetryPolicy::new(1, Duration::from_secs(3600));

        let start = std::time::Instant::now();
        let result: Result<(), _> = policy.run(|attempt| async move { Err(Boom(attempt)) }).await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
