//! Bounded retry for transient storage failures.
//!
//! Unique-constraint races and lock contention surface as
//! [`AppError::Transient`]; mutating operations re-run under this policy and
//! give up after a small fixed number of attempts, at which point the error
//! reaches the caller.

use std::future::Future;
use std::time::Duration;

use tally_common::{AppError, AppResult};

/// Retry policy for transactional operations.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Run `f`, retrying transient failures with exponential backoff.
    ///
    /// Non-transient errors and successes return immediately. Each attempt
    /// must be a complete transaction: nothing of a failed attempt may be
    /// visible when the next one starts.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut f: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match f().await {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.base_delay * 2_u32.saturating_pow(attempt - 1);
                    tracing::debug!(op, attempt, error = %e, "Retrying transient failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => {
                    if let Err(AppError::Transient(_)) = &other {
                        tracing::warn!(op, attempt, "Giving up after transient failures");
                    }
                    return other;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, AppError>(7) }
            })
            .await
            .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AppError::Transient("lock".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::Transient("deadlock".to_string())) }
            })
            .await;
        assert!(result.err().unwrap().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_not_retried() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::PostNotFound(1)) }
            })
            .await;
        assert!(matches!(result, Err(AppError::PostNotFound(1))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
