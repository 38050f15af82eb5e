//! Supervised broker calls: bounded attempts, linear backoff, per-attempt
//! timeout and a structured outcome.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{GearError, Result};

/// Result of a supervised call
#[derive(Debug)]
pub enum CallOutcome<T> {
    Success { value: T, attempts: u32 },
    /// Every attempt failed with a retryable error
    RetryableFailure { attempts: u32, last_error: GearError },
    /// An attempt failed with an error that retrying cannot fix
    FatalFailure { attempts: u32, error: GearError },
}

impl<T> CallOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            CallOutcome::Success { attempts, .. }
            | CallOutcome::RetryableFailure { attempts, .. }
            | CallOutcome::FatalFailure { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success { .. })
    }

    /// Exhausted retries surface as `RetriesExhausted`; fatal errors pass through.
    pub fn into_result(self, operation: &str) -> Result<T> {
        match self {
            CallOutcome::Success { value, .. } => Ok(value),
            CallOutcome::RetryableFailure {
                attempts,
                last_error,
            } => Err(GearError::RetriesExhausted {
                operation: operation.to_string(),
                attempts,
                last_error: last_error.to_string(),
            }),
            CallOutcome::FatalFailure { error, .. } => Err(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Sleep `backoff * attempt` after a failed attempt
    pub backoff: Duration,
    /// Bound on each individual attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff: Duration::from_millis(cfg.backoff_ms),
            timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            timeout,
        }
    }

    /// Run `call` until it succeeds, fails fatally or runs out of attempts.
    /// Never makes more than `max_attempts` calls.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> CallOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let error = match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "call succeeded after retry");
                    }
                    return CallOutcome::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Ok(Err(e)) => e,
                Err(_) => GearError::Timeout(format!(
                    "{operation} exceeded {}ms",
                    self.timeout.as_millis()
                )),
            };

            if !error.is_retryable() {
                warn!(operation, attempt, error = %error, "call failed, not retryable");
                return CallOutcome::FatalFailure {
                    attempts: attempt,
                    error,
                };
            }

            if attempt >= self.max_attempts {
                warn!(operation, attempt, error = %error, "call failed, retries exhausted");
                return CallOutcome::RetryableFailure {
                    attempts: attempt,
                    last_error: error,
                };
            }

            let delay = self.backoff * attempt;
            debug!(operation, attempt, ?delay, error = %error, "call failed, backing off");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = fast_policy(3)
            .run("get_quote", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(GearError::adapter("get_quote", "reset"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(outcome.attempts(), 3);
        assert_eq!(outcome.into_result("get_quote").unwrap(), 42);
    }

    #[tokio::test]
    async fn test_never_exceeds_attempt_ceiling() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome: CallOutcome<()> = fast_policy(3)
            .run("get_candles", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GearError::adapter("get_candles", "503"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(outcome, CallOutcome::RetryableFailure { attempts: 3, .. }));
        let err = outcome.into_result("get_candles").unwrap_err();
        assert!(matches!(err, GearError::RetriesExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_fatal_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome: CallOutcome<()> = fast_policy(3)
            .run("login", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GearError::adapter_fatal("login", "bad password"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, CallOutcome::FatalFailure { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(10));
        let outcome: CallOutcome<()> = policy
            .run("get_quote", || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        match outcome {
            CallOutcome::RetryableFailure { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(matches!(last_error, GearError::Timeout(_)));
            }
            other => panic!("expected timeout exhaustion, got {other:?}"),
        }
    }
}
