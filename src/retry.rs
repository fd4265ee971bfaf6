//! Bounded retry with linear backoff.
//!
//! [`RetryExecutor::run`] drives one logical call through up to
//! `attempts` tries. Each try is bounded by the per-attempt timeout; between
//! tries the executor waits `base_delay * attempt`. Only errors whose
//! [`ApiError::is_retryable`] is true are retried, so auth, validation and
//! abort outcomes surface immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::error::ApiError;

/// Retry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Bound on each attempt
    pub timeout: Duration,
    /// Base of the linear backoff
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, timeout: Duration, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            timeout,
            base_delay,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.retry_attempts,
            config.request_timeout,
            config.retry_base_delay,
        )
    }

    /// Wait before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Caller-side cancellation for a whole retry sequence.
///
/// Clones share the same flag. Once aborted, a signal stays aborted.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Every pending and future wait resolves.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has fired.
    pub async fn aborted(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only ends on abort.
        let _ = rx.wait_for(|aborted| *aborted).await;
    }
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails terminally or runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number and must build a fresh
    /// future each time. The last observed error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, signal: Option<&AbortSignal>, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let attempts = self.policy.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if signal.is_some_and(AbortSignal::is_aborted) {
                return Err(ApiError::Aborted);
            }

            match self.attempt(signal, op(attempt)).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    tracing::debug!(
                        attempt,
                        attempts,
                        error = %err,
                        "Retryable failure"
                    );
                    last_error = Some(err);
                }
            }

            if attempt < attempts {
                let delay = self.policy.delay_for(attempt);
                match signal {
                    Some(signal) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = signal.aborted() => return Err(ApiError::Aborted),
                        }
                    }
                    None => tokio::time::sleep(delay).await,
                }
            }
        }

        let err = last_error.unwrap_or(ApiError::Aborted);
        tracing::warn!(attempts, error = %err, "Giving up after exhausting retries");
        Err(err)
    }

    async fn attempt<T, Fut>(&self, signal: Option<&AbortSignal>, fut: Fut) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let timeout = self.policy.timeout;
        let bounded = tokio::time::timeout(timeout, fut);

        let outcome = match signal {
            Some(signal) => {
                tokio::select! {
                    outcome = bounded => outcome,
                    _ = signal.aborted() => return Err(ApiError::Aborted),
                }
            }
            None => bounded.await,
        };

        outcome.unwrap_or_else(|_| {
            Err(ApiError::Network {
                message: format!("Request timed out after {}ms", timeout.as_millis()),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_secs(10), Duration::from_millis(100))
    }

    fn server_error() -> ApiError {
        ApiError::from_status(503, None)
    }

    #[test]
    fn test_delay_is_linear() {
        let policy = fast_policy(3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(RetryPolicy::new(0, policy.timeout, policy.base_delay).attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_policy(3));

        let result = executor
            .run(None, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(server_error())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_makes_exactly_n_attempts() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_policy(4));

        let result: Result<(), _> = executor
            .run(None, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(ApiError::Network {
                        message: format!("attempt {}", attempt),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            result.unwrap_err(),
            ApiError::Network {
                message: "attempt 4".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let executor = RetryExecutor::new(fast_policy(3));
        let start = tokio::time::Instant::now();

        let _: Result<(), _> = executor.run(None, |_| async { Err(server_error()) }).await;

        // 100ms after the first attempt, 200ms after the second, none after the last
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(400), "{:?}", elapsed);
    }

    #[tokio::test]
    async fn test_terminal_errors_short_circuit() {
        for terminal in [
            ApiError::from_status(401, None),
            ApiError::from_status(403, None),
            ApiError::from_status(422, Some("Name taken".to_string())),
            ApiError::Aborted,
        ] {
            let calls = AtomicU32::new(0);
            let executor = RetryExecutor::new(fast_policy(3));
            let expected = terminal.clone();

            let result: Result<(), _> = executor
                .run(None, |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let err = terminal.clone();
                    async move { Err(err) }
                })
                .await;

            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(result.unwrap_err(), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_retryable_network_error() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(RetryPolicy::new(
            2,
            Duration::from_millis(50),
            Duration::from_millis(10),
        ));

        let result = executor
            .run(None, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 1 {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_during_attempt() {
        let signal = AbortSignal::new();
        let executor = RetryExecutor::new(fast_policy(3));

        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.abort();
        });

        let result: Result<(), _> = executor
            .run(Some(&signal), |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert_eq!(result.unwrap_err(), ApiError::Aborted);
        assert!(signal.is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_during_backoff() {
        let signal = AbortSignal::new();
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_policy(3));

        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.abort();
        });

        let result: Result<(), _> = executor
            .run(Some(&signal), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        assert_eq!(result.unwrap_err(), ApiError::Aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_aborted_signal_skips_the_call() {
        let signal = AbortSignal::new();
        signal.abort();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = RetryExecutor::default()
            .run(Some(&signal), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert_eq!(result.unwrap_err(), ApiError::Aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
