//! Retry with exponential backoff and full jitter (C5).
//!
//! A config struct, an injectable randomness source, and a typed
//! exhaustion error — a pure function over an injected `Clock`/`Prng` so
//! the whole thing stays deterministic under test.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::rng::SharedPrng;

/// Tuning parameters for [`execute_with_retry`] (spec.md §4.5).
#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Whether to apply full jitter (uniform in `[0, ceiling]`) or use the
    /// ceiling itself as the delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Backoff ceiling for `attempt` (1-indexed), before jitter:
    /// `min(max_delay_ms, base_delay_ms * backoff_multiplier^(attempt - 1))`.
    pub fn backoff_ceiling_ms(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1);
        let scaled = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exp as i32);
        scaled.min(self.max_delay_ms as f64) as u64
    }

    /// Applies full jitter (a uniform delay in `[0, ceiling]`) when
    /// `jitter` is enabled, otherwise returns the ceiling itself.
    pub fn jittered_delay_ms(&self, attempt: u32, prng: &SharedPrng) -> u64 {
        let ceiling = self.backoff_ceiling_ms(attempt);
        if self.jitter {
            (prng.next_f64() * ceiling as f64).round() as u64
        } else {
            ceiling
        }
    }
}

/// Raised when every attempt permitted by [`RetryConfig::max_attempts`] has
/// failed.
#[derive(Debug, Clone)]
pub struct RetryExhaustedError {
    pub attempts: u32,
    pub last_error: String,
}

impl fmt::Display for RetryExhaustedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "retry exhausted after {} attempt(s): {}",
            self.attempts, self.last_error
        )
    }
}

impl std::error::Error for RetryExhaustedError {}

/// Runs `action`, retrying on failures that `is_retryable` accepts, sleeping
/// a jittered exponential backoff between attempts. Bails out immediately
/// (without consuming a remaining attempt as a "soft" failure) the first
/// time `is_retryable` returns `false`.
pub async fn execute_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    prng: &SharedPrng,
    is_retryable: impl Fn(&E) -> bool,
    mut action: F,
) -> Result<T, RetryExhaustedError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match action(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = is_retryable(&err);
                if !retryable || attempt >= config.max_attempts {
                    return Err(RetryExhaustedError {
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }
                let delay_ms = config.jittered_delay_ms(attempt, prng);
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

/// Outcome of one item in a [`run_batch_with_retry`] call.
#[derive(Debug)]
pub enum BatchOutcome<T> {
    Success(T),
    Failed(RetryExhaustedError),
}

/// Runs `execute_with_retry` over a batch of independent items concurrently,
/// returning one outcome per item in input order (spec.md §4.5,
/// `BatchRetryExecutor`). A failure in one item never aborts the others.
///
/// `action(item, attempt)` is invoked fresh for every attempt of every item;
/// it must not assume ordering relative to other items.
pub async fn run_batch_with_retry<I, A, Fut, T, E>(
    config: RetryConfig,
    prng: SharedPrng,
    is_retryable: impl Fn(&E) -> bool + Clone + Send + 'static,
    items: Vec<I>,
    action: A,
) -> Vec<BatchOutcome<T>>
where
    I: Clone + Send + 'static,
    A: Fn(I, u32) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let mut handles = Vec::with_capacity(items.len());
    for item in items {
        let prng = prng.clone();
        let is_retryable = is_retryable.clone();
        let action = action.clone();
        handles.push(tokio::spawn(async move {
            execute_with_retry(&config, &prng, is_retryable, move |attempt| {
                action(item.clone(), attempt)
            })
            .await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(Ok(value)) => results.push(BatchOutcome::Success(value)),
            Ok(Err(err)) => results.push(BatchOutcome::Failed(err)),
            Err(join_err) => results.push(BatchOutcome::Failed(RetryExhaustedError {
                attempts: 0,
                last_error: format!("task panicked: {join_err}"),
            })),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::DefaultPrng;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_ceiling_doubles_and_then_saturates() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,

            backoff_multiplier: 2.0,
            jitter: true,
        };
        assert_eq!(config.backoff_ceiling_ms(1), 100);
        assert_eq!(config.backoff_ceiling_ms(2), 200);
        assert_eq!(config.backoff_ceiling_ms(3), 400);
        assert_eq!(config.backoff_ceiling_ms(4), 800);
        assert_eq!(config.backoff_ceiling_ms(5), 1_000);
        assert_eq!(config.backoff_ceiling_ms(20), 1_000);
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 1,
            max_delay_ms: 2,

            backoff_multiplier: 2.0,
            jitter: true,
        };
        let prng: SharedPrng = Arc::new(DefaultPrng::from_seed(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<&str, RetryExhaustedError> = execute_with_retry(
            &config,
            &prng,
            |_: &&str| true,
            move |_attempt| {
                let calls_clone = calls_clone.clone();
                async move {
                    let n = calls_clone.fetch_add(1, Ordering::SeqCst);
                    if n < 2 { Err("not yet") } else { Ok("ok") }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let config = RetryConfig::default();
        let prng: SharedPrng = Arc::new(DefaultPrng::from_seed(2));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), RetryExhaustedError> = execute_with_retry(
            &config,
            &prng,
            |_: &&str| false,
            move |_attempt| {
                let calls_clone = calls_clone.clone();
                async move {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    Err("permanent")
                }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 1,

            backoff_multiplier: 2.0,
            jitter: true,
        };
        let prng: SharedPrng = Arc::new(DefaultPrng::from_seed(3));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), RetryExhaustedError> = execute_with_retry(
            &config,
            &prng,
            |_: &&str| true,
            move |_attempt| {
                let calls_clone = calls_clone.clone();
                async move {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    Err("still failing")
                }
            },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
