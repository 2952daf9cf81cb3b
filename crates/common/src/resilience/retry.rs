//! Bounded retry with backoff and jitter
//!
//! Every outbound API call in the engine (token refresh, listing quantity
//! updates, supplier order placement) goes through [`run_with_retry`].
//! Callers supply a classifier closure that decides whether an error is
//! worth retrying; non-retryable errors abort immediately and are returned
//! unchanged.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced by the retry loop.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    #[error("retry attempts exhausted after {attempts} tries: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The operation failed with an error the classifier rejected.
    #[error("non-retryable error: {0}")]
    Aborted(E),
}

impl<E> RetryError<E> {
    /// Unwrap the underlying error regardless of how the loop ended.
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted(err) => err,
        }
    }
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial * factor^retry`, capped at `max`.
    Exponential { initial: Duration, factor: f64, max: Duration },
}

impl Backoff {
    /// Delay before the retry with the given zero-based index.
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial, factor, max } => {
                let millis = initial.as_millis() as f64 * factor.powi(retry as i32);
                let capped = millis.min(max.as_millis() as f64) as u64;
                Duration::from_millis(capped)
            }
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first (must be at least 1).
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Apply full jitter (uniform in `0..=delay`) to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_millis(200),
                factor: 2.0,
                max: Duration::from_secs(30),
            },
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Fixed-delay configuration, mostly useful in tests.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, backoff: Backoff::Fixed(delay), jitter: false }
    }

    fn delay_for(&self, retry: u32) -> Duration {
        let delay = self.backoff.delay_for(retry);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let millis = rand::thread_rng().gen_range(0..=delay.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

/// Run `operation` until it succeeds, the classifier rejects an error, or
/// the attempt ceiling is reached.
pub async fn run_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let attempts = config.max_attempts.max(1);

    for attempt in 0..attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(retries = attempt, "operation succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) if !is_retryable(&err) => {
                debug!(error = %err, "error is not retryable, aborting");
                return Err(RetryError::Aborted(err));
            }
            Err(err) => {
                if attempt + 1 >= attempts {
                    warn!(attempts = attempts, error = %err, "retry attempts exhausted");
                    return Err(RetryError::Exhausted { attempts, last: err });
                }
                let delay = config.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "operation failed, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    // attempts >= 1, so the loop always returns before falling through.
    unreachable!("retry loop exited without a result")
}
