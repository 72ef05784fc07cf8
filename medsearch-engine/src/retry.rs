//! Exponential backoff with jitter around any fallible async operation.
//!
//! The executor knows nothing about HTTP or sources. Each call site passes
//! its own [`RetryConfig`]; the operation receives the 0-based attempt
//! number so it can vary its behaviour between attempts.
//!
//! Delay before attempt `k` (k ≥ 1) is
//! `min(initial_delay * backoff_factor^(k-1), max_delay)`, then moved by a
//! uniform offset in `±delay * jitter_factor`, never below zero.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Backoff parameters for one call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any pre-jitter delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier applied per retry.
    pub backoff_factor: f64,
    /// Fraction of the delay used as the jitter half-width (0–1).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// Total attempts this config allows.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// All attempts failed; carries the final attempt's error.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Attempts actually made.
    pub attempts: u32,
    /// Error from the last attempt.
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gave up after {} attempts: {}", self.attempts, self.last_error)
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryExhausted<E> {}

/// Pre-jitter delay before attempt `attempt` (0-based). Attempt 0 has none.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let raw_ms = config.initial_delay_ms as f64 * config.backoff_factor.powi(exponent);
    let capped_ms = raw_ms.min(config.max_delay_ms as f64).max(0.0);
    Duration::from_secs_f64(capped_ms / 1000.0)
}

/// Apply uniform jitter of `±delay * jitter_factor`, clamped at zero.
pub fn jittered(delay: Duration, jitter_factor: f64) -> Duration {
    let base = delay.as_secs_f64();
    let spread = base * jitter_factor.clamp(0.0, 1.0);
    if spread <= 0.0 {
        return delay;
    }
    let offset = rand::thread_rng().gen_range(-spread..=spread);
    Duration::from_secs_f64((base + offset).max(0.0))
}

/// Run `op` until it succeeds or `config.max_retries + 1` attempts fail.
///
/// # Errors
///
/// Returns [`RetryExhausted`] wrapping the last error.
pub async fn execute<T, E, F, Fut>(config: &RetryConfig, op: F) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    execute_if(config, op, |_| true).await
}

/// Like [`execute`], but stops early when `should_retry` rejects an error.
///
/// # Errors
///
/// Returns [`RetryExhausted`] wrapping the last error, with `attempts` set
/// to the number of attempts actually made.
pub async fn execute_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut op: F,
    should_retry: P,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let total = config.total_attempts();
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = jittered(backoff_delay(config, attempt), config.jitter_factor);
            tracing::trace!(attempt, delay_ms = delay.as_millis() as u64, "backing off");
            tokio::time::sleep(delay).await;
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let attempts = attempt + 1;
                if attempts >= total || !should_retry(&err) {
                    return Err(RetryExhausted {
                        attempts,
                        last_error: err,
                    });
                }
                tracing::debug!(attempt = attempts, total, error = %err, "attempt failed");
                attempt += 1;
            }
        }
    }
}
