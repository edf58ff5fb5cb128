//! Retry policy with exponential backoff.
//!
//! The per-error retry decision lives in [`super::classify`]; this module only
//! enforces attempt counts and backoff timing, keeping "is this error worth
//! retrying" separate from "how many times / how long to wait".

use super::classify::is_retryable;
use crate::{Error, Result};
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

/// The result of one attempt, as seen by the retry decision.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    Failed(Error),
}

/// Retry scheduling wrapper around the failure classifier.
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Decide whether an attempt outcome warrants a retry.
    ///
    /// `None` (no attempt state) and successful outcomes never retry; failed
    /// outcomes delegate to the classifier. Attempt-count limits are enforced
    /// by [`RetryPolicy::run`], not here.
    pub fn should_retry_outcome<T>(&self, outcome: Option<&AttemptOutcome<T>>) -> bool {
        match outcome {
            None => false,
            Some(AttemptOutcome::Success(_)) => false,
            Some(AttemptOutcome::Failed(err)) => is_retryable(err),
        }
    }

    /// Calculate backoff for a zero-based attempt number.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.min_delay.as_millis() as u64;
        let cap = self.config.max_delay.as_millis() as u64;

        // Exponential backoff: base * 2^attempt, capped.
        let shift = attempt.min(63);
        let delay = base.saturating_mul(1u64 << shift).min(cap);
        let duration = Duration::from_millis(delay);

        if self.config.jitter {
            jittered(duration)
        } else {
            duration
        }
    }

    /// Run `op` with retries. `op` receives the zero-based attempt number.
    ///
    /// Non-retryable errors and exhausted budgets return the last error as-is.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !is_retryable(&err) {
                        debug!(attempt, error = %err, "error not retryable, failing fast");
                        return Err(err);
                    }
                    if attempt >= self.config.max_retries {
                        warn!(
                            attempts = attempt + 1,
                            error = %err,
                            "retry budget exhausted"
                        );
                        return Err(err);
                    }
                    let delay = self.backoff(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ±10% jitter from the clock's subsecond noise; avoids pulling in an RNG
// dependency for a non-cryptographic perturbation.
fn jittered(duration: Duration) -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let offset = (nanos % 2001) as i64 - 1000; // -1000..=1000
    duration.mul_f64(1.0 + offset as f64 / 10_000.0)
}
