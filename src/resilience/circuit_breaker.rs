//! Circuit breaker guarding calls to a failing dependency.
//!
//! Reworked around an explicit three-state machine. State and metrics live
//! behind one mutex so a transition and its counter updates are never
//! observably half-applied.

use crate::{Error, ErrorContext, Result};
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Breaker states.
///
/// - `Closed`: normal operation, calls pass through.
/// - `Open`: calls rejected immediately until the recovery timeout elapses.
/// - `HalfOpen`: a bounded number of trial calls probe the dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Name included in every transition log line for operator filtering.
    pub name: String,
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Dwell time in OPEN before a trial call is permitted.
    pub recovery_timeout: Duration,
    /// Trial calls admitted concurrently while HALF_OPEN.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the OPEN-state dwell time before half-open trials
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Set the number of trial calls permitted while HALF_OPEN
    pub fn with_half_open_max_calls(mut self, max_calls: u32) -> Self {
        self.half_open_max_calls = max_calls;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::configuration_with_context(
                "breaker name must not be empty",
                ErrorContext::new().with_field_path("breaker.name"),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(Error::configuration_with_context(
                "failure_threshold must be at least 1",
                ErrorContext::new().with_field_path("breaker.failure_threshold"),
            ));
        }
        if self.recovery_timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "recovery_timeout must be positive",
                ErrorContext::new().with_field_path("breaker.recovery_timeout"),
            ));
        }
        if self.half_open_max_calls == 0 {
            return Err(Error::configuration_with_context(
                "half_open_max_calls must be at least 1",
                ErrorContext::new().with_field_path("breaker.half_open_max_calls"),
            ));
        }
        Ok(())
    }
}

/// Counters and timestamps owned by one breaker. Counters never decrease.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    /// Calls rejected without touching the dependency.
    pub rejected_calls: u64,
    pub circuit_breaker_opens: u64,
    pub circuit_breaker_half_opens: u64,
    pub circuit_breaker_closes: u64,
    pub last_failure: Option<Instant>,
    pub last_success: Option<Instant>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_time: Option<Instant>,
    half_open_in_flight: u32,
    metrics: CircuitBreakerMetrics,
}

/// Point-in-time view of breaker state.
#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Remaining open dwell in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
    pub metrics: CircuitBreakerMetrics,
}

/// Three-state circuit breaker.
///
/// The OPEN→HALF_OPEN transition is evaluated lazily on the next call attempt
/// rather than by a background timer; `last_failure_time` plus the configured
/// recovery timeout is the sole eligibility input.
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Construct a breaker, rejecting invalid configuration up front.
    pub fn new(cfg: CircuitBreakerConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_time: None,
                half_open_in_flight: 0,
                metrics: CircuitBreakerMetrics::default(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    /// Execute `op` under breaker protection.
    ///
    /// Rejects with [`Error::CircuitOpen`] without polling `op` when the
    /// circuit is open and the recovery timeout has not elapsed. Underlying
    /// errors propagate to the caller after being recorded in metrics.
    ///
    /// Safe to cancel: dropping the returned future mid-flight releases any
    /// half-open trial slot it held, so an aborted trial never wedges the
    /// breaker in HALF_OPEN.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut guard = self.before_call()?;
        match op().await {
            Ok(value) => {
                guard.disarm();
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                guard.disarm();
                self.on_failure();
                Err(err)
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(CircuitState::Open)
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.inner
            .lock()
            .map(|inner| inner.metrics.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = Instant::now();
        match self.inner.lock() {
            Ok(inner) => CircuitBreakerSnapshot {
                state: inner.state,
                consecutive_failures: inner.consecutive_failures,
                open_remaining_ms: self.open_remaining_ms(&inner, now),
                metrics: inner.metrics.clone(),
            },
            Err(_) => CircuitBreakerSnapshot {
                state: CircuitState::Open,
                consecutive_failures: 0,
                open_remaining_ms: None,
                metrics: CircuitBreakerMetrics::default(),
            },
        }
    }

    /// Trip the breaker manually (operational drills, dependency maintenance).
    pub fn force_open(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = CircuitState::Open;
            inner.last_failure_time = Some(Instant::now());
            inner.half_open_in_flight = 0;
            inner.metrics.circuit_breaker_opens += 1;
            warn!(breaker = %self.cfg.name, "circuit breaker forced open");
        }
    }

    /// Reset to CLOSED, clearing the consecutive-failure count.
    pub fn reset(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = CircuitState::Closed;
            inner.consecutive_failures = 0;
            inner.half_open_in_flight = 0;
            info!(breaker = %self.cfg.name, "circuit breaker reset to closed");
        }
    }

    fn open_remaining_ms(&self, inner: &Inner, now: Instant) -> Option<u64> {
        if inner.state != CircuitState::Open {
            return None;
        }
        let last = inner.last_failure_time?;
        let reopen_at = last + self.cfg.recovery_timeout;
        if reopen_at > now {
            Some((reopen_at - now).as_millis() as u64)
        } else {
            Some(0)
        }
    }

    fn before_call(&self) -> Result<TrialGuard<'_>> {
        let mut inner = self.inner.lock().map_err(|_| {
            Error::infrastructure_with_context(
                "circuit breaker state poisoned",
                ErrorContext::new().with_source("circuit_breaker"),
            )
        })?;
        match inner.state {
            CircuitState::Closed => Ok(TrialGuard::passthrough(self)),
            CircuitState::Open => {
                let now = Instant::now();
                let eligible = inner
                    .last_failure_time
                    .map(|last| now.duration_since(last) >= self.cfg.recovery_timeout)
                    .unwrap_or(true);
                if eligible {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_in_flight = 1;
                    inner.metrics.circuit_breaker_half_opens += 1;
                    info!(
                        breaker = %self.cfg.name,
                        "circuit breaker half-open, admitting trial call"
                    );
                    Ok(TrialGuard::trial(self))
                } else {
                    inner.metrics.rejected_calls += 1;
                    let remaining = self.open_remaining_ms(&inner, now);
                    Err(Error::CircuitOpen {
                        breaker: self.cfg.name.clone(),
                        retry_after_ms: remaining,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.cfg.half_open_max_calls {
                    inner.half_open_in_flight += 1;
                    Ok(TrialGuard::trial(self))
                } else {
                    inner.metrics.rejected_calls += 1;
                    Err(Error::CircuitOpen {
                        breaker: self.cfg.name.clone(),
                        retry_after_ms: None,
                    })
                }
            }
        }
    }

    fn release_trial_slot(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.state == CircuitState::HalfOpen {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
            }
        }
    }

    fn on_success(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            let now = Instant::now();
            inner.metrics.total_calls += 1;
            inner.metrics.successful_calls += 1;
            inner.metrics.last_success = Some(now);
            match inner.state {
                CircuitState::HalfOpen => {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_in_flight = 0;
                    inner.metrics.circuit_breaker_closes += 1;
                    info!(
                        breaker = %self.cfg.name,
                        "trial call succeeded, circuit breaker closed"
                    );
                }
                CircuitState::Closed => {
                    inner.consecutive_failures = 0;
                }
                // A straggler from before a forced open: record the metric,
                // leave the state machine alone.
                CircuitState::Open => {}
            }
        }
    }

    fn on_failure(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            let now = Instant::now();
            inner.metrics.total_calls += 1;
            inner.metrics.failed_calls += 1;
            inner.metrics.last_failure = Some(now);
            inner.last_failure_time = Some(now);
            match inner.state {
                CircuitState::HalfOpen => {
                    // Full recovery timeout must elapse again before the next trial.
                    inner.state = CircuitState::Open;
                    inner.half_open_in_flight = 0;
                    inner.metrics.circuit_breaker_opens += 1;
                    warn!(
                        breaker = %self.cfg.name,
                        "trial call failed, circuit breaker reopened"
                    );
                }
                CircuitState::Closed => {
                    inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                    if inner.consecutive_failures >= self.cfg.failure_threshold {
                        inner.state = CircuitState::Open;
                        inner.metrics.circuit_breaker_opens += 1;
                        warn!(
                            breaker = %self.cfg.name,
                            consecutive_failures = inner.consecutive_failures,
                            "failure threshold reached, circuit breaker opened"
                        );
                    }
                }
                CircuitState::Open => {}
            }
        }
    }
}

/// Admission ticket for one protected call.
///
/// A half-open trial holds one of the bounded trial slots. The slot is
/// normally released by the completion path (`on_success`/`on_failure`); if
/// the caller's future is dropped mid-flight instead (task abort, a timeout
/// wrapper at the call site), `Drop` releases it so the breaker cannot wedge
/// in HALF_OPEN with all slots leaked.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> TrialGuard<'a> {
    fn passthrough(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            armed: false,
        }
    }

    fn trial(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.release_trial_slot();
        }
    }
}
