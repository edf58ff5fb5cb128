//! 弹性模式模块：提供熔断器、重试与故障分类等可靠性保障机制。
//!
//! # Resilience Primitives Module
//!
//! This module provides the fault-tolerance layer that the cache (and any
//! other remote-dependency consumer) builds on: a three-state circuit
//! breaker, a failure-classification taxonomy, and an exponential-backoff
//! retry policy.
//!
//! ## Overview
//!
//! Resilience patterns are essential here to:
//! - Prevent cascade failures when the remote store is unavailable
//! - Fail fast instead of queueing work behind a dead dependency
//! - Retry only the failures where retrying can change the outcome
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CircuitBreaker`] | CLOSED/OPEN/HALF_OPEN state machine with metrics |
//! | [`classify`] / [`FailureClass`] | Transient/permanent/unknown taxonomy over [`crate::Error`] |
//! | [`RetryPolicy`] | Attempt scheduling with capped exponential backoff |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: normal operation, calls pass through
//! - **Open**: failures exceeded threshold, calls fail fast with
//!   [`crate::Error::CircuitOpen`] until the recovery timeout elapses
//! - **Half-Open**: a bounded number of trial calls probe recovery
//!
//! ```rust
//! use ai_response_cache::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn demo() -> ai_response_cache::Result<()> {
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::new("redis")
//!         .with_failure_threshold(5)
//!         .with_recovery_timeout(Duration::from_secs(60)),
//! )?;
//!
//! let value = breaker.call(|| async { Ok(42) }).await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```
//!
//! ## Retry
//!
//! The retry policy consults [`classify`] per failure and never retries
//! permanent or unclassified errors:
//!
//! ```rust
//! use ai_response_cache::resilience::{RetryConfig, RetryPolicy};
//!
//! # async fn demo() -> ai_response_cache::Result<()> {
//! let policy = RetryPolicy::new(RetryConfig::new().with_max_retries(3));
//! let value = policy.run(|_attempt| async { Ok("ready") }).await?;
//! assert_eq!(value, "ready");
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod classify;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerSnapshot,
    CircuitState,
};
pub use classify::{classify, is_retryable, FailureClass};
pub use retry::{AttemptOutcome, RetryConfig, RetryPolicy};
