//! # ai-response-cache
//!
//! 面向 AI 工作负载的分层响应缓存：进程内 LRU 前端、受熔断器保护的远端存储、确定性请求指纹。
//!
//! Tiered response cache for AI workloads - an in-process LRU front, a
//! circuit-breaker-guarded remote store, and deterministic request
//! fingerprinting.
//!
//! ## Overview
//!
//! AI operations (summarization, QA, key-point extraction, ...) are expensive
//! and frequently repeated with identical inputs. This library caches their
//! responses behind a deterministic fingerprint over
//! `(text, operation, options, question)` and keeps the hot, small subset in
//! memory while larger payloads live compressed in a remote store.
//!
//! ## Core Philosophy
//!
//! - **Deterministic keys**: identical logical inputs always hit the same
//!   slot, across restarts, regardless of option-map insertion order
//! - **Availability over strict consistency**: when the remote store's
//!   circuit is open, reads degrade to misses instead of failing the caller
//! - **Explicit dependency injection**: one breaker and one cache per remote
//!   dependency, passed by handle - no process-global singletons
//! - **Typed failure taxonomy**: retry decisions are a closed classification
//!   over [`Error`] variants, not exception-hierarchy inspection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_response_cache::cache::{InMemoryStore, TieredResponseCache};
//! use ai_response_cache::config::CacheSettings;
//! use ai_response_cache::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ai_response_cache::Result<()> {
//!     let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::new("redis"))?);
//!     let cache = TieredResponseCache::new(
//!         CacheSettings::default(),
//!         Arc::new(InMemoryStore::new()),
//!         breaker,
//!     )?;
//!
//!     cache
//!         .cache_response(
//!             "the text to analyze",
//!             "summarize",
//!             &json!({"max_length": 100}),
//!             &json!({"summary": "..."}),
//!             None,
//!         )
//!         .await?;
//!
//!     let cached = cache
//!         .get_cached_response("the text to analyze", "summarize", &json!({"max_length": 100}), None)
//!         .await?;
//!     assert!(cached.is_some());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Key generation, tier classification, L1 memory cache, tiered orchestration |
//! | [`resilience`] | Circuit breaker, failure classification, retry policy |
//! | [`config`] | Validated immutable cache settings |
//! | [`error`] | Unified error type and structured error context |

pub mod cache;
pub mod config;
pub mod resilience;

// Re-export main types for convenience
pub use cache::{
    CacheKey, CacheStats, InMemoryStore, KeyGenerator, MemoryCache, RemoteStore, TextTier,
    TieredResponseCache, TierThresholds,
};
pub use config::CacheSettings;
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState, FailureClass,
    RetryConfig, RetryPolicy,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
