//! 分层响应缓存模块：进程内 L1 与受熔断器保护的远端 L2 协同工作。
//!
//! # Tiered Response Cache Module
//!
//! This module implements the two-tier cache for AI operation responses:
//! a bounded in-process LRU front (L1) plus a remote byte store (L2, Redis in
//! production) reached only through the circuit breaker.
//!
//! ## Overview
//!
//! Tiering matters because response sizes vary by orders of magnitude:
//! - Small/medium texts are cheap to keep in memory and have high working-set
//!   locality, so they are promoted to L1.
//! - Large/xlarge texts are fingerprinted by hash and live only in L2,
//!   compressed above a configurable threshold.
//! - Cache unavailability degrades reads into misses instead of failures.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TieredResponseCache`] | L1/L2 orchestration with TTL table, compression, and stats |
//! | [`KeyGenerator`] | Deterministic fingerprinting over (text, operation, options, question) |
//! | [`TextTier`] | Length-based classification driving hashing and promotion policy |
//! | [`MemoryCache`] | Bounded in-process LRU (L1) |
//! | [`RemoteStore`] | Trait for the remote byte store (L2) |
//! | [`InMemoryStore`] | In-memory `RemoteStore` for development and tests |
//!
//! ## Example
//!
//! ```rust,no_run
//! use ai_response_cache::cache::{InMemoryStore, TieredResponseCache};
//! use ai_response_cache::config::CacheSettings;
//! use ai_response_cache::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn demo() -> ai_response_cache::Result<()> {
//! let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::new("redis"))?);
//! let cache = TieredResponseCache::new(
//!     CacheSettings::default(),
//!     Arc::new(InMemoryStore::new()),
//!     breaker,
//! )?;
//!
//! cache
//!     .cache_response("text", "summarize", &json!({}), &json!({"summary": "s"}), None)
//!     .await?;
//! let hit = cache
//!     .get_cached_response("text", "summarize", &json!({}), None)
//!     .await?;
//! assert!(hit.is_some());
//! # Ok(())
//! # }
//! ```

pub mod key;
pub mod memory;
pub mod store;
pub mod tiered;

pub use key::{CacheKey, KeyGenerator, TextTier, TierThresholds};
pub use memory::MemoryCache;
pub use store::{InMemoryStore, RemoteStore};
pub use tiered::{CacheStats, TieredResponseCache, CACHED_AT_FIELD};
