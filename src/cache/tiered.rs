//! Tiered response cache.
//!
//! Coordinates the key generator, the L1 memory cache, and the remote store
//! behind the circuit breaker. Reads degrade to misses when the breaker is
//! open; writes always surface their failures.

use super::key::{CacheKey, KeyGenerator};
use super::memory::MemoryCache;
use super::store::RemoteStore;
use crate::config::CacheSettings;
use crate::resilience::CircuitBreaker;
use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

// 1-byte entry framing for the remote store's serialized form.
const FRAME_RAW: u8 = 0x00;
const FRAME_ZSTD: u8 = 0x01;

/// Bookkeeping field injected into stored responses. Callers must tolerate it
/// but not depend on it.
pub const CACHED_AT_FIELD: &str = "cached_at";

/// Cache counters. `degraded_reads` counts lookups converted to misses
/// because the circuit was open.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub degraded_reads: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.l1_hits + self.l2_hits;
        let total = hits + self.misses + self.degraded_reads;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    degraded_reads: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            degraded_reads: self.degraded_reads.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Two-tier response cache: in-process LRU front, breaker-guarded remote store.
///
/// Constructed per logical remote dependency and passed by handle; there is
/// no process-global instance.
pub struct TieredResponseCache {
    settings: CacheSettings,
    keygen: KeyGenerator,
    memory: MemoryCache,
    remote: Arc<dyn RemoteStore>,
    breaker: Arc<CircuitBreaker>,
    stats: AtomicStats,
}

impl TieredResponseCache {
    /// Build the cache. Settings are validated here, so a misconfigured
    /// instance never exists.
    pub fn new(
        settings: CacheSettings,
        remote: Arc<dyn RemoteStore>,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self> {
        let settings = settings.build()?;
        let keygen = KeyGenerator::new(settings.namespace.clone(), settings.text_size_tiers)
            .with_promoted_operations(settings.promoted_operations.clone());
        let capacity = NonZeroUsize::new(settings.memory_cache_size)
            .ok_or_else(|| Error::configuration("memory_cache_size must be at least 1"))?;
        let memory = MemoryCache::new(capacity);
        Ok(Self {
            settings,
            keygen,
            memory,
            remote,
            breaker,
            stats: AtomicStats::default(),
        })
    }

    /// Store a response under the fingerprint of its request parameters.
    ///
    /// The write goes to the remote store through the breaker and completes
    /// before returning; promotion-eligible entries are copied into L1 as
    /// well. Write failures, including breaker rejections, propagate.
    pub async fn cache_response(
        &self,
        text: &str,
        operation: &str,
        options: &Value,
        response: &Value,
        question: Option<&str>,
    ) -> Result<()> {
        let response_map = response.as_object().ok_or_else(|| {
            Error::validation_with_context(
                "response must be a mapping",
                ErrorContext::new()
                    .with_field_path("response")
                    .with_source("tiered_cache"),
            )
        })?;
        let key = self.keygen.generate(text, operation, options, question)?;
        let tier = self.keygen.classify_tier(text);
        let ttl = self.settings.ttl_for(operation);

        let mut stored = response_map.clone();
        stored.insert(CACHED_AT_FIELD.to_string(), Value::from(unix_now_secs()));
        let stored = Value::Object(stored);

        let bytes = self.encode(&stored)?;
        let remote = Arc::clone(&self.remote);
        let remote_key = key.clone();
        self.breaker
            .call(|| async move { remote.set(&remote_key, &bytes, ttl).await })
            .await?;
        self.stats.sets.fetch_add(1, Ordering::Relaxed);

        if self.keygen.should_promote_to_memory(tier, operation) {
            self.memory.set(&key, Arc::new(stored), ttl);
        }
        debug!(
            key = %key,
            tier = %tier,
            operation,
            ttl_secs = ttl.as_secs(),
            "cached response"
        );
        Ok(())
    }

    /// Look up a cached response: L1 first, then the remote store.
    ///
    /// A breaker rejection on this path is a soft failure: the lookup returns
    /// `Ok(None)` so cache unavailability degrades into "always miss" instead
    /// of crashing the caller. Callers therefore cannot distinguish "never
    /// cached" from "circuit open" through the return value; that is a
    /// deliberate availability-over-consistency tradeoff.
    pub async fn get_cached_response(
        &self,
        text: &str,
        operation: &str,
        options: &Value,
        question: Option<&str>,
    ) -> Result<Option<Value>> {
        let key = self.keygen.generate(text, operation, options, question)?;
        let tier = self.keygen.classify_tier(text);

        if let Some(value) = self.memory.get(&key) {
            self.stats.l1_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "l1 hit");
            return Ok(Some((*value).clone()));
        }

        let remote = Arc::clone(&self.remote);
        let remote_key = key.clone();
        let fetched = self
            .breaker
            .call(|| async move { remote.get(&remote_key).await })
            .await;

        match fetched {
            Ok(Some(bytes)) => {
                let value = self.decode(&key, &bytes)?;
                self.stats.l2_hits.fetch_add(1, Ordering::Relaxed);
                if self.keygen.should_promote_to_memory(tier, operation) {
                    // Backfill with the operation TTL; the remote entry's
                    // remaining lifetime is not visible through the trait.
                    self.memory.set(
                        &key,
                        Arc::new(value.clone()),
                        self.settings.ttl_for(operation),
                    );
                }
                debug!(key = %key, "l2 hit");
                Ok(Some(value))
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "cache miss");
                Ok(None)
            }
            Err(err) if err.is_circuit_open() => {
                self.stats.degraded_reads.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "circuit open, degrading lookup to miss");
                Ok(None)
            }
            Err(err) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// Drop an entry from both tiers. Returns true when either tier held it.
    ///
    /// Unlike lookups, invalidation does not degrade on an open breaker: a
    /// swallowed delete could leave stale data being served, so the rejection
    /// propagates.
    pub async fn invalidate(
        &self,
        text: &str,
        operation: &str,
        options: &Value,
        question: Option<&str>,
    ) -> Result<bool> {
        let key = self.keygen.generate(text, operation, options, question)?;
        let removed_l1 = self.memory.remove(&key);
        let remote = Arc::clone(&self.remote);
        let remote_key = key.clone();
        let removed_l2 = self
            .breaker
            .call(|| async move { remote.delete(&remote_key).await })
            .await?;
        debug!(key = %key, removed_l1, removed_l2, "invalidated entry");
        Ok(removed_l1 || removed_l2)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn remote_name(&self) -> &'static str {
        self.remote.name()
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let raw = serde_json::to_vec(value)?;
        if raw.len() > self.settings.compression_threshold {
            let compressed = zstd::encode_all(raw.as_slice(), self.settings.compression_level)?;
            debug!(
                raw_bytes = raw.len(),
                compressed_bytes = compressed.len(),
                "compressed response payload"
            );
            let mut framed = Vec::with_capacity(compressed.len() + 1);
            framed.push(FRAME_ZSTD);
            framed.extend_from_slice(&compressed);
            Ok(framed)
        } else {
            let mut framed = Vec::with_capacity(raw.len() + 1);
            framed.push(FRAME_RAW);
            framed.extend_from_slice(&raw);
            Ok(framed)
        }
    }

    // Corrupt entries are an infrastructure fault, never silently treated as
    // a miss: masking them would hide real data problems in the store.
    fn decode(&self, key: &CacheKey, bytes: &[u8]) -> Result<Value> {
        let corrupt = |details: String| {
            Error::infrastructure_with_context(
                "corrupt cache entry",
                ErrorContext::new()
                    .with_details(details)
                    .with_source("tiered_cache"),
            )
        };
        match bytes.split_first() {
            Some((&FRAME_RAW, rest)) => {
                serde_json::from_slice(rest).map_err(|e| corrupt(format!("key {}: {}", key, e)))
            }
            Some((&FRAME_ZSTD, rest)) => {
                let raw = zstd::decode_all(rest)
                    .map_err(|e| corrupt(format!("key {}: {}", key, e)))?;
                serde_json::from_slice(&raw).map_err(|e| corrupt(format!("key {}: {}", key, e)))
            }
            Some((flag, _)) => Err(corrupt(format!("key {}: unknown frame flag {:#04x}", key, flag))),
            None => Err(corrupt(format!("key {}: empty entry", key))),
        }
    }
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
