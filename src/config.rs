//! Cache configuration.
//!
//! `CacheSettings` is an immutable record validated at construction: a
//! misconfigured instance can never be built, so the cache and breaker code
//! consume settings by value without re-checking them.

use crate::cache::key::TierThresholds;
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Validated configuration for [`crate::cache::TieredResponseCache`].
///
/// Built with the builder methods and finalized by [`CacheSettings::build`],
/// which returns `Error::Configuration` for invalid values (zero TTL, zero
/// cache size, non-increasing tier thresholds, out-of-range compression level).
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Key namespace prefix, first segment of every generated key.
    pub namespace: String,
    /// Fallback TTL for operations absent from `operation_ttls`.
    pub default_ttl: Duration,
    /// Per-operation TTL overrides, keyed by operation name.
    pub operation_ttls: HashMap<String, Duration>,
    /// Text-length thresholds driving tier classification.
    pub text_size_tiers: TierThresholds,
    /// Maximum entry count for the L1 memory cache.
    pub memory_cache_size: usize,
    /// Serialized-size threshold (bytes) above which responses are compressed.
    pub compression_threshold: usize,
    /// zstd compression level, 1..=19.
    pub compression_level: i32,
    /// Operations promoted to L1 regardless of text tier.
    pub promoted_operations: Vec<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            namespace: "ai_cache".to_string(),
            default_ttl: Duration::from_secs(3600),
            operation_ttls: HashMap::new(),
            text_size_tiers: TierThresholds::default(),
            memory_cache_size: 100,
            compression_threshold: 1000,
            compression_level: 6,
            promoted_operations: Vec::new(),
        }
    }
}

impl CacheSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_operation_ttl(mut self, operation: impl Into<String>, ttl: Duration) -> Self {
        self.operation_ttls.insert(operation.into(), ttl);
        self
    }

    pub fn with_text_size_tiers(mut self, tiers: TierThresholds) -> Self {
        self.text_size_tiers = tiers;
        self
    }

    pub fn with_memory_cache_size(mut self, size: usize) -> Self {
        self.memory_cache_size = size;
        self
    }

    pub fn with_compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = bytes;
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_promoted_operation(mut self, operation: impl Into<String>) -> Self {
        self.promoted_operations.push(operation.into());
        self
    }

    /// Validate and finalize the settings.
    pub fn build(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::configuration_with_context(
                "namespace must not be empty",
                ErrorContext::new().with_field_path("settings.namespace"),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(Error::configuration_with_context(
                "default_ttl must be positive",
                ErrorContext::new().with_field_path("settings.default_ttl"),
            ));
        }
        for (op, ttl) in &self.operation_ttls {
            if ttl.is_zero() {
                return Err(Error::configuration_with_context(
                    format!("TTL for operation '{}' must be positive", op),
                    ErrorContext::new().with_field_path("settings.operation_ttls"),
                ));
            }
        }
        if self.memory_cache_size == 0 {
            return Err(Error::configuration_with_context(
                "memory_cache_size must be at least 1",
                ErrorContext::new().with_field_path("settings.memory_cache_size"),
            ));
        }
        if !(1..=19).contains(&self.compression_level) {
            return Err(Error::configuration_with_context(
                format!(
                    "compression_level {} out of range (expected 1..=19)",
                    self.compression_level
                ),
                ErrorContext::new().with_field_path("settings.compression_level"),
            ));
        }
        self.text_size_tiers.validate()?;
        Ok(())
    }

    /// TTL for an operation, falling back to `default_ttl` for unlisted ones.
    pub fn ttl_for(&self, operation: &str) -> Duration {
        self.operation_ttls
            .get(operation)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}
