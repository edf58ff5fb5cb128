//! Cache key generation and text-size tier classification.

use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Text-size classification bucket.
///
/// Ordering matters: `Small < Medium < Large < Xlarge`, so longer text never
/// classifies into a smaller tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextTier {
    Small,
    Medium,
    Large,
    Xlarge,
}

impl TextTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextTier::Small => "small",
            TextTier::Medium => "medium",
            TextTier::Large => "large",
            TextTier::Xlarge => "xlarge",
        }
    }
}

impl fmt::Display for TextTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Length thresholds separating the four tiers. Strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierThresholds {
    /// Maximum length (bytes) still classified `Small`.
    pub small_max: usize,
    /// Maximum length still classified `Medium`.
    pub medium_max: usize,
    /// Maximum length still classified `Large`; beyond this is `Xlarge`.
    pub large_max: usize,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            small_max: 500,
            medium_max: 5_000,
            large_max: 50_000,
        }
    }
}

impl TierThresholds {
    pub fn new(small_max: usize, medium_max: usize, large_max: usize) -> Result<Self> {
        let t = Self {
            small_max,
            medium_max,
            large_max,
        };
        t.validate()?;
        Ok(t)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.small_max == 0 || self.small_max >= self.medium_max || self.medium_max >= self.large_max {
            return Err(Error::configuration_with_context(
                format!(
                    "tier thresholds must be strictly increasing, got {} / {} / {}",
                    self.small_max, self.medium_max, self.large_max
                ),
                ErrorContext::new().with_field_path("settings.text_size_tiers"),
            ));
        }
        Ok(())
    }
}

/// A deterministic cache key derived from request parameters.
///
/// Derived value only: computed on every request, never stored as an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
}

impl CacheKey {
    pub(crate) fn new(key: String) -> Self {
        Self { key }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

// Bounded raw-text prefix embedded in small/medium keys for debuggability.
const TEXT_PREFIX_CHARS: usize = 40;
// Short-hash widths: enough to make truncation collisions negligible while
// keeping keys readable in redis-cli / MONITOR output.
const TEXT_HASH_PREFIX_LEN: usize = 16;
const SEGMENT_HASH_LEN: usize = 16;

/// Deterministic key generator over (text, operation, options, question).
///
/// Identical logical inputs produce byte-identical keys across process
/// restarts: no salts, no time components, and option maps are canonicalized
/// by key sort before hashing.
pub struct KeyGenerator {
    namespace: String,
    thresholds: TierThresholds,
    promoted_operations: Vec<String>,
}

impl KeyGenerator {
    pub fn new(namespace: impl Into<String>, thresholds: TierThresholds) -> Self {
        Self {
            namespace: namespace.into(),
            thresholds,
            promoted_operations: Vec::new(),
        }
    }

    /// Operations promoted to L1 regardless of text tier.
    pub fn with_promoted_operations(mut self, operations: Vec<String>) -> Self {
        self.promoted_operations = operations;
        self
    }

    /// Classify `text` by length against the configured thresholds.
    pub fn classify_tier(&self, text: &str) -> TextTier {
        let len = text.len();
        if len <= self.thresholds.small_max {
            TextTier::Small
        } else if len <= self.thresholds.medium_max {
            TextTier::Medium
        } else if len <= self.thresholds.large_max {
            TextTier::Large
        } else {
            TextTier::Xlarge
        }
    }

    /// Whether an entry of this tier/operation should live in the L1 memory cache.
    ///
    /// Small and medium entries are promoted by default; configured operations
    /// are promoted regardless of tier.
    pub fn should_promote_to_memory(&self, tier: TextTier, operation: &str) -> bool {
        tier <= TextTier::Medium || self.promoted_operations.iter().any(|op| op == operation)
    }

    /// Build the cache key for a request.
    ///
    /// Small/medium text embeds a sanitized bounded prefix plus a short hash
    /// (the prefix aids debugging; the hash rules out truncation collisions).
    /// Large/xlarge text is represented by its full SHA-256 only. Options are
    /// hashed over a key-sorted canonical form, and the question, if present,
    /// becomes a distinct trailing segment so question/no-question entries
    /// never collide.
    pub fn generate(
        &self,
        text: &str,
        operation: &str,
        options: &Value,
        question: Option<&str>,
    ) -> Result<CacheKey> {
        if text.is_empty() {
            return Err(Error::validation_with_context(
                "text must not be empty",
                ErrorContext::new()
                    .with_field_path("text")
                    .with_source("key_generator"),
            ));
        }
        if operation.is_empty() {
            return Err(Error::validation_with_context(
                "operation must not be empty",
                ErrorContext::new()
                    .with_field_path("operation")
                    .with_source("key_generator"),
            ));
        }
        let options_map = options.as_object().ok_or_else(|| {
            Error::validation_with_context(
                format!("options must be a mapping, got {}", json_type_name(options)),
                ErrorContext::new()
                    .with_field_path("options")
                    .with_source("key_generator"),
            )
        })?;

        let tier = self.classify_tier(text);
        let text_part = match tier {
            TextTier::Small | TextTier::Medium => {
                let prefix: String = text
                    .chars()
                    .take(TEXT_PREFIX_CHARS)
                    .map(sanitize_key_char)
                    .collect();
                format!(
                    "txt:{}:{}:{}",
                    text.len(),
                    prefix,
                    &sha256_hex(text.as_bytes())[..TEXT_HASH_PREFIX_LEN]
                )
            }
            TextTier::Large | TextTier::Xlarge => {
                format!("hash:{}", sha256_hex(text.as_bytes()))
            }
        };

        let opts_part = {
            // BTreeMap canonicalizes key order; insertion order never leaks
            // into the fingerprint.
            let canonical: BTreeMap<&String, &Value> = options_map.iter().collect();
            let serialized = serde_json::to_string(&canonical)?;
            sha256_hex(serialized.as_bytes())[..SEGMENT_HASH_LEN].to_string()
        };

        let mut key = format!(
            "{}:{}:{}:{}:opts:{}",
            self.namespace, operation, tier, text_part, opts_part
        );
        if let Some(q) = question {
            key.push_str(":q:");
            key.push_str(&sha256_hex(q.as_bytes())[..SEGMENT_HASH_LEN]);
        }
        Ok(CacheKey::new(key))
    }
}

fn sanitize_key_char(c: char) -> char {
    if c.is_whitespace() || c == ':' {
        '_'
    } else {
        c
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generator() -> KeyGenerator {
        KeyGenerator::new("ai_cache", TierThresholds::default())
    }

    #[test]
    fn test_key_determinism_across_option_order() {
        let g = generator();
        let a = g
            .generate("some text", "summarize", &json!({"a": 1, "b": 2}), None)
            .unwrap();
        let b = g
            .generate("some text", "summarize", &json!({"b": 2, "a": 1}), None)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_stable_across_generators() {
        let a = generator()
            .generate("text", "qa", &json!({"k": true}), Some("why?"))
            .unwrap();
        let b = generator()
            .generate("text", "qa", &json!({"k": true}), Some("why?"))
            .unwrap();
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_distinct_options_distinct_keys() {
        let g = generator();
        let a = g.generate("t", "op", &json!({"n": 1}), None).unwrap();
        let b = g.generate("t", "op", &json!({"n": 2}), None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_question_segment_separates_entries() {
        let g = generator();
        let none = g.generate("t", "qa", &json!({}), None).unwrap();
        let q1 = g.generate("t", "qa", &json!({}), Some("Q1")).unwrap();
        let q2 = g.generate("t", "qa", &json!({}), Some("Q2")).unwrap();
        assert_ne!(none, q1);
        assert_ne!(q1, q2);
    }

    #[test]
    fn test_empty_text_rejected() {
        let err = generator()
            .generate("", "summarize", &json!({}), None)
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_empty_operation_rejected() {
        let err = generator().generate("t", "", &json!({}), None).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_non_mapping_options_rejected() {
        let g = generator();
        for bad in [json!([1, 2]), json!("str"), json!(3), Value::Null] {
            let err = g.generate("t", "op", &bad, None).unwrap_err();
            assert!(matches!(err, Error::Validation { .. }), "accepted {bad}");
        }
    }

    #[test]
    fn test_tier_boundaries() {
        let g = generator();
        assert_eq!(g.classify_tier(&"a".repeat(500)), TextTier::Small);
        assert_eq!(g.classify_tier(&"a".repeat(501)), TextTier::Medium);
        assert_eq!(g.classify_tier(&"a".repeat(5_000)), TextTier::Medium);
        assert_eq!(g.classify_tier(&"a".repeat(5_001)), TextTier::Large);
        assert_eq!(g.classify_tier(&"a".repeat(50_000)), TextTier::Large);
        assert_eq!(g.classify_tier(&"a".repeat(50_001)), TextTier::Xlarge);
    }

    #[test]
    fn test_tier_monotonic_in_length() {
        let g = generator();
        let lengths = [1, 100, 500, 501, 4_999, 5_001, 49_999, 50_001, 80_000];
        let mut prev = TextTier::Small;
        for len in lengths {
            let tier = g.classify_tier(&"x".repeat(len));
            assert!(tier >= prev, "tier shrank at length {}", len);
            prev = tier;
        }
    }

    #[test]
    fn test_large_text_uses_hash_not_raw() {
        let g = generator();
        let text = "a".repeat(10_000);
        let key = g.generate(&text, "key_points", &json!({"count": 5}), None).unwrap();
        assert!(key.as_str().contains(":large:hash:"));
        // Full raw text never lands in the key.
        assert!(key.as_str().len() < 200);
    }

    #[test]
    fn test_small_text_embeds_sanitized_prefix() {
        let g = generator();
        let key = g
            .generate("hello world: greetings", "summarize", &json!({}), None)
            .unwrap();
        assert!(key.as_str().contains("hello_world__greetings"));
    }

    #[test]
    fn test_promotion_policy() {
        let g = KeyGenerator::new("ns", TierThresholds::default())
            .with_promoted_operations(vec!["sentiment".to_string()]);
        assert!(g.should_promote_to_memory(TextTier::Small, "summarize"));
        assert!(g.should_promote_to_memory(TextTier::Medium, "summarize"));
        assert!(!g.should_promote_to_memory(TextTier::Large, "summarize"));
        assert!(!g.should_promote_to_memory(TextTier::Xlarge, "summarize"));
        // Allowlisted operation promotes even for large text.
        assert!(g.should_promote_to_memory(TextTier::Xlarge, "sentiment"));
    }

    #[test]
    fn test_threshold_validation() {
        assert!(TierThresholds::new(500, 5_000, 50_000).is_ok());
        assert!(TierThresholds::new(5_000, 5_000, 50_000).is_err());
        assert!(TierThresholds::new(500, 50_000, 5_000).is_err());
        assert!(TierThresholds::new(0, 5, 10).is_err());
    }
}
