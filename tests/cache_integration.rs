//! End-to-end scenarios for the tiered cache and its resilience layer.

use ai_response_cache::cache::{CacheKey, InMemoryStore, RemoteStore, TieredResponseCache};
use ai_response_cache::config::CacheSettings;
use ai_response_cache::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use ai_response_cache::{Error, Result, TierThresholds};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn breaker(threshold: u32, recovery: Duration) -> Arc<CircuitBreaker> {
    Arc::new(
        CircuitBreaker::new(
            CircuitBreakerConfig::new("remote-store")
                .with_failure_threshold(threshold)
                .with_recovery_timeout(recovery),
        )
        .unwrap(),
    )
}

fn new_cache(settings: CacheSettings) -> TieredResponseCache {
    TieredResponseCache::new(
        settings,
        Arc::new(InMemoryStore::new()),
        breaker(5, Duration::from_secs(60)),
    )
    .unwrap()
}

/// Store that can be flipped into a failing mode, for breaker scenarios.
struct FlakyStore {
    inner: InMemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::network("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[tokio::test]
async fn round_trip_ignoring_bookkeeping_fields() -> anyhow::Result<()> {
    let cache = new_cache(CacheSettings::default());
    cache
        .cache_response("t", "summarize", &json!({}), &json!({"summary": "s"}), None)
        .await?;
    let got = cache
        .get_cached_response("t", "summarize", &json!({}), None)
        .await?
        .expect("entry should be cached");
    assert_eq!(got["summary"], "s");
    Ok(())
}

#[tokio::test]
async fn key_determinism_survives_option_order() -> anyhow::Result<()> {
    let cache = new_cache(CacheSettings::default());
    cache
        .cache_response(
            "t",
            "summarize",
            &json!({"a": 1, "b": 2, "c": [1, 2]}),
            &json!({"summary": "s"}),
            None,
        )
        .await?;
    let got = cache
        .get_cached_response("t", "summarize", &json!({"c": [1, 2], "b": 2, "a": 1}), None)
        .await?;
    assert!(got.is_some());
    Ok(())
}

#[tokio::test]
async fn distinct_question_is_a_miss() -> anyhow::Result<()> {
    let cache = new_cache(CacheSettings::default());
    cache
        .cache_response("doc", "qa", &json!({}), &json!({"answer": "42"}), Some("Q1"))
        .await?;
    assert!(cache
        .get_cached_response("doc", "qa", &json!({}), Some("Q2"))
        .await?
        .is_none());
    assert!(cache
        .get_cached_response("doc", "qa", &json!({}), None)
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn validation_rejects_malformed_inputs() {
    let cache = new_cache(CacheSettings::default());
    assert!(matches!(
        cache
            .cache_response("", "summarize", &json!({}), &json!({"s": 1}), None)
            .await,
        Err(Error::Validation { .. })
    ));
    assert!(matches!(
        cache
            .get_cached_response("", "summarize", &json!({}), None)
            .await,
        Err(Error::Validation { .. })
    ));
    assert!(matches!(
        cache
            .cache_response("t", "", &json!({}), &json!({"s": 1}), None)
            .await,
        Err(Error::Validation { .. })
    ));
    assert!(matches!(
        cache
            .cache_response("t", "summarize", &json!("not a map"), &json!({"s": 1}), None)
            .await,
        Err(Error::Validation { .. })
    ));
}

#[tokio::test]
async fn large_tier_end_to_end() -> anyhow::Result<()> {
    // 10_000 chars is large tier under the default 500/5000/50000 thresholds:
    // the key carries a hash, the payload round-trips exactly.
    let cache = new_cache(CacheSettings::default());
    let text = "a".repeat(10_000);
    let payload = json!({"key_points": ["first", "second", "third"]});
    cache
        .cache_response(&text, "key_points", &json!({"count": 5}), &payload, None)
        .await?;
    let got = cache
        .get_cached_response(&text, "key_points", &json!({"count": 5}), None)
        .await?
        .expect("large-tier entry should round-trip");
    assert_eq!(got["key_points"], payload["key_points"]);
    // Large tier entries never occupy L1.
    assert_eq!(cache.memory_len(), 0);
    Ok(())
}

#[tokio::test]
async fn repeated_failures_open_breaker_and_reads_degrade() {
    let store = Arc::new(FlakyStore::new());
    let breaker = breaker(3, Duration::from_millis(80));
    let cache = TieredResponseCache::new(
        CacheSettings::default(),
        Arc::clone(&store) as Arc<dyn RemoteStore>,
        Arc::clone(&breaker),
    )
    .unwrap();

    // Seed an entry, then make the store fail.
    cache
        .cache_response(&"x".repeat(9_000), "summarize", &json!({}), &json!({"s": 1}), None)
        .await
        .unwrap();
    store.set_failing(true);

    // Three genuine network failures trip the breaker...
    for _ in 0..3 {
        let err = cache
            .get_cached_response(&"x".repeat(9_000), "summarize", &json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    // ...after which lookups soft-fail to None even though the store holds
    // the entry.
    let got = cache
        .get_cached_response(&"x".repeat(9_000), "summarize", &json!({}), None)
        .await
        .unwrap();
    assert!(got.is_none());
    assert!(cache.stats().degraded_reads >= 1);

    // Recovery: store healthy again, dwell elapses, trial call closes the
    // breaker and the entry is visible once more.
    store.set_failing(false);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let got = cache
        .get_cached_response(&"x".repeat(9_000), "summarize", &json!({}), None)
        .await
        .unwrap();
    assert!(got.is_some());
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn promoted_entries_survive_remote_outage() {
    let store = Arc::new(FlakyStore::new());
    let cache = TieredResponseCache::new(
        CacheSettings::default(),
        Arc::clone(&store) as Arc<dyn RemoteStore>,
        breaker(1, Duration::from_secs(60)),
    )
    .unwrap();

    cache
        .cache_response("small text", "sentiment", &json!({}), &json!({"label": "pos"}), None)
        .await
        .unwrap();
    store.set_failing(true);

    // L1 answers without touching the broken store.
    let got = cache
        .get_cached_response("small text", "sentiment", &json!({}), None)
        .await
        .unwrap();
    assert_eq!(got.unwrap()["label"], "pos");
}

#[tokio::test]
async fn custom_thresholds_shift_promotion_boundary() {
    let settings = CacheSettings::default()
        .with_text_size_tiers(TierThresholds::new(10, 20, 30).unwrap());
    let cache = new_cache(settings);

    // 15 chars is medium under these thresholds: promoted.
    cache
        .cache_response(&"m".repeat(15), "summarize", &json!({}), &json!({"s": 1}), None)
        .await
        .unwrap();
    assert_eq!(cache.memory_len(), 1);

    // 25 chars is large: L2 only.
    cache
        .cache_response(&"l".repeat(25), "summarize", &json!({}), &json!({"s": 2}), None)
        .await
        .unwrap();
    assert_eq!(cache.memory_len(), 1);
}

#[tokio::test]
async fn per_operation_ttl_expires_independently() {
    let settings = CacheSettings::default()
        .with_default_ttl(Duration::from_secs(3600))
        .with_operation_ttl("ephemeral", Duration::from_millis(30));
    let cache = new_cache(settings);

    cache
        .cache_response("t", "ephemeral", &json!({}), &json!({"v": 1}), None)
        .await
        .unwrap();
    cache
        .cache_response("t", "summarize", &json!({}), &json!({"v": 2}), None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache
        .get_cached_response("t", "ephemeral", &json!({}), None)
        .await
        .unwrap()
        .is_none());
    assert!(cache
        .get_cached_response("t", "summarize", &json!({}), None)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn concurrent_identical_misses_both_fill_harmlessly() {
    let cache = Arc::new(new_cache(CacheSettings::default()));
    let mut handles = vec![];
    for _ in 0..4 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            if cache
                .get_cached_response("t", "summarize", &json!({}), None)
                .await
                .unwrap()
                .is_none()
            {
                cache
                    .cache_response("t", "summarize", &json!({}), &json!({"s": 1}), None)
                    .await
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    // Duplicate fills are idempotent by key: exactly one logical entry.
    let got = cache
        .get_cached_response("t", "summarize", &json!({}), None)
        .await
        .unwrap();
    assert_eq!(got.unwrap()["s"], 1);
}
