//! Tiered Cache Walkthrough
//!
//! This example demonstrates the full cache stack:
//! - Deterministic key generation and text-size tiers
//! - L1 promotion for small responses
//! - Circuit breaker degradation when the remote store misbehaves
//!
//! Usage:
//!   cargo run --example tiered_cache

use ai_response_cache::cache::{InMemoryStore, TieredResponseCache};
use ai_response_cache::config::CacheSettings;
use ai_response_cache::resilience::{CircuitBreaker, CircuitBreakerConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> ai_response_cache::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_response_cache=debug".into()),
        )
        .init();

    println!("=== Tiered Response Cache Demo ===\n");

    let breaker = Arc::new(CircuitBreaker::new(
        CircuitBreakerConfig::new("demo-store")
            .with_failure_threshold(3)
            .with_recovery_timeout(Duration::from_secs(5)),
    )?);
    let settings = CacheSettings::default()
        .with_operation_ttl("summarize", Duration::from_secs(7200))
        .with_compression_threshold(512);
    let cache = TieredResponseCache::new(
        settings,
        Arc::new(InMemoryStore::new()),
        Arc::clone(&breaker),
    )?;

    // Small text: promoted to L1 on write.
    println!("--- Small text, promoted to memory ---");
    cache
        .cache_response(
            "Rust is a systems programming language.",
            "summarize",
            &json!({"max_length": 50}),
            &json!({"summary": "Rust: fast, safe systems language."}),
            None,
        )
        .await?;
    let hit = cache
        .get_cached_response(
            "Rust is a systems programming language.",
            "summarize",
            &json!({"max_length": 50}),
            None,
        )
        .await?;
    println!("L1 hit: {}\n", hit.unwrap()["summary"]);

    // Large text: key is hashed, entry lives in L2 only, compressed.
    println!("--- Large text, hashed key, L2 only ---");
    let big_text = "lorem ipsum ".repeat(1_000);
    cache
        .cache_response(
            &big_text,
            "key_points",
            &json!({"count": 3}),
            &json!({"key_points": ["brevity", "clarity", "repetition"]}),
            None,
        )
        .await?;
    let hit = cache
        .get_cached_response(&big_text, "key_points", &json!({"count": 3}), None)
        .await?;
    println!("L2 hit: {}\n", hit.unwrap()["key_points"]);

    // Open the breaker: reads degrade to misses instead of erroring.
    println!("--- Degraded mode: breaker forced open ---");
    breaker.force_open();
    let degraded = cache
        .get_cached_response(&big_text, "key_points", &json!({"count": 3}), None)
        .await?;
    println!("lookup with open breaker: {:?}", degraded);

    // The L1-promoted entry still answers.
    let resilient = cache
        .get_cached_response(
            "Rust is a systems programming language.",
            "summarize",
            &json!({"max_length": 50}),
            None,
        )
        .await?;
    println!("promoted entry still served: {}\n", resilient.is_some());

    let stats = cache.stats();
    println!("--- Stats ({} backend) ---", cache.remote_name());
    println!(
        "l1_hits={} l2_hits={} misses={} degraded_reads={} hit_ratio={:.2}",
        stats.l1_hits,
        stats.l2_hits,
        stats.misses,
        stats.degraded_reads,
        stats.hit_ratio()
    );
    let snapshot = breaker.snapshot();
    println!(
        "breaker: state={} opens={} rejected={}",
        snapshot.state, snapshot.metrics.circuit_breaker_opens, snapshot.metrics.rejected_calls
    );
    Ok(())
}
