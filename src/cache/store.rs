//! Remote-store collaborator interface.
//!
//! The L2 tier is an external key/value service (Redis in production). The
//! cache core only sees this trait; every call site goes through the circuit
//! breaker, never straight to the store.

use super::key::CacheKey;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Byte-oriented remote key/value store.
///
/// Implementations own TTL enforcement for their entries. Errors should be
/// surfaced using the transient variants of [`crate::Error`] (`Timeout`,
/// `Network`, `Unavailable`, ...) so the classifier and retry policy can
/// distinguish them from permanent failures.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    fn name(&self) -> &'static str;
}

struct StoredEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

/// In-memory [`RemoteStore`] for development and tests.
///
/// Honors TTLs but has no network failure modes of its own; tests that need
/// failures wrap it or substitute a failing implementation.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|e| {
                e.values()
                    .filter(|entry| Instant::now() < entry.expires_at)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let mut expired = false;
        if let Ok(entries) = self.entries.read() {
            if let Some(entry) = entries.get(key.as_str()) {
                if Instant::now() < entry.expires_at {
                    return Ok(Some(entry.data.clone()));
                }
                expired = true;
            }
        }
        if expired {
            if let Ok(mut entries) = self.entries.write() {
                entries.remove(key.as_str());
            }
        }
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                key.as_str().to_string(),
                StoredEntry {
                    data: value.to_vec(),
                    expires_at: Instant::now() + ttl,
                },
            );
        }
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self
            .entries
            .write()
            .map(|mut e| e.remove(key.as_str()).is_some())
            .unwrap_or(false))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
