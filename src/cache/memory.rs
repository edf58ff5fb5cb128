//! In-process L1 cache.
//!
//! A bounded LRU front for promoted entries. Not a source of truth: contents
//! are lost on restart and expiry is checked lazily on access.

use super::key::CacheKey;
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct MemoryEntry {
    value: Arc<Value>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Bounded in-process key/value store with LRU eviction.
///
/// The single mutex guards the LruCache's recency bookkeeping; every
/// operation is in-process and never suspends.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryCache {
    /// The non-zero capacity bound lives in the signature; callers holding a
    /// plain `usize` validate it once (as `CacheSettings` does) and convert.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Value>> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key.as_str()) {
            Some(entry) if entry.is_expired() => {
                entries.pop(key.as_str());
                None
            }
            Some(entry) => Some(Arc::clone(&entry.value)),
            None => None,
        }
    }

    /// Insert a copy of the value. Evicts the least-recently-used entry when
    /// at capacity.
    pub fn set(&self, key: &CacheKey, value: Arc<Value>, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key.as_str().to_string(),
                MemoryEntry {
                    value,
                    expires_at: Instant::now() + ttl,
                },
            );
        }
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .map(|mut e| e.pop(key.as_str()).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Entry count including not-yet-collected expired entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(s: &str) -> CacheKey {
        CacheKey::new(s.to_string())
    }

    fn val(v: serde_json::Value) -> Arc<Value> {
        Arc::new(v)
    }

    fn cache_with_capacity(n: usize) -> MemoryCache {
        MemoryCache::new(NonZeroUsize::new(n).unwrap())
    }

    #[test]
    fn test_set_get_roundtrip() {
        let cache = cache_with_capacity(10);
        cache.set(&key("k1"), val(json!({"a": 1})), Duration::from_secs(60));
        let got = cache.get(&key("k1")).unwrap();
        assert_eq!(*got, json!({"a": 1}));
        assert!(cache.get(&key("k2")).is_none());
    }

    #[test]
    fn test_lru_eviction_order() {
        let cache = cache_with_capacity(2);
        let ttl = Duration::from_secs(60);
        cache.set(&key("a"), val(json!(1)), ttl);
        cache.set(&key("b"), val(json!(2)), ttl);
        // Touch "a" so "b" becomes least recently used.
        assert!(cache.get(&key("a")).is_some());
        cache.set(&key("c"), val(json!(3)), ttl);
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn test_expired_entry_dropped_on_access() {
        let cache = cache_with_capacity(4);
        cache.set(&key("k"), val(json!("v")), Duration::from_millis(20));
        assert!(cache.get(&key("k")).is_some());
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(&key("k")).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = cache_with_capacity(4);
        let ttl = Duration::from_secs(60);
        cache.set(&key("a"), val(json!(1)), ttl);
        cache.set(&key("b"), val(json!(2)), ttl);
        assert!(cache.remove(&key("a")));
        assert!(!cache.remove(&key("a")));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_access_keeps_bound() {
        use std::sync::Arc as StdArc;
        let cache = StdArc::new(cache_with_capacity(8));
        let mut handles = vec![];
        for t in 0..4 {
            let cache = StdArc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    let k = key(&format!("t{}-{}", t, i));
                    cache.set(&k, val(json!(i)), Duration::from_secs(60));
                    let _ = cache.get(&k);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= 8);
    }
}
