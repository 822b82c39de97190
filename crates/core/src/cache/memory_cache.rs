use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::debug;
use serde_json::Value;

use super::IndexCacheTrait;

struct CachedEntry {
    value: Value,
    cached_at: Instant,
}

/// In-process cache with a fixed time to live.
pub struct MemoryCache {
    entries: DashMap<String, CachedEntry>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IndexCacheTrait for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.cached_at.elapsed() <= self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
            debug!("Cache entry {} expired", key);
        }
        None
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                value,
                cached_at: Instant::now(),
            },
        );
    }

    fn clear(&self) {
        self.entries.clear();
        debug!("Index cache cleared");
    }
}

/// Cache used when caching is disabled. Every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl IndexCacheTrait for NoopCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value) {}

    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_then_get() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.set("perf:2024-01-02:2024-01-05:2", json!({"nav": "1100"}));
        assert_eq!(
            cache.get("perf:2024-01-02:2024-01-05:2"),
            Some(json!({"nav": "1100"}))
        );
        assert_eq!(cache.get("comp:2024-01-02:2"), None);
    }

    #[test]
    fn test_expired_entries_are_evicted() {
        let cache = MemoryCache::new(Duration::ZERO);
        cache.set("k", json!(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_drops_everything() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.set("a", json!(1));
        cache.set("b", json!(2));
        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_noop_never_hits() {
        let cache = NoopCache;
        cache.set("a", json!(1));
        assert_eq!(cache.get("a"), None);
    }
}
