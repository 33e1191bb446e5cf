//! Expiring object cache.

use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::observability::metrics;

#[derive(Debug, Clone)]
struct CachedObject {
    value: Value,
    stored_at: Instant,
}

/// A thread-safe cache of chain objects keyed by id.
///
/// Entries older than the default expiration read as absent. They are not
/// evicted until overwritten or removed. An expiration of 0 disables expiry.
#[derive(Debug, Clone)]
pub struct ObjectCache {
    inner: Arc<DashMap<String, CachedObject>>,
    default_expiration: Arc<AtomicU64>,
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ObjectCache {
    /// Create an empty cache; `default_expiration` is in seconds.
    pub fn new(default_expiration: u64) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            default_expiration: Arc::new(AtomicU64::new(default_expiration)),
        }
    }

    pub fn default_expiration(&self) -> u64 {
        self.default_expiration.load(Ordering::Relaxed)
    }

    /// Change the expiration applied to subsequent reads.
    pub fn set_expiration(&self, secs: u64) {
        self.default_expiration.store(secs, Ordering::Relaxed);
    }

    fn is_fresh(&self, entry: &CachedObject) -> bool {
        match self.default_expiration() {
            0 => true,
            secs => entry.stored_at.elapsed() < Duration::from_secs(secs),
        }
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let found = self
            .inner
            .get(key)
            .filter(|r| self.is_fresh(r.value()))
            .map(|r| r.value().value.clone());
        metrics::record_cache_lookup(found.is_some());
        found
    }

    /// Fresh value for `key`, if any.
    pub fn get_fresh(&self, key: &str) -> Option<Value> {
        self.lookup(key)
    }

    /// Fresh value for `key`, or `default`.
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.lookup(key).unwrap_or(default)
    }

    /// Store `value` under `key`, resetting its age.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.insert(
            key.into(),
            CachedObject {
                value,
                stored_at: Instant::now(),
            },
        );
        metrics::record_cache_size(self.inner.len());
    }

    /// True if `key` holds a fresh value.
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .get(key)
            .map(|r| self.is_fresh(r.value()))
            .unwrap_or(false)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.inner.remove(key).map(|(_, entry)| entry.value);
        metrics::record_cache_size(self.inner.len());
        removed
    }

    pub fn clear(&self) {
        self.inner.clear();
        metrics::record_cache_size(0);
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Display for ObjectCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectCacheInMemory(default_expiration={})",
            self.default_expiration()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_operations() {
        let cache = ObjectCache::new(60);
        assert_eq!(cache.to_string(), "ObjectCacheInMemory(default_expiration=60)");

        assert!(!cache.contains("1.2.0"));
        assert_eq!(cache.get("1.2.0", json!("New")), json!("New"));

        cache.set("1.2.0", json!({"name": "init0"}));
        assert!(cache.contains("1.2.0"));
        assert_eq!(cache.get("1.2.0", Value::Null)["name"], "init0");
        assert_eq!(cache.len(), 1);

        assert!(cache.remove("1.2.0").is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_expiration_never_expires() {
        let cache = ObjectCache::new(0);
        cache.set("foo", json!("bar"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.contains("foo"));
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = ObjectCache::new(10);
        let other = cache.clone();
        other.set("foo", json!("bar"));
        assert!(cache.contains("foo"));

        other.set_expiration(5);
        assert_eq!(cache.default_expiration(), 5);

        cache.clear();
        assert!(!other.contains("foo"));
    }
}
