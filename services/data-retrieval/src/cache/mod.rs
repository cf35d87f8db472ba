// In-memory TTL cache owned by the caller and injected into clients
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Maximum number of keys kept (prevent unbounded growth)
const MAX_CACHE_ENTRIES: usize = 1024;

/// A cached value and when it was fetched
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub fetched_at: DateTime<Utc>,
    pub value: V,
}

/// Keyed cache where entries expire `ttl` after they were fetched
pub struct TtlCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone + Send + Sync> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_secs(ttl_secs: i64) -> Self {
        Self::new(Duration::seconds(ttl_secs))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any
    pub async fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Utc::now()).await
    }

    /// Fresh value for `key` as seen at `now`
    pub async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// When `key` was last fetched, fresh or not
    pub async fn fetched_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.read().await.get(key).map(|e| e.fetched_at)
    }

    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_at(key, value, Utc::now()).await
    }

    pub async fn insert_at(&self, key: impl Into<String>, value: V, fetched_at: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        entries.insert(key.into(), CacheEntry { fetched_at, value });

        // Over capacity: drop the oldest entries
        if entries.len() > MAX_CACHE_ENTRIES {
            let mut by_age: Vec<(String, DateTime<Utc>)> = entries
                .iter()
                .map(|(k, e)| (k.clone(), e.fetched_at))
                .collect();
            by_age.sort_by(|a, b| a.1.cmp(&b.1));
            let excess = entries.len() - MAX_CACHE_ENTRIES;
            for (key, _) in by_age.into_iter().take(excess) {
                entries.remove(&key);
            }
            debug!("TTL cache: evicted {} oldest entries", excess);
        }
    }

    /// Remove `key`; true if it was present
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drop all expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| now - e.fetched_at < self.ttl);
        let evicted = before.saturating_sub(entries.len());
        if evicted > 0 {
            debug!("TTL cache: evicted {} stale entries", evicted);
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
