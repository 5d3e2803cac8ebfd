//! Key/value store with per-entry TTL, lazy expiry and LRU eviction.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

use super::key::CacheKey;
use super::metrics::{CacheMetrics, CacheStats};
use crate::types::TriageResponse;

/// A stored value with its absolute expiry time
struct CacheEntry<V> {
    value: V,
    /// `None` when `now + ttl` is past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Concurrency-safe cache store.
///
/// Every operation takes the single internal lock for the duration of the
/// map operation only. Expired entries are not swept in the background: they
/// are counted by [`stats`](Self::stats) until the next `get` for their key
/// removes them.
pub struct CacheStore<K = CacheKey, V = TriageResponse> {
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    capacity: usize,
    metrics: Arc<CacheMetrics>,
}

impl<K: Hash + Eq, V: Clone> CacheStore<K, V> {
    /// Create a store holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self::with_metrics(capacity, Arc::new(CacheMetrics::new()))
    }

    pub fn with_metrics(capacity: usize, metrics: Arc<CacheMetrics>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)), capacity: capacity.get(), metrics }
    }

    /// Insert or overwrite `key`, expiring `ttl` from now.
    pub async fn set(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry { value, expires_at: Instant::now().checked_add(ttl) };
        let mut entries = self.entries.lock().await;

        let replaced_other = match entries.push(key, entry) {
            Some((old_key, _)) => !entries.contains(&old_key),
            None => false,
        };
        if replaced_other {
            self.metrics.record_eviction();
        }
        self.metrics.record_put();
    }

    /// Return the value for `key` if present and not expired.
    ///
    /// An expired entry is removed as a side effect.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let lookup = entries.get(key).map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        let live = match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                entries.pop(key);
                self.metrics.record_expiration();
                None
            }
            None => None,
        };

        match live {
            Some(_) => self.metrics.record_hit(),
            None => self.metrics.record_miss(),
        }
        live
    }

    /// Like [`get`](Self::get) but without touching recency, counters or
    /// expired entries.
    pub async fn peek(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries
            .peek(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Number of keys held, including expired entries not yet read.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        let count = self.len().await;
        self.metrics.snapshot(count, self.capacity)
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }
}
