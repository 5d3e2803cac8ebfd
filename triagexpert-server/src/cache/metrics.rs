//! Counters for the response cache.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Metrics for monitoring cache performance
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Lookups that returned a live entry
    pub hits: AtomicU64,
    /// Lookups that found nothing or an expired entry
    pub misses: AtomicU64,
    /// Values stored
    pub puts: AtomicU64,
    /// Entries dropped to make room
    pub evictions: AtomicU64,
    /// Entries removed because they were read after their TTL
    pub expirations: AtomicU64,
    /// Callers that waited on another caller's in-flight computation
    pub coalesced: AtomicU64,
}

impl CacheMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lookup that returned a live entry
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup that found nothing usable
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stored value
    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry dropped for capacity
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry removed after its TTL
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a caller that waited on in-flight work
    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters together with the store's current occupancy.
    pub fn snapshot(&self, count: usize, capacity: usize) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            count,
            capacity,
            hits,
            misses,
            puts: self.puts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            hit_rate: if lookups > 0 { hits as f64 / lookups as f64 } else { 0.0 },
        }
    }
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Keys currently held, including expired ones not yet read
    pub count: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub coalesced: u64,
    pub hit_rate: f64,
}
