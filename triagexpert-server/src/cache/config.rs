//! Configuration for the response cache.

use std::time::Duration;

/// Configuration for the response cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before least-recently-used eviction
    pub capacity: usize,

    /// Time-to-live applied to every stored triage result
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TRIAGE_CACHE_SIZE") {
            if let Ok(n) = val.parse() {
                config.capacity = n;
            }
        }

        if let Ok(val) = std::env::var("TRIAGE_CACHE_TTL_SECS") {
            if let Ok(n) = val.parse() {
                config.ttl = Duration::from_secs(n);
            }
        }

        config
    }
}
