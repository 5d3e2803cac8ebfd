//! Response cache for triage results.
//!
//! Classification and explanation are slow and, for hosted models, billed per
//! call. Identical requests are therefore answered from memory:
//!
//! ```text
//! TriageRequest
//!        │
//!        ▼
//! ┌──────────────┐
//! │  CacheKey    │ ─── all result-affecting fields, history sorted
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │ CacheStore   │ ─── LRU + per-entry TTL, lazy expiry
//! └──────┬───────┘
//!        │ Miss
//!        ▼
//!   classify → explain
//! ```
//!
//! The store itself knows nothing about in-flight work; duplicate suppression
//! for concurrent misses lives in [`crate::pipeline`].

mod config;
mod key;
mod metrics;
mod store;

pub use config::CacheConfig;
pub use key::CacheKey;
pub use metrics::{CacheMetrics, CacheStats};
pub use store::CacheStore;
