//! Metrics module for the triage service
//!
//! Provides Prometheus metrics for monitoring and observability.

pub mod prometheus;

pub use self::prometheus::{
    encode_metrics, record_backend_call, record_cache_lookup, record_coalesced,
    record_explanation_fallback, register_metrics, set_cache_size, set_queue_size, RequestTimer,
};
