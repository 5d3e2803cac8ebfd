//! HTTP route handlers for the triage server.
//!
//! - `health`: health check and metrics endpoints
//! - `triage`: the triage API
//! - `queue`: priority queue inspection and consumption

pub mod health;
pub mod queue;
pub mod triage;

// Re-export handlers for convenience
pub use health::{health, live, metrics, metrics_prometheus};
pub use queue::{next as queue_next, queue};
pub use triage::triage;
