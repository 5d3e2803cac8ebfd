//! Health check and metrics endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::metrics::encode_metrics;
use crate::state::AppState;

/// Health check endpoint with cache occupancy
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.pipeline.cache_stats().await;

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "message": "TriageXpert API is running.",
            "version": env!("CARGO_PKG_VERSION"),
            "cache": {
                "count": cache.count,
                "capacity": cache.capacity
            }
        })),
    )
}

/// Cache, pipeline and scheduler statistics
///
/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.pipeline.cache_stats().await;
    let queue_length = state.scheduler.len().await;

    Json(json!({
        "cache": cache,
        "config": {
            "cache_capacity": state.config.cache.capacity,
            "cache_ttl_secs": state.config.cache.ttl.as_secs(),
            "classify_timeout_ms": state.config.pipeline.classify_timeout.as_millis() as u64,
            "explain_timeout_ms": state.config.pipeline.explain_timeout.as_millis() as u64
        },
        "pipeline": {
            "classifier": state.pipeline.classifier_name(),
            "explainer": state.pipeline.explainer_name(),
            "in_flight": state.pipeline.in_flight()
        },
        "scheduler": {
            "queue_length": queue_length
        }
    }))
}

/// Prometheus text exposition
///
/// GET /metrics/prometheus
pub async fn metrics_prometheus() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

/// Live check (for Kubernetes)
///
/// GET /live
pub async fn live() -> impl IntoResponse {
    StatusCode::OK
}
