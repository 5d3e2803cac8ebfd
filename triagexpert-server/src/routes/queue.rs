//! Priority queue endpoints.

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::TriageError;
use crate::scheduler::QueueEntry;
use crate::state::AppState;

/// Current queue in retrieval order
///
/// GET /queue
pub async fn queue(State(state): State<Arc<AppState>>) -> Json<Value> {
    let entries = state.scheduler.ordered().await;
    Json(json!({
        "length": entries.len(),
        "queue": entries
    }))
}

/// Take the most urgent patient off the queue
///
/// POST /queue/next
pub async fn next(State(state): State<Arc<AppState>>) -> Result<Json<QueueEntry>, TriageError> {
    state
        .scheduler
        .pop_highest_priority()
        .await
        .map(Json)
        .ok_or_else(|| TriageError::NotFound("Queue is empty.".to_string()))
}
