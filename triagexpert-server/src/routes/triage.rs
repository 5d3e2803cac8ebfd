//! Triage endpoint.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use std::sync::Arc;
use tracing::info;

use crate::error::TriageError;
use crate::metrics::RequestTimer;
use crate::state::AppState;
use crate::types::{TriageBody, TriageResponse};

/// Triage free-text symptoms
///
/// POST /triage
///
/// Validation happens before any cache or backend access. When the body
/// carries a `patient_id`, the result is also pushed into the priority
/// scheduler.
pub async fn triage(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TriageBody>, JsonRejection>,
) -> Result<Json<TriageResponse>, TriageError> {
    let Json(body) = payload?;
    let request = body.validate()?;

    info!(
        age = request.profile.age,
        language = %request.language,
        history = request.profile.history.len(),
        "Handling POST /triage"
    );

    let timer = RequestTimer::new();
    let response = match state.pipeline.invoke(&request).await {
        Ok(response) => response,
        Err(e) => {
            timer.record_failure("error");
            return Err(e.into());
        }
    };
    timer.record_success(response.triage_category.as_str());

    if let Some(patient_id) = body.patient_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        state.scheduler.schedule(patient_id, response.triage_category).await;
    }

    Ok(Json(response))
}
