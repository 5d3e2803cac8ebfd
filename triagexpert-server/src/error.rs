//! Error types for the triage HTTP layer.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::pipeline::PipelineError;
use crate::types::ValidationError;

/// Message returned for every server-side failure; details stay in the logs
pub const INTERNAL_ERROR_MESSAGE: &str =
    "An internal server error occurred while analyzing symptoms.";

/// Triage API error types
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// Missing or malformed request fields
    #[error("{0}")]
    Validation(String),

    /// Nothing to return (e.g. empty queue)
    #[error("{0}")]
    NotFound(String),

    /// Classification failed or timed out
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

impl From<ValidationError> for TriageError {
    fn from(err: ValidationError) -> Self {
        TriageError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for TriageError {
    fn from(rejection: JsonRejection) -> Self {
        TriageError::Validation(format!("Invalid input: {}", rejection.body_text()))
    }
}

impl IntoResponse for TriageError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            TriageError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            TriageError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            TriageError::Pipeline(_) => {
                tracing::error!(error = %self, "Triage request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
