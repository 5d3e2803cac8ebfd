//! Classification and explanation backends.
//!
//! The pipeline treats both as opaque, possibly slow, possibly failing
//! functions behind the [`Classifier`] and [`Explainer`] traits:
//!
//! - [`KeywordClassifier`]: rule-based, in-process (default)
//! - [`RemoteClassifier`]: model served over HTTP
//! - [`GenerativeExplainer`]: Ollama-compatible `/api/generate` endpoint
//!
//! [`fallback_explanation`] provides the static text used whenever the
//! explainer fails or times out.

mod config;
mod fallback;
mod generative;
mod keyword;
mod remote;

pub use config::BackendConfig;
pub use fallback::fallback_explanation;
pub use generative::GenerativeExplainer;
pub use keyword::KeywordClassifier;
pub use remote::RemoteClassifier;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::types::{Classification, ExplanationDetails, TriageRequest};

/// Errors from a classifier backend
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Classifier returned status {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Invalid classifier response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from an explainer backend
#[derive(Debug, thiserror::Error)]
pub enum ExplainerError {
    #[error("Explainer disabled")]
    Disabled,

    #[error("Explainer returned status {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Invalid explainer response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Assigns a triage category to free-text symptoms.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, symptoms: &str) -> Result<Classification, ClassifierError>;

    /// Short label for logs and metrics
    fn name(&self) -> &'static str;
}

/// Produces a patient-facing explanation for a classified request.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(
        &self,
        request: &TriageRequest,
        classification: &Classification,
    ) -> Result<ExplanationDetails, ExplainerError>;

    fn name(&self) -> &'static str;
}

/// Build the configured classifier and explainer.
pub fn from_config(config: &BackendConfig) -> (Arc<dyn Classifier>, Arc<dyn Explainer>) {
    let classifier: Arc<dyn Classifier> = match &config.classifier_url {
        Some(url) => {
            let remote = RemoteClassifier::new(url.clone());
            info!(url = remote.url(), "Using remote classifier");
            Arc::new(remote)
        }
        None => {
            info!("Using keyword classifier");
            Arc::new(KeywordClassifier::new())
        }
    };

    let generative = GenerativeExplainer::new(
        config.explainer_url.clone(),
        config.explainer_model.clone(),
        config.explainer_enabled,
    );
    if config.explainer_enabled {
        info!(
            url = generative.base_url(),
            model = %config.explainer_model,
            "Using generative explainer"
        );
    } else {
        info!("Generative explainer disabled, fallback explanations only");
    }

    (classifier, Arc::new(generative))
}
