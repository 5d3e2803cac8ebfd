//! Classifier backed by a model served over HTTP.
//!
//! The endpoint receives `{"text": "..."}` and answers with
//! `{"category": "Emergency" | "Urgent" | "Routine", "confidence": 0.93, "keywords": [...]}`.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::{Classifier, ClassifierError};
use crate::types::{Classification, TriageCategory};

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    category: String,
    confidence: f32,
    #[serde(default)]
    keywords: BTreeSet<String>,
}

impl TryFrom<ClassifyResponse> for Classification {
    type Error = ClassifierError;

    fn try_from(response: ClassifyResponse) -> Result<Self, Self::Error> {
        let category: TriageCategory =
            response.category.parse().map_err(ClassifierError::InvalidResponse)?;

        if !(0.0..=1.0).contains(&response.confidence) {
            return Err(ClassifierError::InvalidResponse(format!(
                "confidence {} outside [0, 1]",
                response.confidence
            )));
        }

        Ok(Classification { category, confidence: response.confidence, keywords: response.keywords })
    }
}

/// HTTP model classifier
#[derive(Clone)]
pub struct RemoteClassifier {
    client: Client,
    url: String,
}

impl RemoteClassifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            // The pipeline applies its own, shorter timeout
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    #[instrument(skip(self, symptoms), fields(url = %self.url))]
    async fn classify(&self, symptoms: &str) -> Result<Classification, ClassifierError> {
        debug!("Sending classify request");

        let response = self
            .client
            .post(&self.url)
            .json(&ClassifyRequest { text: symptoms })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to reach classifier");
                ClassifierError::Unavailable(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, body = %body, "Classifier returned error");
            return Err(ClassifierError::Backend { status, body });
        }

        let parsed: ClassifyResponse = response.json().await?;
        let classification = Classification::try_from(parsed)?;
        debug!(category = %classification.category, "Classify complete");
        Ok(classification)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
