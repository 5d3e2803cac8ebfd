//! Explanations generated by an Ollama-compatible model server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::{Explainer, ExplainerError};
use crate::types::{Classification, ExplanationDetails, TriageRequest};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Explainer that asks a generative model for a structured JSON answer
#[derive(Clone)]
pub struct GenerativeExplainer {
    client: Client,
    base_url: String,
    model: String,
    enabled: bool,
}

impl GenerativeExplainer {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, enabled: bool) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            enabled,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the prompt for one request.
    pub fn build_prompt(request: &TriageRequest, classification: &Classification) -> String {
        let profile = &request.profile;
        let history = if profile.history.is_empty() {
            "none reported".to_string()
        } else {
            profile.history.join(", ")
        };
        let keywords = if classification.keywords.is_empty() {
            "none".to_string()
        } else {
            classification.keywords.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let bmi = if profile.bmi > 0.0 {
            format!("{:.1}", profile.bmi)
        } else {
            "unknown".to_string()
        };

        format!(
            "You are a helpful medical assistant. A patient's symptoms have been triaged. \
             Explain the triage level in plain, easy-to-understand language for a non-medical \
             person. Do not provide a diagnosis.\n\
             \n\
             Patient profile: age {age}, gender {gender}, BMI {bmi}, medical history: {history}.\n\
             Symptoms: \"{symptoms}\"\n\
             Triage category: {category}\n\
             Key symptoms detected: {keywords}\n\
             \n\
             Answer in the language with code \"{language}\". Respond with a JSON object with \
             exactly these keys: \"explanation\" (why this triage level), \
             \"home_care_suggestions\" (string, or null if home care is not appropriate), \
             \"when_to_worry\" (warning signs that need faster care), \
             \"next_steps\" (what to do now).",
            age = profile.age,
            gender = profile.gender,
            bmi = bmi,
            history = history,
            symptoms = request.symptoms,
            category = classification.category,
            keywords = keywords,
            language = request.language,
        )
    }

    /// Parse the model's JSON answer.
    pub fn parse_details(raw: &str) -> Result<ExplanationDetails, ExplainerError> {
        let details: ExplanationDetails = serde_json::from_str(raw.trim())
            .map_err(|e| ExplainerError::InvalidResponse(e.to_string()))?;

        if details.explanation.trim().is_empty() {
            return Err(ExplainerError::InvalidResponse("empty explanation".to_string()));
        }
        Ok(details)
    }
}

#[async_trait]
impl Explainer for GenerativeExplainer {
    #[instrument(skip_all, fields(model = %self.model, category = %classification.category))]
    async fn explain(
        &self,
        request: &TriageRequest,
        classification: &Classification,
    ) -> Result<ExplanationDetails, ExplainerError> {
        if !self.enabled {
            return Err(ExplainerError::Disabled);
        }

        let url = format!("{}/api/generate", self.base_url);
        debug!(url = %url, "Sending generate request");

        let body = GenerateRequest {
            model: &self.model,
            prompt: Self::build_prompt(request, classification),
            stream: false,
            format: "json",
            options: GenerateOptions { temperature: 0.7, num_predict: 2048 },
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, body = %body, "Explainer returned error");
            return Err(ExplainerError::Backend { status, body });
        }

        let generated: GenerateResponse = response.json().await?;
        let details = Self::parse_details(&generated.response)?;
        debug!("Explanation generated");
        Ok(details)
    }

    fn name(&self) -> &'static str {
        "generative"
    }
}
