//! Configuration for the classification and explanation backends.

/// Backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Remote classifier endpoint; the keyword classifier is used when unset
    pub classifier_url: Option<String>,

    /// Base URL of the Ollama-compatible generation server
    pub explainer_url: String,

    /// Model used for explanations
    pub explainer_model: String,

    /// When false every request gets the static fallback explanation
    pub explainer_enabled: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            classifier_url: None,
            explainer_url: "http://localhost:11434".to_string(),
            explainer_model: "llama3.2:3b".to_string(),
            explainer_enabled: true,
        }
    }
}

impl BackendConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.classifier_url =
            std::env::var("TRIAGE_CLASSIFIER_URL").ok().filter(|v| !v.trim().is_empty());

        if let Ok(val) =
            std::env::var("TRIAGE_EXPLAINER_URL").or_else(|_| std::env::var("OLLAMA_HOST"))
        {
            config.explainer_url = val;
        }

        if let Ok(val) = std::env::var("TRIAGE_EXPLAINER_MODEL") {
            config.explainer_model = val;
        }

        if let Ok(val) = std::env::var("TRIAGE_EXPLAINER_ENABLED") {
            config.explainer_enabled = !(val == "0" || val.to_lowercase() == "false");
        }

        config
    }
}
