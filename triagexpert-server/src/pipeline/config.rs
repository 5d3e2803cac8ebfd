//! Configuration for the memoized triage pipeline.

use std::time::Duration;

/// Backend timeouts for the classify → explain pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Exceeding this fails the request
    pub classify_timeout: Duration,

    /// Exceeding this substitutes the fallback explanation
    pub explain_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classify_timeout: Duration::from_secs(10),
            explain_timeout: Duration::from_secs(20),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TRIAGE_CLASSIFY_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                config.classify_timeout = Duration::from_millis(n);
            }
        }

        if let Ok(val) = std::env::var("TRIAGE_EXPLAIN_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                config.explain_timeout = Duration::from_millis(n);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.classify_timeout, Duration::from_secs(10));
        assert!(config.classify_timeout < config.explain_timeout);
    }
}
