//! Application state for the triage server.

use std::sync::Arc;

use crate::backend::{self, BackendConfig, Classifier, Explainer};
use crate::cache::CacheConfig;
use crate::pipeline::{PipelineConfig, TriagePipeline};
use crate::scheduler::PriorityScheduler;

/// Application state shared across all handlers.
///
/// Built once at startup and handed to the router; tests build a fresh one
/// per case.
pub struct AppState {
    /// Memoized classify → explain pipeline
    pub pipeline: TriagePipeline,

    /// Ordered queue of triaged patients
    pub scheduler: PriorityScheduler,

    /// Configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Create state with the backends named in the configuration
    pub fn new(config: ServerConfig) -> Self {
        let (classifier, explainer) = backend::from_config(&config.backend);
        Self::with_backends(config, classifier, explainer)
    }

    /// Create state with explicit backends
    pub fn with_backends(
        config: ServerConfig,
        classifier: Arc<dyn Classifier>,
        explainer: Arc<dyn Explainer>,
    ) -> Self {
        let pipeline =
            TriagePipeline::new(classifier, explainer, &config.cache, config.pipeline.clone());
        Self { pipeline, scheduler: PriorityScheduler::new(), config }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    pub cache: CacheConfig,

    pub pipeline: PipelineConfig,

    pub backend: BackendConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            cache: CacheConfig::default(),
            pipeline: PipelineConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("TRIAGE_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5000),
            cache: CacheConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
            backend: BackendConfig::from_env(),
        }
    }
}
