//! TriageXpert server library
//!
//! Triages free-text patient-reported symptoms into Emergency, Urgent or
//! Routine and attaches an AI-generated explanation. The expensive backends
//! (classifier and generative explainer) sit behind a memoizing pipeline:
//!
//! - identical requests are answered from an LRU + TTL cache
//! - concurrent identical misses share a single backend execution
//! - explanation failures degrade to a static, category-specific answer
//!
//! Triaged patients can be pushed into a priority scheduler for ordered
//! downstream processing.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod backend;
pub mod cache;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod types;

pub use state::{AppState, ServerConfig};

/// Initialize Prometheus metrics registry.
/// Should be called once before starting the server.
pub fn init_metrics() {
    if let Err(e) = metrics::register_metrics() {
        warn!("Failed to register Prometheus metrics: {}", e);
    }
}

/// Build the HTTP router over the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(routes::health))
        .route("/live", get(routes::live))
        .route("/metrics", get(routes::metrics))
        .route("/metrics/prometheus", get(routes::metrics_prometheus))
        // Triage API
        .route("/triage", post(routes::triage))
        // Priority queue
        .route("/queue", get(routes::queue))
        .route("/queue/next", post(routes::queue_next))
        // Middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the triage server.
///
/// This function starts the HTTP server and blocks until it's shut down.
///
/// # Example
/// ```no_run
/// use triagexpert_server::{run_server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     run_server(ServerConfig::from_env()).await
/// }
/// ```
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    init_metrics();

    info!(
        port = config.port,
        cache_capacity = config.cache.capacity,
        cache_ttl_secs = config.cache.ttl.as_secs(),
        explainer_url = %config.backend.explainer_url,
        "Starting TriageXpert v{}",
        env!("CARGO_PKG_VERSION")
    );

    let port = config.port;
    let state = Arc::new(AppState::new(config));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("TriageXpert listening on http://{}", addr);
    info!("Triage API: POST http://{}/triage", addr);
    info!("Health:     GET  http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
