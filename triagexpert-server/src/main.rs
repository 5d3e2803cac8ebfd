//! TriageXpert server binary.
//!
//! ```bash
//! # Defaults: port 5000, keyword classifier, explainer at localhost:11434
//! triagexpert-server
//!
//! # Custom configuration
//! TRIAGE_PORT=8080 TRIAGE_EXPLAINER_MODEL=mistral:7b triagexpert-server
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use triagexpert_server::{run_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("triagexpert_server=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    run_server(ServerConfig::from_env()).await
}
