//! Agent service entry point.

use std::sync::Arc;

use chainflow_agent::config::{AppConfig, Service};
use chainflow_agent::{server, telemetry};
use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing::{error, info};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load(Service::Agent) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    telemetry::init(config.logging.json);

    info!(
        name: "llm.config.loaded",
        base_url = %config.llm.base_url,
        models = ?config.llm.models,
        fallback = ?config.llm.fallback_model,
        "LLM configuration loaded"
    );

    if let Err(e) = server::start_agent_server(config).await {
        error!(error = %e, "Agent service failed");
        std::process::exit(1);
    }
}
