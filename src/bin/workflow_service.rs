//! Workflow service entry point.

use std::sync::Arc;

use chainflow_agent::config::{AppConfig, Service};
use chainflow_agent::{server, telemetry};
use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing::{error, info};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    let _ = dotenv();

    let config = match AppConfig::load(Service::Workflow) {
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
        model = %config.llm.workflow_model,
        "LLM configuration loaded"
    );

    if let Err(e) = server::start_workflow_server(config).await {
        error!(error = %e, "Workflow service failed");
        std::process::exit(1);
    }
}
