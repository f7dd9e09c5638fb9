use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::{AgentOrchestrator, AgentRequest, PromptBuilder, ToolCallRecord, ToolConnection, ToolPlan};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::llm::{GeminiDriver, LlmDriver};
use crate::tools::{ToolExecutor, ToolInvocationResult, ToolInvoker, ToolRegistry};
use crate::workflow::{AVAILABLE_TOOLS, WorkflowBuilder, WorkflowGraph, WorkflowRequest};
use crate::{AppState, WorkflowState};

/// Network reported by the agent `/health` endpoint.
const BLOCKCHAIN: &str = "Arbitrum Sepolia";

/// `POST /agent/chat` body.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub tools: Vec<ToolConnection>,
    pub user_message: String,
    #[serde(default)]
    pub private_key: Option<String>,
}

/// `POST /agent/chat` response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub agent_response: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub results: Vec<ToolInvocationResult>,
}

/// Build the agent service state from configuration.
///
/// # Errors
///
/// Returns an error if the tool registry is invalid or an HTTP client cannot
/// be built.
pub fn build_agent_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let registry = Arc::new(ToolRegistry::builtin(&config.tools.backend_url)?);
    let invoker: Arc<dyn ToolExecutor> = Arc::new(ToolInvoker::new(
        Arc::clone(&registry),
        config.invoker_settings(),
    )?);
    let driver: Arc<dyn LlmDriver> = Arc::new(GeminiDriver::new(config.gemini_settings())?);

    let orchestrator = AgentOrchestrator::new(driver, invoker, Arc::clone(&registry))
        .with_selector(config.model_selector())
        .with_generation(config.generation())
        .with_max_iterations(config.agent.max_iterations);

    Ok(AppState {
        registry,
        orchestrator: Arc::new(orchestrator),
        backend_url: config.tools.backend_url.clone(),
    })
}

/// Build the workflow service state from configuration.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_workflow_state(config: &AppConfig) -> anyhow::Result<WorkflowState> {
    let driver: Arc<dyn LlmDriver> = Arc::new(GeminiDriver::new(config.gemini_settings())?);
    Ok(WorkflowState {
        builder: Arc::new(WorkflowBuilder::new(driver, config.llm.workflow_model.clone())),
    })
}

pub fn agent_router(state: AppState) -> Router {
    Router::new()
        .route("/agent/chat", post(agent_chat))
        .route("/tools", get(list_tools))
        .route("/health", get(agent_health))
        .with_state(state)
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
}

pub fn workflow_router(state: WorkflowState) -> Router {
    Router::new()
        .route("/create-workflow", post(create_workflow))
        .route("/available-tools", get(available_tools))
        .route("/health", get(workflow_health))
        .with_state(state)
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the agent service.
pub async fn start_agent_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = build_agent_state(&config)?;

    for name in state.registry.names() {
        tracing::debug!(tool_name = %name, "tool.registered");
    }
    info!(
        name: "tools.registry.loaded",
        tools = state.registry.len(),
        backend_url = %state.backend_url,
        "Tool registry loaded"
    );

    serve(agent_router(state), &config, "agent").await
}

/// Start the workflow service.
pub async fn start_workflow_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = build_workflow_state(&config)?;
    info!(
        name: "workflow.model.configured",
        model = %state.builder.model(),
        "Workflow model configured"
    );
    serve(workflow_router(state), &config, "workflow").await
}

async fn serve(app: Router, config: &AppConfig, service: &str) -> anyhow::Result<()> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        service = %service,
        address = %format!("http://{addr}"),
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn agent_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let plan = ToolPlan::from_connections(&req.tools);
    plan.validate(&state.registry)?;

    let system_prompt = PromptBuilder::new(&state.registry).build_for_plan(&plan);
    let request = AgentRequest::new(plan, system_prompt, req.user_message).with_secret(req.private_key);

    let run = state.orchestrator.run(request).await?;

    info!(
        model = %run.model,
        iterations = run.iterations,
        tool_calls = run.tool_calls.len(),
        "agent.chat.completed"
    );

    Ok(Json(ChatResponse {
        agent_response: run.response_text().to_string(),
        tool_calls: run.tool_calls,
        results: run.results,
    }))
}

async fn list_tools(State(state): State<AppState>) -> Json<Value> {
    let details: Map<String, Value> = state
        .registry
        .definitions()
        .iter()
        .map(|def| {
            (
                def.name.clone(),
                serde_json::to_value(def).unwrap_or(Value::Null),
            )
        })
        .collect();

    Json(json!({
        "tools": state.registry.names(),
        "details": details,
    }))
}

async fn agent_health(State(state): State<AppState>) -> Json<Value> {
    let models: Vec<&str> = state.orchestrator.selector().models().collect();
    Json(json!({
        "status": "healthy",
        "service": "AI Agent Builder",
        "blockchain": BLOCKCHAIN,
        "ai_model": format!("Auto-detect ({})", models.join(" > ")),
        "backend_url": state.backend_url,
    }))
}

async fn create_workflow(
    State(state): State<WorkflowState>,
    Json(req): Json<WorkflowRequest>,
) -> Result<Json<WorkflowGraph>, ApiError> {
    let graph = state.builder.create(&req).await?;
    Ok(Json(graph))
}

async fn available_tools() -> Json<Value> {
    Json(json!({ "tools": AVAILABLE_TOOLS }))
}

async fn workflow_health(State(state): State<WorkflowState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "Agent Workflow Builder",
        "ai_model": state.builder.model(),
    }))
}
