//! Shared fixtures: a scripted model and a local tool backend.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chainflow_agent::AppState;
use chainflow_agent::agent::AgentOrchestrator;
use chainflow_agent::llm::{
    ChatSession, FunctionCall, GenerationConfig, LlmDriver, LlmError, ModelTurn,
};
use chainflow_agent::tools::{InvokerSettings, ToolExecutor, ToolInvoker, ToolRegistry};
use serde_json::{Value, json};

/// Model double that replays a script and records every prompt.
#[derive(Clone, Default)]
pub struct ScriptedDriver {
    script: Arc<Mutex<VecDeque<Result<ModelTurn, LlmError>>>>,
    /// Reply used once the script runs out.
    repeat: Option<ModelTurn>,
    prompts: Arc<Mutex<Vec<String>>>,
    generated: Arc<Mutex<Option<Result<String, LlmError>>>>,
    unavailable: bool,
}

impl ScriptedDriver {
    pub fn new(turns: Vec<Result<ModelTurn, LlmError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(turns.into())),
            ..Self::default()
        }
    }

    /// Answers every turn with `turn`.
    pub fn repeating(turn: ModelTurn) -> Self {
        Self {
            repeat: Some(turn),
            ..Self::default()
        }
    }

    /// Rejects every session.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Single-shot generation returns `reply` once.
    pub fn generating(reply: Result<String, LlmError>) -> Self {
        Self {
            generated: Arc::new(Mutex::new(Some(reply))),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_turn(&self) -> Result<ModelTurn, LlmError> {
        if let Some(turn) = self.script.lock().unwrap().pop_front() {
            return turn;
        }
        Ok(self
            .repeat
            .clone()
            .unwrap_or_else(|| ModelTurn::text("done")))
    }
}

struct ScriptedChat {
    driver: ScriptedDriver,
    model: String,
}

#[async_trait]
impl ChatSession for ScriptedChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn send_message(&mut self, text: &str) -> Result<ModelTurn, LlmError> {
        self.driver.prompts.lock().unwrap().push(text.to_string());
        self.driver.next_turn()
    }
}

#[async_trait]
impl LlmDriver for ScriptedDriver {
    async fn start_chat(
        &self,
        model: &str,
        _function_declarations: Vec<Value>,
        _generation: &GenerationConfig,
    ) -> Result<Box<dyn ChatSession>, LlmError> {
        if self.unavailable {
            return Err(LlmError::ModelUnavailable {
                model: model.to_string(),
                reason: "not found".to_string(),
            });
        }
        Ok(Box::new(ScriptedChat {
            driver: self.clone(),
            model: model.to_string(),
        }))
    }

    async fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _generation: &GenerationConfig,
    ) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.generated
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("no reply scripted".into())))
    }
}

/// A turn requesting one tool call.
pub fn call(name: &str, args: Value) -> ModelTurn {
    ModelTurn {
        text: String::new(),
        function_calls: vec![FunctionCall {
            name: name.to_string(),
            args: args.as_object().cloned().unwrap(),
        }],
    }
}

/// Request bodies received by the mock tool backend.
pub type Received = Arc<Mutex<Vec<(String, Value)>>>;

/// Spawn a tool backend on an ephemeral port.
///
/// `get_token_info` always answers 500 and `get_token_balance` takes five
/// seconds to reply.
pub async fn spawn_backend() -> (String, Received) {
    let received = Received::default();

    let app = Router::new()
        .route(
            "/transfer/balance/{address}",
            get(|Path(address): Path<String>| async move {
                Json(json!({"success": true, "address": address, "balance": "1.5"}))
            }),
        )
        .route(
            "/transfer",
            post(|State(rec): State<Received>, Json(body): Json<Value>| async move {
                rec.lock().unwrap().push(("/transfer".to_string(), body));
                Json(json!({"success": true, "txHash": "0xfeed"}))
            }),
        )
        .route(
            "/token/deploy",
            post(|State(rec): State<Received>, Json(body): Json<Value>| async move {
                rec.lock().unwrap().push(("/token/deploy".to_string(), body));
                Json(json!({"success": true, "tokenId": "42"}))
            }),
        )
        .route(
            "/token/info/{token_id}",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "chain unavailable"})),
                )
            }),
        )
        .route(
            "/token/balance/{token_id}/{owner}",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"success": true, "balance": "0"}))
            }),
        )
        .with_state(Arc::clone(&received));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), received)
}

/// Agent state wired to `driver` and a real invoker against `backend_url`.
pub fn agent_state(driver: &ScriptedDriver, backend_url: &str) -> AppState {
    agent_state_with(driver, backend_url, InvokerSettings::default())
}

/// Like [`agent_state`], with explicit invoker settings.
pub fn agent_state_with(
    driver: &ScriptedDriver,
    backend_url: &str,
    settings: InvokerSettings,
) -> AppState {
    let registry = Arc::new(ToolRegistry::builtin(backend_url).unwrap());
    let invoker: Arc<dyn ToolExecutor> =
        Arc::new(ToolInvoker::new(Arc::clone(&registry), settings).unwrap());
    let orchestrator = AgentOrchestrator::new(
        Arc::new(driver.clone()),
        invoker,
        Arc::clone(&registry),
    );

    AppState {
        registry,
        orchestrator: Arc::new(orchestrator),
        backend_url: backend_url.to_string(),
    }
}
