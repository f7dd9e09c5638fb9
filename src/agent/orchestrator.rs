//! Bounded tool-calling conversation loop.
//!
//! One [`AgentOrchestrator::run`] call:
//! 1. Opens a chat session on the first available model
//! 2. Sends the system prompt and user message
//! 3. Executes every function call the model requests, in order
//! 4. Feeds the last result back, with a directive naming the forced successor
//! 5. Stops on a text-only reply, a rate limit, or the iteration cap

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AgentError;
use super::plan::{FlowMap, ToolPlan};
use crate::llm::{GenerationConfig, LlmDriver, LlmError, ModelSelector};
use crate::tools::{ToolExecutor, ToolInvocationResult, ToolRegistry};

/// Default bound on model turns per run.
pub const MAX_ITERATIONS: usize = 10;

pub const RATE_LIMIT_MESSAGE: &str =
    "I'm currently experiencing high traffic (Rate Limit Exceeded). Please try again in a few moments.";

pub const EXHAUSTED_MESSAGE: &str =
    "Maximum iterations reached. Please try again with a simpler request.";

/// Input for one agent run.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub system_prompt: String,
    pub user_message: String,
    /// Tools exposed to the model, in prompt order.
    pub available_tools: Vec<String>,
    pub flow: FlowMap,
    /// Caller credential injected into `secret` parameters.
    pub secret: Option<String>,
}

impl AgentRequest {
    pub fn new(plan: ToolPlan, system_prompt: String, user_message: String) -> Self {
        let (available_tools, flow) = plan.into_parts();
        Self {
            system_prompt,
            user_message,
            available_tools,
            flow,
            secret: None,
        }
    }

    #[must_use]
    pub fn with_secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret.filter(|s| !s.is_empty());
        self
    }
}

/// A tool call as reported to the caller. Secret values are redacted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub parameters: Map<String, Value>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model replied without requesting a tool.
    FinalAnswer(String),
    /// The model API reported a rate limit.
    RateLimited,
    /// The iteration cap was reached while the model kept calling tools.
    Exhausted,
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub outcome: RunOutcome,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Aligned index-for-index with `tool_calls`.
    pub results: Vec<ToolInvocationResult>,
    pub iterations: usize,
    pub model: String,
}

impl AgentRun {
    /// Text returned to the caller for this outcome.
    pub fn response_text(&self) -> &str {
        match &self.outcome {
            RunOutcome::FinalAnswer(text) => text,
            RunOutcome::RateLimited => RATE_LIMIT_MESSAGE,
            RunOutcome::Exhausted => EXHAUSTED_MESSAGE,
        }
    }
}

/// Mutable state local to one run.
#[derive(Debug, Default)]
struct RunState {
    iteration: usize,
    tool_calls: Vec<ToolCallRecord>,
    results: Vec<ToolInvocationResult>,
    pending_prompt: String,
}

impl RunState {
    fn finish(self, outcome: RunOutcome, model: &str) -> AgentRun {
        AgentRun {
            outcome,
            tool_calls: self.tool_calls,
            results: self.results,
            iterations: self.iteration,
            model: model.to_string(),
        }
    }
}

/// Drives the model/tool loop.
///
/// Shared across requests; every run keeps its own [`RunState`].
#[derive(Clone)]
pub struct AgentOrchestrator {
    driver: Arc<dyn LlmDriver>,
    executor: Arc<dyn ToolExecutor>,
    registry: Arc<ToolRegistry>,
    selector: ModelSelector,
    generation: GenerationConfig,
    max_iterations: usize,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for AgentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOrchestrator")
            .field("selector", &self.selector)
            .field("generation", &self.generation)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

impl AgentOrchestrator {
    pub fn new(
        driver: Arc<dyn LlmDriver>,
        executor: Arc<dyn ToolExecutor>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            driver,
            executor,
            registry,
            selector: ModelSelector::default(),
            generation: GenerationConfig::default(),
            max_iterations: MAX_ITERATIONS,
        }
    }

    #[must_use]
    pub fn with_selector(mut self, selector: ModelSelector) -> Self {
        self.selector = selector;
        self
    }

    #[must_use]
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    /// Run the loop to a terminal [`RunOutcome`].
    ///
    /// # Errors
    ///
    /// Returns an error if no model accepts a session or a model call fails
    /// with anything other than a rate limit.
    pub async fn run(&self, request: AgentRequest) -> Result<AgentRun, AgentError> {
        let run_id = Uuid::new_v4();

        let mut system_prompt = request.system_prompt;
        if let Some(secret) = &request.secret {
            system_prompt.push_str("\n\nCONTEXT: User's private key is available: ");
            system_prompt.push_str(secret);
        }

        let declarations = self
            .registry
            .function_declarations(request.available_tools.as_slice());
        let mut chat = self
            .selector
            .start_chat(self.driver.as_ref(), &declarations, &self.generation)
            .await
            .map_err(AgentError::NoModelAvailable)?;
        let model = chat.model().to_string();

        info!(
            %run_id,
            model = %model,
            tools = request.available_tools.len(),
            forced_edges = request.flow.len(),
            "agent.run.started"
        );

        let mut state = RunState {
            pending_prompt: format!("{system_prompt}\n\nUser: {}", request.user_message),
            ..RunState::default()
        };

        while state.iteration < self.max_iterations {
            state.iteration += 1;

            let turn = match chat.send_message(&state.pending_prompt).await {
                Ok(turn) => turn,
                Err(LlmError::RateLimited(reason)) => {
                    warn!(%run_id, iteration = state.iteration, reason = %reason, "agent.run.rate_limited");
                    return Ok(state.finish(RunOutcome::RateLimited, &model));
                }
                Err(err) => return Err(err.into()),
            };

            if !turn.has_function_calls() {
                info!(
                    %run_id,
                    iteration = state.iteration,
                    tool_calls = state.tool_calls.len(),
                    "agent.run.completed"
                );
                return Ok(state.finish(RunOutcome::FinalAnswer(turn.text), &model));
            }

            for call in turn.function_calls {
                let mut args = call.args;
                self.inject_secrets(&call.name, &mut args, request.secret.as_deref());

                let parameters = self.redacted(&call.name, &args);
                info!(%run_id, iteration = state.iteration, tool_name = %call.name, "agent.tool.call");
                debug!(%run_id, tool_name = %call.name, parameters = %serde_json::Value::Object(parameters.clone()), "agent.tool.arguments");

                state.tool_calls.push(ToolCallRecord {
                    tool: call.name.clone(),
                    parameters,
                });

                let result = self.executor.invoke(&call.name, &args).await;
                if !result.success {
                    warn!(
                        %run_id,
                        tool_name = %call.name,
                        error = result.error.as_deref().unwrap_or_default(),
                        "agent.tool.failed"
                    );
                }

                state.pending_prompt = format!(
                    "Function {} returned: {}",
                    call.name,
                    serde_json::to_string(&result).unwrap_or_default()
                );
                state.results.push(result);
            }

            let last_tool = state.tool_calls.last().map(|c| c.tool.as_str());
            if let Some(next) = last_tool.and_then(|t| request.flow.next(t)) {
                debug!(%run_id, next_tool = %next, "agent.flow.directive");
                state.pending_prompt.push_str(&format!(
                    "\n\nIMPORTANT: You must now immediately call the {next} tool as it is next in the sequential flow."
                ));
            }
        }

        warn!(%run_id, iterations = state.iteration, "agent.run.exhausted");
        Ok(state.finish(RunOutcome::Exhausted, &model))
    }

    /// Fill absent secret parameters from the caller's credential.
    fn inject_secrets(&self, tool: &str, args: &mut Map<String, Value>, secret: Option<&str>) {
        let (Some(secret), Some(def)) = (secret, self.registry.lookup(tool)) else {
            return;
        };
        for param in def.parameters.secret_params() {
            args.entry(param.name.clone())
                .or_insert_with(|| Value::String(secret.to_string()));
        }
    }

    fn redacted(&self, tool: &str, args: &Map<String, Value>) -> Map<String, Value> {
        match self.registry.lookup(tool) {
            Some(def) => def.parameters.redact(args),
            None => args.clone(),
        }
    }
}
