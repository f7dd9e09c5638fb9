//! Natural language to workflow graph synthesis.
//!
//! A single JSON-constrained generation turns a description such as "deploy a
//! token then transfer it" into an agent node plus tool nodes linked by
//! `next_tools`. [`WorkflowGraph::to_connections`] converts the graph into the
//! connection list the agent service accepts.

pub mod prompt;

pub use prompt::AVAILABLE_TOOLS;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::ToolConnection;
use crate::llm::{GenerationConfig, LlmDriver, LlmError};

pub const DEFAULT_WORKFLOW_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// `POST /create-workflow` body.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRequest {
    pub user_query: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl WorkflowRequest {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub next_tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub agent_id: String,
    pub tools: Vec<ToolNode>,
    pub has_sequential_execution: bool,
    pub description: String,
    #[serde(default)]
    pub raw_response: Option<String>,
}

impl WorkflowGraph {
    /// True when any node declares a successor.
    pub fn is_sequential(&self) -> bool {
        self.tools.iter().any(|t| !t.next_tools.is_empty())
    }

    /// Ordered connections for the agent service.
    ///
    /// Node ids are mapped to agent tool names. A node with several successors
    /// yields one connection per successor; since the agent keeps one forced
    /// successor per tool, the last one wins there. Edges to unknown ids are
    /// dropped.
    pub fn to_connections(&self) -> Vec<ToolConnection> {
        let by_id: HashMap<&str, &str> = self
            .tools
            .iter()
            .map(|t| (t.id.as_str(), prompt::agent_tool_name(&t.kind)))
            .collect();

        let mut connections = Vec::new();
        for node in &self.tools {
            let tool = prompt::agent_tool_name(&node.kind);
            let targets: Vec<&str> = node
                .next_tools
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .collect();

            if targets.is_empty() {
                connections.push(ToolConnection::new(tool));
            } else {
                connections.extend(targets.into_iter().map(|next| ToolConnection::then(tool, next)));
            }
        }
        connections
    }
}

/// Workflow synthesis failures.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Gemini generation error: {0}")]
    Generation(#[source] LlmError),

    #[error("Invalid JSON response: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Valid JSON that does not describe a workflow graph.
    #[error("Error processing request: {0}")]
    InvalidWorkflow(#[source] serde_json::Error),
}

/// Single-shot workflow generator.
#[derive(Clone)]
pub struct WorkflowBuilder {
    driver: Arc<dyn LlmDriver>,
    model: String,
}

impl std::fmt::Debug for WorkflowBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowBuilder")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl WorkflowBuilder {
    pub fn new(driver: Arc<dyn LlmDriver>, model: impl Into<String>) -> Self {
        Self {
            driver,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a workflow graph for `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails or the model output is not a
    /// workflow graph.
    pub async fn create(&self, request: &WorkflowRequest) -> Result<WorkflowGraph, WorkflowError> {
        info!(
            model = %self.model,
            temperature = request.temperature(),
            max_tokens = request.max_tokens(),
            "workflow.create"
        );

        let generation = GenerationConfig::json_output(request.temperature(), request.max_tokens());
        let raw = self
            .driver
            .generate(&self.model, &prompt::render(&request.user_query), &generation)
            .await
            .map_err(WorkflowError::Generation)?;

        let value: Value = serde_json::from_str(&raw).map_err(WorkflowError::InvalidJson)?;
        let mut graph: WorkflowGraph =
            serde_json::from_value(value).map_err(WorkflowError::InvalidWorkflow)?;

        let sequential = graph.is_sequential();
        if graph.has_sequential_execution != sequential {
            warn!(
                reported = graph.has_sequential_execution,
                actual = sequential,
                "workflow.sequential_flag.corrected"
            );
            graph.has_sequential_execution = sequential;
        }
        graph.raw_response = Some(raw);

        info!(tools = graph.tools.len(), sequential, "workflow.created");
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatSession;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedDriver {
        reply: Mutex<Option<Result<String, LlmError>>>,
        seen: Mutex<Vec<(String, String, GenerationConfig)>>,
    }

    impl CannedDriver {
        fn new(reply: Result<String, LlmError>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmDriver for CannedDriver {
        async fn start_chat(
            &self,
            _model: &str,
            _decls: Vec<Value>,
            _generation: &GenerationConfig,
        ) -> Result<Box<dyn ChatSession>, LlmError> {
            unreachable!()
        }

        async fn generate(
            &self,
            model: &str,
            prompt: &str,
            generation: &GenerationConfig,
        ) -> Result<String, LlmError> {
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), prompt.to_string(), generation.clone()));
            self.reply.lock().unwrap().take().unwrap()
        }
    }

    fn graph_json(next: &[&str], sequential: bool) -> String {
        json!({
            "agent_id": "agent_1",
            "tools": [
                {"id": "tool_1", "type": "deploy_erc20", "name": "Deploy", "next_tools": next},
                {"id": "tool_2", "type": "transfer", "name": "Send", "next_tools": []}
            ],
            "has_sequential_execution": sequential,
            "description": "Deploy then send"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_create_parses_and_attaches_raw() {
        let raw = graph_json(&["tool_2"], true);
        let driver = CannedDriver::new(Ok(raw.clone()));
        let builder = WorkflowBuilder::new(Arc::clone(&driver) as Arc<dyn LlmDriver>, DEFAULT_WORKFLOW_MODEL);

        let graph = builder
            .create(&WorkflowRequest::new("deploy a token then transfer it"))
            .await
            .unwrap();

        assert_eq!(graph.tools.len(), 2);
        assert!(graph.has_sequential_execution);
        assert_eq!(graph.raw_response.as_deref(), Some(raw.as_str()));

        let seen = driver.seen.lock().unwrap();
        let (model, prompt, generation) = &seen[0];
        assert_eq!(model, "gemini-2.0-flash-exp");
        assert!(prompt.ends_with(
            "User Query: deploy a token then transfer it\n\nGenerate the workflow JSON:"
        ));
        assert_eq!(generation.max_output_tokens, Some(2000));
        assert_eq!(generation.response_mime_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_sequential_flag_is_normalized() {
        let driver = CannedDriver::new(Ok(graph_json(&[], true)));
        let graph = WorkflowBuilder::new(driver, "m")
            .create(&WorkflowRequest::new("tools"))
            .await
            .unwrap();
        assert!(!graph.has_sequential_execution);
    }

    #[tokio::test]
    async fn test_error_messages() {
        let not_json = WorkflowBuilder::new(CannedDriver::new(Ok("nope".into())), "m")
            .create(&WorkflowRequest::new("x"))
            .await
            .unwrap_err();
        assert!(not_json.to_string().starts_with("Invalid JSON response: "));

        let wrong_shape = WorkflowBuilder::new(CannedDriver::new(Ok("{\"tools\": 3}".into())), "m")
            .create(&WorkflowRequest::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(wrong_shape, WorkflowError::InvalidWorkflow(_)));

        let failed = WorkflowBuilder::new(
            CannedDriver::new(Err(LlmError::InvalidResponse("empty text".into()))),
            "m",
        )
        .create(&WorkflowRequest::new("x"))
        .await
        .unwrap_err();
        assert_eq!(
            failed.to_string(),
            "Gemini generation error: invalid response: empty text"
        );
    }

    #[test]
    fn test_to_connections_maps_ids_and_aliases() {
        let graph = WorkflowGraph {
            agent_id: "agent_1".into(),
            tools: vec![
                ToolNode {
                    id: "tool_1".into(),
                    kind: "fetch_token_price".into(),
                    name: "Price".into(),
                    next_tools: vec!["tool_2".into(), "tool_9".into()],
                },
                ToolNode {
                    id: "tool_2".into(),
                    kind: "transfer".into(),
                    name: "Send".into(),
                    next_tools: vec![],
                },
            ],
            has_sequential_execution: true,
            description: String::new(),
            raw_response: None,
        };

        assert_eq!(
            graph.to_connections(),
            vec![
                ToolConnection::then("fetch_price", "transfer"),
                ToolConnection::new("transfer"),
            ]
        );
    }

    #[test]
    fn test_request_defaults() {
        let req: WorkflowRequest = serde_json::from_value(json!({"user_query": "q", "temperature": null})).unwrap();
        assert!((req.temperature() - 0.3).abs() < f64::EPSILON);
        assert_eq!(req.max_tokens(), 2000);
    }
}
