//! Tool-calling agent: plan derivation, prompt rendering, and the bounded
//! conversation loop.

pub mod orchestrator;
pub mod plan;
pub mod prompt;

pub use orchestrator::{
    AgentOrchestrator, AgentRequest, AgentRun, EXHAUSTED_MESSAGE, RATE_LIMIT_MESSAGE, RunOutcome,
    ToolCallRecord,
};
pub use plan::{FlowMap, ToolPlan};
pub use prompt::PromptBuilder;

use serde::{Deserialize, Deserializer, Serialize};

use crate::llm::LlmError;

/// A declared tool with an optional forced successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConnection {
    pub tool: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub next_tool: Option<String>,
}

impl ToolConnection {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            next_tool: None,
        }
    }

    /// Connect `tool` to `next`. An empty `next` leaves the tool unconnected.
    pub fn then(tool: impl Into<String>, next: impl Into<String>) -> Self {
        let next = next.into();
        Self {
            tool: tool.into(),
            next_tool: (!next.is_empty()).then_some(next),
        }
    }
}

/// Empty strings count as absent. Whitespace is kept, so it fails tool
/// validation like any other unregistered name.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Fatal agent failures. Rate limits and loop exhaustion are outcomes, not
/// errors; see [`RunOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Failed to initialize any Gemini model. Last error: {0}")]
    NoModelAvailable(#[source] LlmError),

    #[error(transparent)]
    Model(#[from] LlmError),
}
