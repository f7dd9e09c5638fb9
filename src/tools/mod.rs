//! Tool definitions, registry, and HTTP invocation.
//!
//! A tool is a named operation on an external HTTP service. The agent loop
//! only sees tool names and JSON arguments; everything needed to reach the
//! service lives in a [`ToolDefinition`].
//!
//! - [`registry`]: the static name → definition mapping
//! - [`schema`]: parameter declarations and typed argument validation
//! - [`invoker`]: endpoint resolution and the outbound HTTP call

pub mod invoker;
pub mod registry;
pub mod schema;

pub use invoker::{InvokerSettings, ToolError, ToolExecutor, ToolInvocationResult, ToolInvoker};
pub use registry::{RegistryError, ToolRegistry};
pub use schema::{ArgValue, ArgumentError, ParamSpec, ParamType, ParameterSchema, ToolArguments};

use serde::{Deserialize, Serialize};

/// HTTP method used to reach a tool endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// Immutable description of one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
    /// URL template; `{param}` tokens are filled from arguments.
    pub endpoint: String,
    pub method: HttpMethod,
}

impl ToolDefinition {
    /// Names of the `{param}` placeholders in the endpoint template, in order.
    pub fn placeholders(&self) -> Vec<&str> {
        placeholder_names(&self.endpoint)
    }
}

/// Extract `{name}` tokens from a URL template.
pub(crate) fn placeholder_names(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else { break };
        names.push(&after[..close]);
        rest = &after[close + 1..];
    }
    names
}
