//! Outbound HTTP execution of registered tools.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::registry::ToolRegistry;
use super::schema::{ArgumentError, ToolArguments};
use super::{HttpMethod, ToolDefinition, placeholder_names};

/// Error raised while invoking a tool. Always recovered into a
/// [`ToolInvocationResult`] failure envelope.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: ArgumentError,
    },

    /// Endpoint template names a parameter the arguments did not carry.
    #[error("endpoint placeholder '{{{0}}}' has no argument")]
    UnresolvedPlaceholder(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Uniform outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocationResult {
    pub success: bool,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolInvocationResult {
    pub fn success(tool: impl Into<String>, result: Value) -> Self {
        Self {
            success: true,
            tool: tool.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(tool: impl Into<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            tool: tool.into(),
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// Seam between the conversation loop and tool execution.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Invoke `name` with model-supplied arguments. Never fails; errors are
    /// reported through the returned envelope.
    async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> ToolInvocationResult;
}

/// Settings for [`ToolInvoker`].
#[derive(Debug, Clone)]
pub struct InvokerSettings {
    pub timeout: Duration,
    /// Host that receives the bearer token (subdomains included).
    pub trusted_domain: String,
    pub bearer_token: Option<String>,
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            trusted_domain: "api.subgraph.somnia.network".to_string(),
            bearer_token: None,
        }
    }
}

/// HTTP-backed [`ToolExecutor`].
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    http: reqwest::Client,
    settings: InvokerSettings,
}

impl std::fmt::Debug for ToolInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvoker")
            .field("tools", &self.registry.len())
            .field("timeout", &self.settings.timeout)
            .field("trusted_domain", &self.settings.trusted_domain)
            .field("bearer_token", &self.settings.bearer_token.is_some())
            .finish()
    }
}

impl ToolInvoker {
    /// Build an invoker with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(registry: Arc<ToolRegistry>, settings: InvokerSettings) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            registry,
            http,
            settings,
        })
    }

    fn bearer_for(&self, url: &str) -> Option<&str> {
        let token = self.settings.bearer_token.as_deref()?;
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        is_trusted_host(host, &self.settings.trusted_domain).then_some(token)
    }

    async fn execute(&self, def: &ToolDefinition, mut args: ToolArguments) -> Result<Value, ToolError> {
        let url = resolve_endpoint(&def.endpoint, &mut args)?;

        let mut request = match def.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url).json(&args),
        };
        if let Some(token) = self.bearer_for(&url) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(ToolError::Status {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }

        serde_json::from_str(&body).map_err(|e| ToolError::InvalidJson(e.to_string()))
    }

    fn classify(&self, err: reqwest::Error) -> ToolError {
        if err.is_timeout() {
            ToolError::Timeout(self.settings.timeout)
        } else {
            ToolError::Request(err)
        }
    }
}

#[async_trait]
impl ToolExecutor for ToolInvoker {
    async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> ToolInvocationResult {
        let Some(def) = self.registry.lookup(name) else {
            warn!(tool_name = %name, "tool.unknown");
            return ToolInvocationResult::failure(name, ToolError::UnknownTool(name.to_string()));
        };

        debug!(
            tool_name = %name,
            arguments = %serde_json::Value::Object(def.parameters.redact(arguments)),
            "tool.arguments"
        );

        let args = match def.parameters.validate(arguments) {
            Ok(args) => args,
            Err(source) => {
                let err = ToolError::InvalidArguments {
                    tool: name.to_string(),
                    source,
                };
                warn!(tool_name = %name, error = %err, "tool.invalid_arguments");
                return ToolInvocationResult::failure(name, err);
            }
        };

        info!(tool_name = %name, method = ?def.method, "tool.invoke");

        match self.execute(def, args).await {
            Ok(result) => ToolInvocationResult::success(name, result),
            Err(err) => {
                if matches!(err, ToolError::UnresolvedPlaceholder(_)) {
                    error!(tool_name = %name, error = %err, "tool.endpoint.misconfigured");
                } else {
                    warn!(tool_name = %name, error = %err, "tool.failed");
                }
                ToolInvocationResult::failure(name, err)
            }
        }
    }
}

/// Fill `{param}` tokens in `template` from `args`, removing each consumed
/// argument. Values are percent-encoded.
///
/// # Errors
///
/// Returns [`ToolError::UnresolvedPlaceholder`] if a token has no argument.
pub fn resolve_endpoint(template: &str, args: &mut ToolArguments) -> Result<String, ToolError> {
    let mut url = template.to_string();
    let mut seen: Vec<&str> = Vec::new();

    for name in placeholder_names(template) {
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);
        let value = args
            .take(name)
            .ok_or_else(|| ToolError::UnresolvedPlaceholder(name.to_string()))?;
        let encoded = urlencoding::encode(&value.to_string()).into_owned();
        url = url.replace(&format!("{{{name}}}"), &encoded);
    }

    Ok(url)
}

fn is_trusted_host(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    !domain.is_empty() && (host == domain || host.ends_with(&format!(".{domain}")))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
