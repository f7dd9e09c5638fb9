//! LLM driver traits and the Gemini implementation.
//!
//! The conversation loop talks to models only through [`LlmDriver`] and
//! [`ChatSession`], so tests can substitute a scripted driver.
//!
//! # Drivers
//!
//! - [`GeminiDriver`]: Google Gemini REST API (`v1beta`)
//!
//! [`ModelSelector`] picks the first model that accepts a session from an
//! ordered candidate list.

pub mod gemini;
pub mod selector;

pub use gemini::{GeminiDriver, GeminiSettings};
pub use selector::ModelSelector;

use serde::Serialize;
use serde_json::{Map, Value};

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// `application/json` constrains the model to emit JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: Some(0.8),
            top_k: Some(40),
            max_output_tokens: None,
            response_mime_type: None,
        }
    }
}

impl GenerationConfig {
    /// JSON-only output with the given sampling budget.
    #[must_use]
    pub fn json_output(temperature: f64, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            top_p: None,
            top_k: None,
            max_output_tokens: Some(max_output_tokens),
            response_mime_type: Some("application/json".to_string()),
        }
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Map<String, Value>,
}

/// One model reply: free text plus zero or more function calls, in the
/// order the model emitted them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
}

impl ModelTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            function_calls: Vec::new(),
        }
    }

    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }
}

/// LLM call failures.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP 429 or a `RESOURCE_EXHAUSTED` status.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("model '{model}' unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// Stateful multi-turn conversation with one model.
#[async_trait::async_trait]
pub trait ChatSession: Send {
    /// Model serving this session.
    fn model(&self) -> &str;

    /// Send a user message and return the model's reply.
    ///
    /// History is only extended when the call succeeds.
    async fn send_message(&mut self, text: &str) -> Result<ModelTurn, LlmError>;
}

/// Entry point for model access.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Open a chat session with `model`, exposing the given function
    /// declarations.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be reached or does not exist.
    async fn start_chat(
        &self,
        model: &str,
        function_declarations: Vec<Value>,
        generation: &GenerationConfig,
    ) -> Result<Box<dyn ChatSession>, LlmError>;

    /// Single-shot generation without history or tools.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        generation: &GenerationConfig,
    ) -> Result<String, LlmError>;
}
