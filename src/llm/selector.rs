//! Ordered model fallback.

use serde_json::Value;
use tracing::{info, warn};

use super::{ChatSession, GenerationConfig, LlmDriver, LlmError};

/// Default chat candidates, tried in order.
pub const DEFAULT_MODELS: [&str; 4] = [
    "gemini-2.0-flash",
    "gemini-1.5-flash-002",
    "gemini-1.5-flash-001",
    "gemini-1.5-flash",
];

/// Last-resort model when every candidate fails.
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-1.5-pro";

/// Picks the first model that accepts a chat session.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    candidates: Vec<String>,
    fallback: Option<String>,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(
            DEFAULT_MODELS.iter().map(ToString::to_string).collect(),
            Some(DEFAULT_FALLBACK_MODEL.to_string()),
        )
    }
}

impl ModelSelector {
    pub fn new(candidates: Vec<String>, fallback: Option<String>) -> Self {
        Self {
            candidates,
            fallback,
        }
    }

    /// Every model in trial order: candidates, then the fallback.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.candidates
            .iter()
            .chain(self.fallback.iter())
            .map(String::as_str)
    }

    /// Model reported before any session exists.
    pub fn primary(&self) -> Option<&str> {
        self.models().next()
    }

    /// Open a session on the first model that accepts one.
    ///
    /// # Errors
    ///
    /// Returns the last failure when no model accepts a session.
    pub async fn start_chat(
        &self,
        driver: &dyn LlmDriver,
        function_declarations: &[Value],
        generation: &GenerationConfig,
    ) -> Result<Box<dyn ChatSession>, LlmError> {
        let mut last_error = None;

        for model in self.models() {
            match driver
                .start_chat(model, function_declarations.to_vec(), generation)
                .await
            {
                Ok(session) => {
                    info!(name: "llm.model.selected", model = %model, "Model selected");
                    return Ok(session);
                }
                Err(err) => {
                    warn!(model = %model, error = %err, "Model unavailable, trying next");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::ModelUnavailable {
            model: String::new(),
            reason: "no models configured".to_string(),
        }))
    }
}
