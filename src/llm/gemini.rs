//! Google Gemini REST driver.
//!
//! Talks to the `v1beta` API directly with `reqwest`: `GET models/{model}` to
//! probe a model, `POST models/{model}:generateContent` for every turn.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{ChatSession, FunctionCall, GenerationConfig, LlmDriver, LlmError, ModelTurn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection settings for [`GeminiDriver`].
#[derive(Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Driver for the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiDriver {
    http: reqwest::Client,
    settings: GeminiSettings,
}

impl GeminiDriver {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: GeminiSettings) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    fn model_url(&self, model: &str) -> String {
        let base = self.settings.base_url.trim_end_matches('/');
        format!("{base}/models/{model}")
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<Content, LlmError> {
        let url = format!("{}:generateContent", self.model_url(model));
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.settings.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::InvalidResponse(format!("malformed body: {e}")))?;

        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            LlmError::InvalidResponse(reason)
        })?;

        Ok(candidate.content.unwrap_or_default())
    }
}

#[async_trait]
impl LlmDriver for GeminiDriver {
    async fn start_chat(
        &self,
        model: &str,
        function_declarations: Vec<Value>,
        generation: &GenerationConfig,
    ) -> Result<Box<dyn ChatSession>, LlmError> {
        let response = self
            .http
            .get(self.model_url(model))
            .header(API_KEY_HEADER, &self.settings.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match api_error(status.as_u16(), &body) {
                LlmError::Api { message, .. } => LlmError::ModelUnavailable {
                    model: model.to_string(),
                    reason: message,
                },
                other => other,
            });
        }

        debug!(model = %model, tools = function_declarations.len(), "llm.session.opened");

        Ok(Box::new(GeminiChat {
            driver: self.clone(),
            model: model.to_string(),
            tools: function_declarations,
            generation: generation.clone(),
            history: Vec::new(),
        }))
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        generation: &GenerationConfig,
    ) -> Result<String, LlmError> {
        let body = json!({
            "contents": [user_content(prompt)],
            "generationConfig": generation,
        });

        let content = self.generate_content(model, &body).await?;
        let turn = content.into_turn();
        if turn.text.is_empty() {
            return Err(LlmError::InvalidResponse("empty text".to_string()));
        }
        Ok(turn.text)
    }
}

/// Chat session holding the Gemini `contents` history.
struct GeminiChat {
    driver: GeminiDriver,
    model: String,
    tools: Vec<Value>,
    generation: GenerationConfig,
    history: Vec<Value>,
}

#[async_trait]
impl ChatSession for GeminiChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn send_message(&mut self, text: &str) -> Result<ModelTurn, LlmError> {
        let user = user_content(text);
        let mut contents = self.history.clone();
        contents.push(user.clone());

        let mut body = json!({
            "contents": contents,
            "generationConfig": self.generation,
        });
        if !self.tools.is_empty() {
            body["tools"] = json!([{ "functionDeclarations": self.tools }]);
        }

        let content = self.driver.generate_content(&self.model, &body).await?;

        self.history.push(user);
        self.history.push(content.raw.clone());

        Ok(content.into_turn())
    }
}

fn user_content(text: &str) -> Value {
    json!({ "role": "user", "parts": [{ "text": text }] })
}

/// Map an error status and body to [`LlmError`].
fn api_error(status: u16, body: &str) -> LlmError {
    let detail: Option<ErrorBody> = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error);

    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| body.to_string());
    let exhausted = detail
        .as_ref()
        .and_then(|d| d.status.as_deref())
        .is_some_and(|s| s == "RESOURCE_EXHAUSTED");

    if status == 429 || exhausted {
        LlmError::RateLimited(message)
    } else {
        LlmError::Api { status, message }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Candidate content, kept verbatim for history replay.
struct Content {
    raw: Value,
    parts: Vec<Part>,
}

impl Default for Content {
    // a blocked candidate carries no content; replay it as an empty model turn
    fn default() -> Self {
        Self {
            raw: json!({ "role": "model", "parts": [{ "text": "" }] }),
            parts: Vec::new(),
        }
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Parts {
            #[serde(default)]
            parts: Vec<Part>,
        }

        let raw = Value::deserialize(deserializer)?;
        let Parts { parts } = serde_json::from_value(raw.clone()).map_err(serde::de::Error::custom)?;
        Ok(Self { raw, parts })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCallPart>,
}

#[derive(Deserialize)]
struct FunctionCallPart {
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

impl Content {
    fn into_turn(self) -> ModelTurn {
        let mut turn = ModelTurn::default();
        for part in self.parts {
            if let Some(text) = part.text {
                turn.text.push_str(&text);
            }
            if let Some(call) = part.function_call {
                turn.function_calls.push(FunctionCall {
                    name: call.name,
                    args: call.args,
                });
            }
        }
        turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        bodies: Arc<Mutex<Vec<Value>>>,
        replies: Arc<Mutex<Vec<(StatusCode, Value)>>>,
    }

    async fn spawn_gemini(recorder: Recorder) -> String {
        let app = Router::new()
            .route(
                "/models/{model}",
                get(|Path(model): Path<String>, headers: HeaderMap| async move {
                    if headers.get(API_KEY_HEADER).is_none() {
                        return (StatusCode::UNAUTHORIZED, Json(json!({})));
                    }
                    if model.starts_with("missing") {
                        return (
                            StatusCode::NOT_FOUND,
                            Json(json!({"error": {"code": 404, "message": "model not found", "status": "NOT_FOUND"}})),
                        );
                    }
                    (StatusCode::OK, Json(json!({"name": format!("models/{model}")})))
                })
                .post(|State(rec): State<Recorder>, Json(body): Json<Value>| async move {
                    rec.bodies.lock().unwrap().push(body);
                    let (status, reply) = rec.replies.lock().unwrap().remove(0);
                    (status, Json(reply))
                }),
            )
            .with_state(recorder);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn driver(base: String) -> GeminiDriver {
        GeminiDriver::new(GeminiSettings {
            base_url: base,
            api_key: "test-key".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn reply(parts: Value) -> (StatusCode, Value) {
        (
            StatusCode::OK,
            json!({"candidates": [{"content": {"role": "model", "parts": parts}}]}),
        )
    }

    #[test]
    fn test_api_error_classification() {
        assert!(api_error(429, "slow down").is_rate_limited());
        assert!(
            api_error(
                400,
                r#"{"error": {"message": "quota", "status": "RESOURCE_EXHAUSTED"}}"#
            )
            .is_rate_limited()
        );
        assert!(matches!(
            api_error(500, r#"{"error": {"message": "boom"}}"#),
            LlmError::Api { status: 500, message } if message == "boom"
        ));
    }

    #[tokio::test]
    async fn test_chat_turns_accumulate_history() {
        let recorder = Recorder::default();
        recorder.replies.lock().unwrap().extend([
            reply(json!([{"functionCall": {"name": "get_balance", "args": {"address": "0xabc"}}}])),
            reply(json!([{"text": "Balance is 1.5"}])),
        ]);
        let base = spawn_gemini(recorder.clone()).await;
        let driver = driver(base);

        let decls = vec![json!({"name": "get_balance"})];
        let mut chat = driver
            .start_chat("gemini-2.0-flash", decls, &GenerationConfig::default())
            .await
            .unwrap();

        let first = chat.send_message("hello").await.unwrap();
        assert_eq!(first.function_calls[0].name, "get_balance");
        assert_eq!(first.function_calls[0].args["address"], "0xabc");

        let second = chat.send_message("Function get_balance returned: {}").await.unwrap();
        assert_eq!(second, ModelTurn::text("Balance is 1.5"));

        let bodies = recorder.bodies.lock().unwrap();
        assert_eq!(bodies[0]["tools"][0]["functionDeclarations"][0]["name"], "get_balance");
        assert_eq!(bodies[0]["generationConfig"]["topK"], 40);
        assert_eq!(bodies[1]["contents"].as_array().unwrap().len(), 3);
        assert_eq!(bodies[1]["contents"][1]["role"], "model");
    }

    #[tokio::test]
    async fn test_failed_send_keeps_history() {
        let recorder = Recorder::default();
        recorder.replies.lock().unwrap().extend([
            (
                StatusCode::TOO_MANY_REQUESTS,
                json!({"error": {"message": "quota", "status": "RESOURCE_EXHAUSTED"}}),
            ),
            reply(json!([{"text": "ok"}])),
        ]);
        let base = spawn_gemini(recorder.clone()).await;
        let mut chat = driver(base)
            .start_chat("gemini-2.0-flash", vec![], &GenerationConfig::default())
            .await
            .unwrap();

        let err = chat.send_message("first").await.unwrap_err();
        assert!(err.is_rate_limited());

        chat.send_message("second").await.unwrap();
        let bodies = recorder.bodies.lock().unwrap();
        assert_eq!(bodies[1]["contents"].as_array().unwrap().len(), 1);
        assert!(bodies[1].get("tools").is_none());
    }

    #[tokio::test]
    async fn test_probe_rejects_unknown_model() {
        let base = spawn_gemini(Recorder::default()).await;
        let err = driver(base)
            .start_chat("missing-model", vec![], &GenerationConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::ModelUnavailable { model, .. } if model == "missing-model"));
    }

    #[tokio::test]
    async fn test_generate_returns_text() {
        let recorder = Recorder::default();
        recorder
            .replies
            .lock()
            .unwrap()
            .push(reply(json!([{"text": "{\"agent_id\": \"a\"}"}])));
        let base = spawn_gemini(recorder.clone()).await;

        let text = driver(base)
            .generate("gemini-2.0-flash-exp", "make a workflow", &GenerationConfig::json_output(0.3, 2000))
            .await
            .unwrap();

        assert_eq!(text, "{\"agent_id\": \"a\"}");
        let bodies = recorder.bodies.lock().unwrap();
        assert_eq!(bodies[0]["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(bodies[0]["contents"][0]["parts"][0]["text"], "make a workflow");
    }
}
