//! Ollama Backend Implementation
//!
//! Backend for Ollama (local LLM server).
//!
//! # Ollama API
//!
//! Ollama provides a REST API for:
//! - `/api/generate` - Single-turn completions (streaming or batch)
//! - `/api/chat` - Chat completions with message history
//! - `/api/tags` - List available models
//! - `/api/pull` - Fetch a model from the registry
//!
//! Generation uses the generate endpoint: the system prompt is folded into a
//! single prompt string and sampling parameters go in a flat `options` object.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{json, Value};
use tracing::{error, info};

use super::error::BackendError;
use super::http::HttpCore;
use super::retry::with_retry;
use super::stream::{error_stream, fragments, LineEvent};
use super::traits::{
    Backend, BackendHealth, BackendSettings, ChatMessage, GenerationRequest, GenerationResult,
    InferenceBackend,
};

const GENERATE_PATH: &str = "/api/generate";
const CHAT_PATH: &str = "/api/chat";
const TAGS_PATH: &str = "/api/tags";
const PULL_PATH: &str = "/api/pull";

/// Context window requested for single-turn generation
const GENERATE_NUM_CTX: u32 = 8192;
/// Context window requested for chat and streaming
const CHAT_NUM_CTX: u32 = 2048;

/// Ollama backend client
#[derive(Clone, Debug)]
pub struct OllamaBackend {
    http: HttpCore,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            http: HttpCore::new(settings),
        }
    }

    /// Settings this backend was created with
    pub fn settings(&self) -> &BackendSettings {
        &self.http.settings
    }

    /// Build the full prompt including the system preamble
    pub(crate) fn build_prompt(request: &GenerationRequest) -> String {
        match request.system_prompt() {
            Some(system) => format!("System: {system}\n\nUser: {}", request.prompt()),
            None => request.prompt().to_string(),
        }
    }

    fn options(temperature: f32, max_tokens: u32, num_ctx: u32) -> Value {
        json!({
            "temperature": temperature,
            "top_p": 0.9,
            "top_k": 40,
            "repeat_penalty": 1.1,
            "num_predict": max_tokens,
            "num_ctx": num_ctx,
        })
    }

    /// Payload for `/api/generate`
    pub(crate) fn generate_payload(request: &GenerationRequest, stream: bool, num_ctx: u32) -> Value {
        json!({
            "model": request.model(),
            "prompt": Self::build_prompt(request),
            "stream": stream,
            "options": Self::options(request.temperature(), request.max_tokens(), num_ctx),
        })
    }

    /// Extract text and token counts from a `/api/generate` body
    pub(crate) fn parse_generate(data: &Value) -> Result<GenerationResult, BackendError> {
        let text = data
            .get("response")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::Malformed("missing 'response' field".to_string()))?;

        let completion = data.get("eval_count").and_then(Value::as_u64).unwrap_or(0);
        let prompt = data
            .get("prompt_eval_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        Ok(GenerationResult::success(text, completion, prompt))
    }

    /// Model names from a `/api/tags` body
    pub(crate) fn model_names(data: &Value) -> Vec<String> {
        data.get("models")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m.get("name").and_then(Value::as_str).map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Decode one NDJSON line from a streaming generate response
    pub(crate) fn decode_line(line: &str) -> LineEvent {
        if line.is_empty() {
            return LineEvent::Skip;
        }
        let Ok(data) = serde_json::from_str::<Value>(line) else {
            return LineEvent::Skip;
        };

        let token = data
            .get("response")
            .and_then(Value::as_str)
            .map(String::from);

        if data.get("done").and_then(Value::as_bool).unwrap_or(false) {
            LineEvent::Done(token)
        } else {
            token.map_or(LineEvent::Skip, LineEvent::Fragment)
        }
    }

    /// Multi-turn chat over `/api/chat`, single attempt.
    ///
    /// Failures come back as an error result, like generation.
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> GenerationResult {
        let payload = json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": Self::options(temperature.clamp(0.0, 1.0), max_tokens.max(1), CHAT_NUM_CTX),
        });

        info!(model = %model, messages = messages.len(), "Chat completion");

        let outcome = self
            .http
            .post_json(CHAT_PATH, &payload, self.http.settings.generation_timeout)
            .await
            .and_then(|data| {
                let text = data
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| BackendError::Malformed("missing 'message.content'".to_string()))?;
                let completion = data.get("eval_count").and_then(Value::as_u64).unwrap_or(0);
                let prompt = data
                    .get("prompt_eval_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                Ok(GenerationResult::success(text, completion, prompt))
            });

        outcome.unwrap_or_else(|e| {
            error!(error = %e, "Chat completion failed");
            GenerationResult::failure(e.describe(Backend::Ollama, 1))
        })
    }

    /// Pull a model from the Ollama registry. Returns true on HTTP 200.
    pub async fn pull_model(&self, name: &str) -> bool {
        let payload = json!({ "name": name, "stream": false });
        info!(model = %name, "Pulling model");

        match self
            .http
            .post_json(PULL_PATH, &payload, self.http.settings.generation_timeout)
            .await
        {
            Ok(_) => {
                info!(model = %name, "Model pulled");
                true
            }
            Err(e) => {
                error!(model = %name, error = %e, "Failed to pull model");
                false
            }
        }
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new(BackendSettings::local(Backend::Ollama))
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    fn kind(&self) -> Backend {
        Backend::Ollama
    }

    async fn list_models(&self) -> Vec<String> {
        match self.http.get_json(TAGS_PATH, self.http.settings.list_timeout).await {
            Ok(data) => Self::model_names(&data),
            Err(e) => {
                error!(error = %e, "Failed to list models");
                Vec::new()
            }
        }
    }

    async fn test_connection(&self) -> bool {
        self.http.probe(TAGS_PATH).await == Some(200)
    }

    async fn generate_response(&self, request: &GenerationRequest) -> GenerationResult {
        let payload = Self::generate_payload(request, false, GENERATE_NUM_CTX);
        let payload = &payload;
        let policy = &self.http.settings.retry;
        let timeout: Duration = self.http.settings.generation_timeout;

        let outcome = with_retry(policy, |attempt| {
            async move {
                info!(
                    model = %request.model(),
                    attempt,
                    max_attempts = policy.attempts(),
                    prompt_chars = request.prompt().len(),
                    "Generating response with Ollama"
                );
                let data = self.http.post_json(GENERATE_PATH, payload, timeout).await?;
                Self::parse_generate(&data)
            }
        })
        .await;

        match outcome {
            Ok(result) => {
                info!(chars = result.response_text.len(), "Response generated");
                result
            }
            Err(exhausted) => GenerationResult::failure(
                exhausted
                    .last_error
                    .describe(Backend::Ollama, exhausted.attempts),
            ),
        }
    }

    async fn stream_response(&self, request: &GenerationRequest) -> BoxStream<'static, String> {
        let payload = Self::generate_payload(request, true, CHAT_NUM_CTX);

        match self.http.post_stream(GENERATE_PATH, &payload).await {
            Ok(response) => fragments(
                response,
                self.http.settings.generation_timeout,
                Self::decode_line,
            ),
            Err(BackendError::Status { status, body }) => {
                error_stream(format!("HTTP {status} - {body}"))
            }
            Err(e) => error_stream(e),
        }
    }

    async fn health(&self) -> BackendHealth {
        self.http.health(TAGS_PATH, Self::model_names).await
    }
}
