//! OpenAI-compatible Backend
//!
//! Backend for LM Studio and any other server exposing the OpenAI chat
//! completions protocol:
//! - `/v1/models` - List available models
//! - `/v1/chat/completions` - Chat completions (batch or server-sent events)

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

const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const MODELS_PATH: &str = "/v1/models";

/// Client for an OpenAI-compatible server (LM Studio by default)
#[derive(Clone, Debug)]
pub struct OpenAiCompatBackend {
    http: HttpCore,
}

impl OpenAiCompatBackend {
    /// Create a new backend
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            http: HttpCore::new(settings),
        }
    }

    /// Settings this backend was created with
    pub fn settings(&self) -> &BackendSettings {
        &self.http.settings
    }

    /// Optional system message followed by the user message
    pub(crate) fn messages(request: &GenerationRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(request.prompt()));
        messages
    }

    /// Payload for `/v1/chat/completions`
    pub(crate) fn completion_payload(request: &GenerationRequest, stream: bool) -> Value {
        json!({
            "model": request.model(),
            "messages": Self::messages(request),
            "stream": stream,
            "temperature": request.temperature(),
            "max_tokens": request.max_tokens(),
            "top_p": 0.9,
            "top_k": 40,
            "repeat_penalty": 1.1,
        })
    }

    /// Extract text and usage from a chat completion body
    pub(crate) fn parse_completion(data: &Value) -> Result<GenerationResult, BackendError> {
        let text = data
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BackendError::Malformed("missing 'choices[0].message.content'".to_string())
            })?;

        let usage = data.get("usage");
        let count = |field: &str| {
            usage
                .and_then(|u| u.get(field))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };
        let prompt = count("prompt_tokens");
        let completion = count("completion_tokens");
        let total = usage
            .and_then(|u| u.get("total_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or_else(|| prompt.saturating_add(completion));

        Ok(GenerationResult {
            total_tokens: total,
            ..GenerationResult::success(text, completion, prompt)
        })
    }

    /// Model ids from a `/v1/models` body
    pub(crate) fn model_ids(data: &Value) -> Vec<String> {
        data.get("data")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str).map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Decode one server-sent event line
    pub(crate) fn decode_line(line: &str) -> LineEvent {
        let Some(data) = line.strip_prefix("data:") else {
            return LineEvent::Skip;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return LineEvent::Done(None);
        }
        let Ok(event) = serde_json::from_str::<Value>(data) else {
            return LineEvent::Skip;
        };

        let choice = event.get("choices").and_then(|c| c.get(0));
        let token = choice
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
            .map(String::from);
        let finished = choice
            .and_then(|c| c.get("finish_reason"))
            .is_some_and(|reason| !reason.is_null());

        if finished {
            LineEvent::Done(token)
        } else {
            token.map_or(LineEvent::Skip, LineEvent::Fragment)
        }
    }
}

impl Default for OpenAiCompatBackend {
    fn default() -> Self {
        Self::new(BackendSettings::local(Backend::LmStudio))
    }
}

#[async_trait]
impl InferenceBackend for OpenAiCompatBackend {
    fn kind(&self) -> Backend {
        Backend::LmStudio
    }

    async fn list_models(&self) -> Vec<String> {
        match self.http.get_json(MODELS_PATH, self.http.settings.list_timeout).await {
            Ok(data) => Self::model_ids(&data),
            Err(e) => {
                error!(error = %e, "Failed to list LM Studio models");
                Vec::new()
            }
        }
    }

    async fn test_connection(&self) -> bool {
        self.http.probe(MODELS_PATH).await == Some(200)
    }

    async fn generate_response(&self, request: &GenerationRequest) -> GenerationResult {
        let payload = Self::completion_payload(request, false);
        let payload = &payload;
        let policy = &self.http.settings.retry;
        let timeout: Duration = self.http.settings.generation_timeout;

        let outcome = with_retry(policy, |attempt| async move {
            info!(
                model = %request.model(),
                attempt,
                max_attempts = policy.attempts(),
                prompt_chars = request.prompt().len(),
                "Generating response with LM Studio"
            );
            let data = self.http.post_json(COMPLETIONS_PATH, payload, timeout).await?;
            Self::parse_completion(&data)
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
                    .describe(Backend::LmStudio, exhausted.attempts),
            ),
        }
    }

    async fn stream_response(&self, request: &GenerationRequest) -> BoxStream<'static, String> {
        let payload = Self::completion_payload(request, true);

        match self.http.post_stream(COMPLETIONS_PATH, &payload).await {
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
        self.http.health(MODELS_PATH, Self::model_ids).await
    }
}
