//! LLM Backend Traits
//!
//! Trait definitions for inference backends. This abstraction allows the
//! Conductor to work with Ollama and OpenAI-compatible servers (LM Studio)
//! without branching on a provider string.
//!
//! # Design Philosophy
//!
//! The [`InferenceBackend`] trait provides a common interface for:
//! - Generating a complete response (with retries) or a fragment stream
//! - Liveness checks against the backend
//! - Querying available models
//!
//! Implementations handle the wire differences; every result is normalized
//! into a [`GenerationResult`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;

/// Which wire protocol a backend speaks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Ollama native API (`/api/*`)
    #[default]
    Ollama,
    /// LM Studio, or any OpenAI-compatible server (`/v1/*`)
    #[serde(alias = "lm-studio", alias = "lm_studio", alias = "openai")]
    LmStudio,
}

impl Backend {
    /// Port the backend listens on out of the box
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Self::Ollama => 11434,
            Self::LmStudio => 1234,
        }
    }

    /// Human-readable product name, used in error messages
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::LmStudio => "LM Studio",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Error returned when a backend name is not recognized
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend '{0}' (expected 'ollama' or 'lmstudio')")]
pub struct UnknownBackend(pub String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "lmstudio" | "lm-studio" | "lm_studio" | "lm studio" | "openai" => Ok(Self::LmStudio),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

/// A single generation request. Built once, then only read.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    system_prompt: Option<String>,
    model: String,
    backend: Backend,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

impl GenerationRequest {
    /// Create a new request with prompt, model and backend
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, backend: Backend) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            model: model.into(),
            backend,
            temperature: 0.7,
            max_tokens: 2000,
            stream: false,
        }
    }

    /// Set system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    /// Set temperature, clamped to 0.0-1.0
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = if temperature.is_nan() {
            0.7
        } else {
            temperature.clamp(0.0, 1.0)
        };
        self
    }

    /// Set max tokens (at least 1)
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    /// Set streaming mode
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// User prompt
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// System prompt, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Model identifier
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Target backend
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Sampling temperature
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Completion token budget
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Whether the caller asked for streaming
    pub fn stream(&self) -> bool {
        self.stream
    }
}

/// Normalized outcome of a generation call.
///
/// On failure `failed` is set, `response_text` carries a readable description
/// starting with `"Error: "` and all counts are zero. Only
/// [`GenerationResult::failure`] sets the flag; reply text that happens to start
/// with `"Error: "` is still a success.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated text, or the error description
    pub response_text: String,
    /// Prompt plus completion tokens
    pub total_tokens: u64,
    /// Tokens produced by the model
    pub completion_tokens: u64,
    /// Tokens consumed by the prompt
    pub prompt_tokens: u64,
    /// Set when no reply was obtained
    #[serde(default)]
    pub failed: bool,
}

impl GenerationResult {
    /// Successful result; total is derived from the two counts
    pub fn success(text: impl Into<String>, completion_tokens: u64, prompt_tokens: u64) -> Self {
        Self {
            response_text: text.into(),
            total_tokens: completion_tokens.saturating_add(prompt_tokens),
            completion_tokens,
            prompt_tokens,
            failed: false,
        }
    }

    /// Failed result with zeroed counts
    pub fn failure(message: impl fmt::Display) -> Self {
        Self {
            response_text: format!("Error: {message}"),
            failed: true,
            ..Self::default()
        }
    }

    /// Whether this result describes a failure
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.failed
    }
}

/// One message in a multi-turn chat
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

}

/// Snapshot of backend health
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackendHealth {
    /// True when the models endpoint answered 200
    pub healthy: bool,
    /// Models reported by the backend
    pub models: Vec<String>,
    /// Failure description when unhealthy
    pub error: Option<String>,
    /// Round-trip time of the probe (None if no response arrived)
    pub response_time: Option<Duration>,
}

/// Connection settings shared by both backend variants
#[derive(Clone, Debug)]
pub struct BackendSettings {
    /// Host name or address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Timeout for generation and pull requests. A stream is bounded per
    /// chunk instead, so it may run longer while data keeps arriving.
    pub generation_timeout: Duration,
    /// Timeout for liveness probes
    pub probe_timeout: Duration,
    /// Timeout for listing models
    pub list_timeout: Duration,
    /// Retry policy for generation
    pub retry: RetryPolicy,
}

impl BackendSettings {
    /// Settings for a host/port pair with default timeouts
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            generation_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(5),
            list_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }

    /// Default settings for a backend on localhost
    #[must_use]
    pub fn local(backend: Backend) -> Self {
        Self::new("localhost", backend.default_port())
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the generation timeout
    #[must_use]
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Base URL (`http://host:port`)
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Inference backend trait
///
/// Implement this trait to add support for a different server shape.
/// None of the operations return `Err`: failures are folded into the
/// returned value so callers always have something to show the user.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Which protocol this backend speaks
    fn kind(&self) -> Backend;

    /// Backend name (e.g., "Ollama", "LM Studio")
    fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// Available model identifiers; empty when unreachable
    async fn list_models(&self) -> Vec<String>;

    /// Lightweight liveness check; never fails, returns false instead
    async fn test_connection(&self) -> bool;

    /// Generate a complete response, retrying transient failures
    async fn generate_response(&self, request: &GenerationRequest) -> GenerationResult;

    /// Stream response fragments. Errors appear as one `"Error: ..."` fragment.
    async fn stream_response(&self, request: &GenerationRequest) -> BoxStream<'static, String>;

    /// Health snapshot from the models endpoint
    async fn health(&self) -> BackendHealth;

    /// Check if a specific model is available
    async fn has_model(&self, model: &str) -> bool {
        self.list_models().await.iter().any(|m| m == model)
    }
}
