//! LLM Backend Integration
//!
//! This module provides access to local inference servers through a common
//! trait interface.
//!
//! # Available Backends
//!
//! - **Ollama**: native `/api/*` endpoints (default)
//! - **LM Studio**: OpenAI-compatible `/v1/*` endpoints
//!
//! # Usage
//!
//! ```ignore
//! use cyberdesk_core::backend::{connect, Backend, BackendSettings, GenerationRequest};
//!
//! let backend = connect(Backend::Ollama, BackendSettings::local(Backend::Ollama));
//! let request = GenerationRequest::new("Hello!", "llama3", Backend::Ollama);
//! let result = backend.generate_response(&request).await;
//! ```

mod error;
mod http;
mod ollama;
mod openai_compat;
mod retry;
mod stream;
mod traits;

use std::sync::Arc;

pub use error::BackendError;
pub use ollama::OllamaBackend;
pub use openai_compat::OpenAiCompatBackend;
pub use retry::{with_retry, Classify, FailureClass, RetryExhausted, RetryPolicy};
pub use traits::{
    Backend, BackendHealth, BackendSettings, ChatMessage, GenerationRequest, GenerationResult,
    InferenceBackend, UnknownBackend,
};

/// Create the backend variant for `kind`
#[must_use]
pub fn connect(kind: Backend, settings: BackendSettings) -> Arc<dyn InferenceBackend> {
    match kind {
        Backend::Ollama => Arc::new(OllamaBackend::new(settings)),
        Backend::LmStudio => Arc::new(OpenAiCompatBackend::new(settings)),
    }
}
