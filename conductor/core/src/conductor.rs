//! Conductor - The Orchestration Core
//!
//! The Conductor turns a user prompt into a backend request, runs it, and
//! records the exchange. It orchestrates:
//! - Prompt construction from the active tab's template
//! - Backend calls, including side-by-side comparison of up to three models
//! - Per-tab transcripts kept in an explicit [`ChatContext`]
//! - Persistence of every exchange to the [`ConversationStore`]
//!
//! # Design Philosophy
//!
//! The Conductor is surface-agnostic and holds no per-user state. Everything
//! that changes during a session lives in the [`ChatContext`] the caller passes
//! in, so one Conductor can serve several contexts.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{
    connect, Backend, BackendHealth, BackendSettings, GenerationRequest, GenerationResult,
    InferenceBackend, RetryPolicy,
};
use crate::config::AppConfig;
use crate::session::SessionId;
use crate::store::{ConversationStore, NewMessage, StoreError};
use crate::templates::PromptTemplate;

/// Most models a single comparison may fan out to
pub const MAX_COMPARE_MODELS: usize = 3;

/// Orchestration failure
#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    /// Persisting an exchange failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No model configured for a single-model call
    #[error("no model selected; run `models` to list what the backend offers")]
    NoModelSelected,

    /// Comparison requested with an empty model list
    #[error("select at least one model to compare")]
    NoModels,

    /// Comparison requested with too many models
    #[error("at most {max} models can be compared, got {0}", max = MAX_COMPARE_MODELS)]
    TooManyModels(usize),

    /// A blocking store task panicked or was cancelled
    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Backend and model chosen for a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSelection {
    /// Wire protocol
    pub backend: Backend,
    /// Hostname
    pub host: String,
    /// Port
    pub port: u16,
    /// Model identifier; empty until one is chosen
    pub model: String,
}

impl BackendSelection {
    /// Selection on localhost at the backend's default port
    pub fn local(backend: Backend, model: impl Into<String>) -> Self {
        Self {
            backend,
            host: "localhost".to_string(),
            port: backend.default_port(),
            model: model.into(),
        }
    }
}

/// Sampling parameters applied to every request in a context
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token budget
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// Who wrote a transcript entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The person typing
    User,
    /// The model
    Assistant,
}

/// One line of a tab's transcript
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Author
    pub role: Speaker,
    /// Text
    pub content: String,
}

/// Everything that changes over a session
#[derive(Clone, Debug)]
pub struct ChatContext {
    session_id: SessionId,
    current_tab: String,
    /// Backend and model in use
    pub selection: BackendSelection,
    /// Sampling parameters
    pub params: GenerationParams,
    system_override: Option<String>,
    transcripts: HashMap<String, Vec<TranscriptEntry>>,
}

impl ChatContext {
    /// Fresh context on the general tab with a new session id
    pub fn new(selection: BackendSelection) -> Self {
        Self {
            session_id: SessionId::generate(),
            current_tab: crate::templates::GENERAL.tab.to_string(),
            selection,
            params: GenerationParams::default(),
            system_override: None,
            transcripts: HashMap::new(),
        }
    }

    /// Context matching a loaded configuration
    pub fn from_config(config: &AppConfig) -> Self {
        let selection = BackendSelection {
            backend: config.backend.kind,
            host: config.backend.host.clone(),
            port: config.port(),
            model: config.backend.model.clone().unwrap_or_default(),
        };
        let mut ctx = Self::new(selection);
        ctx.params = GenerationParams {
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
        };
        ctx
    }

    /// Session id stamped on every record
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Active tab name
    pub fn current_tab(&self) -> &str {
        &self.current_tab
    }

    /// Switch tabs, keeping other tabs' transcripts. Template keys and any
    /// casing of a tab name resolve to the canonical tab name.
    pub fn set_tab(&mut self, tab: impl AsRef<str>) {
        self.current_tab = PromptTemplate::canonical_tab(tab.as_ref());
    }

    /// Replace the tab template's system prompt, e.g. with
    /// [`crate::templates::custom_prompt`]
    pub fn set_system_override(&mut self, system: Option<String>) {
        self.system_override = system;
    }

    /// System prompt for the active tab
    pub fn system_prompt(&self) -> String {
        match &self.system_override {
            Some(system) => system.clone(),
            None => PromptTemplate::for_tab(&self.current_tab).system_prompt(),
        }
    }

    /// Transcript for a tab, oldest first
    pub fn transcript(&self, tab: &str) -> &[TranscriptEntry] {
        self.transcripts.get(tab).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Forget a tab's transcript (the store is untouched)
    pub fn clear_transcript(&mut self, tab: &str) {
        self.transcripts.remove(tab);
    }

    fn push_exchange(&mut self, prompt: &str, reply: String) {
        let entries = self.transcripts.entry(self.current_tab.clone()).or_default();
        entries.push(TranscriptEntry {
            role: Speaker::User,
            content: prompt.to_string(),
        });
        entries.push(TranscriptEntry {
            role: Speaker::Assistant,
            content: reply,
        });
    }

    fn request(&self, prompt: &str, model: &str) -> GenerationRequest {
        GenerationRequest::new(prompt, model, self.selection.backend)
            .with_system(self.system_prompt())
            .with_temperature(self.params.temperature)
            .with_max_tokens(self.params.max_tokens)
    }

    fn message(&self, prompt: &str, response: &str, model: &str) -> NewMessage {
        NewMessage::new(self.current_tab.as_str(), prompt, response)
            .in_session(self.session_id.to_string())
            .with_system(Some(self.system_prompt()))
            .with_generation(model, self.params.temperature, self.params.max_tokens)
    }
}

/// One model's answer in a comparison
#[derive(Clone, Debug, PartialEq)]
pub struct ModelReply {
    /// Model identifier
    pub model: String,
    /// What it returned
    pub result: GenerationResult,
}

/// The Conductor - headless orchestration core
#[derive(Clone)]
pub struct Conductor {
    /// Inference backend
    backend: Arc<dyn InferenceBackend>,
    /// Where exchanges are recorded
    store: ConversationStore,
}

impl Conductor {
    /// Create a Conductor over an existing backend
    pub fn new(backend: Arc<dyn InferenceBackend>, store: ConversationStore) -> Self {
        Self { backend, store }
    }

    /// Create a Conductor talking to the selected server
    pub fn for_selection(
        selection: &BackendSelection,
        settings: BackendSettings,
        store: ConversationStore,
    ) -> Self {
        let settings = BackendSettings {
            host: selection.host.clone(),
            port: selection.port,
            ..settings
        };
        Self::new(connect(selection.backend, settings), store)
    }

    /// Create a Conductor with default timeouts and the given retry policy
    pub fn with_retry(
        selection: &BackendSelection,
        retry: RetryPolicy,
        store: ConversationStore,
    ) -> Self {
        let settings = BackendSettings::new(selection.host.clone(), selection.port).with_retry(retry);
        Self::for_selection(selection, settings, store)
    }

    /// The backend in use
    pub fn backend(&self) -> &Arc<dyn InferenceBackend> {
        &self.backend
    }

    /// The conversation store
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Send `prompt` on the active tab and record the exchange
    ///
    /// Backend failures come back as an error-text result and are recorded
    /// like any other reply. Only store failures return `Err`.
    pub async fn submit(
        &self,
        ctx: &mut ChatContext,
        prompt: &str,
    ) -> Result<GenerationResult, ConductorError> {
        let model = ctx.selection.model.clone();
        if model.is_empty() {
            return Err(ConductorError::NoModelSelected);
        }

        info!(tab = %ctx.current_tab, model = %model, "Submitting prompt");
        let result = self.backend.generate_response(&ctx.request(prompt, &model)).await;
        if result.is_error() {
            warn!(model = %model, "Generation failed: {}", result.response_text);
        }

        self.persist(ctx.message(prompt, &result.response_text, &model))
            .await?;
        ctx.push_exchange(prompt, result.response_text.clone());

        Ok(result)
    }

    /// Send `prompt` to several models at once and record each answer
    ///
    /// Duplicates are ignored. Replies keep the order of `models`.
    pub async fn compare(
        &self,
        ctx: &mut ChatContext,
        prompt: &str,
        models: &[String],
    ) -> Result<Vec<ModelReply>, ConductorError> {
        let mut distinct: Vec<&str> = Vec::with_capacity(models.len());
        for model in models.iter().map(|m| m.trim()).filter(|m| !m.is_empty()) {
            if !distinct.contains(&model) {
                distinct.push(model);
            }
        }
        if distinct.is_empty() {
            return Err(ConductorError::NoModels);
        }
        if distinct.len() > MAX_COMPARE_MODELS {
            return Err(ConductorError::TooManyModels(distinct.len()));
        }

        info!(tab = %ctx.current_tab, models = ?distinct, "Comparing models");
        let requests: Vec<GenerationRequest> =
            distinct.iter().map(|model| ctx.request(prompt, model)).collect();
        let results = join_all(
            requests
                .iter()
                .map(|request| self.backend.generate_response(request)),
        )
        .await;

        let mut replies = Vec::with_capacity(results.len());
        for (model, result) in distinct.into_iter().zip(results) {
            self.persist(ctx.message(prompt, &result.response_text, model))
                .await?;
            replies.push(ModelReply {
                model: model.to_string(),
                result,
            });
        }

        let combined = replies
            .iter()
            .map(|r| format!("{}:\n{}", r.model, r.result.response_text))
            .collect::<Vec<_>>()
            .join("\n\n");
        ctx.push_exchange(prompt, combined);

        Ok(replies)
    }

    /// Stream a reply for `prompt` on the active tab
    ///
    /// Nothing is recorded; pass the collected text to [`Self::record`].
    pub async fn stream(
        &self,
        ctx: &ChatContext,
        prompt: &str,
    ) -> Result<BoxStream<'static, String>, ConductorError> {
        let model = &ctx.selection.model;
        if model.is_empty() {
            return Err(ConductorError::NoModelSelected);
        }
        let request = ctx.request(prompt, model).with_stream(true);
        Ok(self.backend.stream_response(&request).await)
    }

    /// Record a streamed exchange
    pub async fn record(
        &self,
        ctx: &mut ChatContext,
        prompt: &str,
        response: &str,
    ) -> Result<i64, ConductorError> {
        let model = ctx.selection.model.clone();
        let id = self.persist(ctx.message(prompt, response, &model)).await?;
        ctx.push_exchange(prompt, response.to_string());
        Ok(id)
    }

    /// List models; picks the first one when the context has none
    pub async fn refresh_models(&self, ctx: &mut ChatContext) -> Vec<String> {
        let models = self.backend.list_models().await;
        if ctx.selection.model.is_empty() {
            if let Some(first) = models.first() {
                info!(model = %first, "Selected default model");
                ctx.selection.model = first.clone();
            }
        }
        models
    }

    /// Probe the backend
    pub async fn check_backend(&self) -> BackendHealth {
        self.backend.health().await
    }

    async fn persist(&self, message: NewMessage) -> Result<i64, ConductorError> {
        let store = self.store.clone();
        let id = tokio::task::spawn_blocking(move || store.save_message(&message)).await??;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_context_defaults() {
        let ctx = ChatContext::new(BackendSelection::local(Backend::LmStudio, "m1"));
        assert_eq!(ctx.current_tab(), "General Cybersecurity");
        assert_eq!(ctx.selection.port, 1234);
        assert_eq!(ctx.params, GenerationParams::default());
        assert!(ctx.session_id().as_str().starts_with("session_"));
        assert!(ctx.transcript("General Cybersecurity").is_empty());
    }

    #[test]
    fn test_request_uses_tab_template_and_params() {
        let mut ctx = ChatContext::new(BackendSelection::local(Backend::Ollama, "m1"));
        ctx.set_tab("YARA Patterns");
        ctx.params.temperature = 0.2;
        ctx.params.max_tokens = 128;

        let request = ctx.request("rule for emotet", "m2");
        assert_eq!(request.prompt(), "rule for emotet");
        assert_eq!(request.model(), "m2");
        assert_eq!(request.backend(), Backend::Ollama);
        assert_eq!(request.max_tokens(), 128);
        assert!((request.temperature() - 0.2).abs() < f32::EPSILON);
        assert_eq!(
            request.system_prompt(),
            Some(PromptTemplate::for_tab("YARA Patterns").system_prompt().as_str())
        );
        assert!(!request.stream());
    }

    #[test]
    fn test_system_override() {
        let mut ctx = ChatContext::new(BackendSelection::local(Backend::Ollama, "m1"));
        ctx.set_system_override(Some("You are terse.".to_string()));
        assert_eq!(ctx.system_prompt(), "You are terse.");
        ctx.set_system_override(None);
        assert!(ctx.system_prompt().starts_with("You are a senior cybersecurity expert"));
    }

    #[test]
    fn test_transcripts_are_per_tab() {
        let mut ctx = ChatContext::new(BackendSelection::local(Backend::Ollama, "m1"));
        ctx.set_tab("A");
        ctx.push_exchange("q1", "a1".to_string());
        ctx.set_tab("B");
        ctx.push_exchange("q2", "a2".to_string());

        assert_eq!(
            ctx.transcript("A"),
            &[
                TranscriptEntry {
                    role: Speaker::User,
                    content: "q1".to_string()
                },
                TranscriptEntry {
                    role: Speaker::Assistant,
                    content: "a1".to_string()
                },
            ]
        );
        ctx.clear_transcript("A");
        assert!(ctx.transcript("A").is_empty());
        assert_eq!(ctx.transcript("B").len(), 2);
    }

    #[test]
    fn test_from_config() {
        let mut config = AppConfig::default();
        config.backend.model = Some("m9".to_string());
        config.generation.max_tokens = 77;

        let ctx = ChatContext::from_config(&config);
        assert_eq!(ctx.selection, BackendSelection::local(Backend::Ollama, "m9"));
        assert_eq!(ctx.params.max_tokens, 77);
    }
}
