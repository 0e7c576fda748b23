//! Cyberdesk Core - Local LLM Assistant for Security Work
//!
//! This crate provides everything behind the `cyberdesk` command line: a
//! client for locally hosted inference servers, a SQLite conversation log, and
//! the orchestration that ties a prompt template, a model and the log
//! together. It has no UI dependencies and can drive a CLI, a TUI, or tests.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      Surface (CLI, tests)                     │
//! └───────────────────────────────┬───────────────────────────────┘
//!                                 │ ChatContext + prompt
//! ┌───────────────────────────────┼───────────────────────────────┐
//! │                        CYBERDESK CORE                         │
//! │  ┌────────────────────────────┴─────────────────────────────┐ │
//! │  │                        Conductor                         │ │
//! │  │  ┌─────────────┐  ┌──────────────────┐  ┌─────────────┐  │ │
//! │  │  │  Templates  │  │ InferenceBackend │  │    Store    │  │ │
//! │  │  │  (per tab)  │  │ Ollama/LM Studio │  │  (SQLite)   │  │ │
//! │  │  └─────────────┘  └──────────────────┘  └─────────────┘  │ │
//! │  └──────────────────────────────────────────────────────────┘ │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: Builds requests, calls the backend, records exchanges
//! - [`ChatContext`]: Per-session state (tab, model, parameters, transcripts)
//! - [`InferenceBackend`]: Trait implemented by each server protocol
//! - [`ConversationStore`]: Durable conversation log
//! - [`AppConfig`]: Layered configuration
//!
//! # Quick Start
//!
//! ```ignore
//! use cyberdesk_core::{AppConfig, ChatContext, Conductor, ConversationStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     let store = ConversationStore::open(config.database_path())?;
//!     let mut ctx = ChatContext::from_config(&config);
//!     let conductor = Conductor::for_selection(&ctx.selection, config.backend_settings(), store);
//!
//!     conductor.refresh_models(&mut ctx).await;
//!     ctx.set_tab("Alert Prioritization");
//!     let result = conductor.submit(&mut ctx, "Triage these alerts: ...").await?;
//!     println!("{}", result.response_text);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Inference server clients, retry policy
//! - [`store`]: SQLite conversation log, export, statistics
//! - [`templates`]: Prompt templates per use case
//! - [`conductor`]: Orchestration and per-session context
//! - [`config`]: TOML/environment/CLI configuration
//! - [`session`]: Session identifiers
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on clap, ratatui, or any other
//! surface framework. It never prints; it logs through `tracing`.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod conductor;
pub mod config;
pub mod session;
pub mod store;
pub mod templates;

// Re-exports for convenience
pub use backend::{
    connect, Backend, BackendError, BackendHealth, BackendSettings, ChatMessage,
    GenerationRequest, GenerationResult, InferenceBackend, OllamaBackend, OpenAiCompatBackend,
    RetryPolicy,
};
pub use conductor::{
    BackendSelection, ChatContext, Conductor, ConductorError, GenerationParams, ModelReply,
    Speaker, TranscriptEntry, MAX_COMPARE_MODELS,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides};
pub use session::SessionId;
pub use store::{
    ConversationRecord, ConversationStore, ExportFormat, NewMessage, SessionRecord, SessionStats,
    StoreError, StoreStatus, TabCount, DEFAULT_HISTORY_LIMIT,
};
pub use templates::{custom_prompt, PromptTemplate};
