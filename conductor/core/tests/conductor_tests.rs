//! Integration tests for the Conductor
//!
//! These tests drive the Conductor end to end against a temp-file store.
//! Tests cover:
//! - One store write per model with the exact response text
//! - Backend failures recorded as error text, never as `Err`
//! - Concurrent comparison keeping input order
//! - Streaming and recording a streamed reply
//! - A real HTTP round trip through the Ollama client

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cyberdesk_core::{
    Backend, BackendHealth, BackendSelection, ChatContext, Conductor, ConductorError,
    ConversationStore, GenerationRequest, GenerationResult, InferenceBackend, RetryPolicy,
    Speaker,
};

// =============================================================================
// Mock backend
// =============================================================================

/// Answers `reply from <model>`; the model named `broken` always fails.
struct ScriptedBackend {
    calls: AtomicUsize,
    models: Vec<String>,
}

impl ScriptedBackend {
    fn new(models: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            models: models.iter().map(|m| m.to_string()).collect(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn kind(&self) -> Backend {
        Backend::Ollama
    }

    async fn list_models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn test_connection(&self) -> bool {
        true
    }

    async fn generate_response(&self, request: &GenerationRequest) -> GenerationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Later models answer first, so ordering must come from the input
        let delay = 30u64.saturating_sub(10 * self.calls() as u64);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if request.model() == "broken" {
            GenerationResult::failure("Connection error after 3 attempts. Please check if Ollama is running.")
        } else {
            GenerationResult::success(format!("reply from {}", request.model()), 4, 2)
        }
    }

    async fn stream_response(&self, request: &GenerationRequest) -> BoxStream<'static, String> {
        let model = request.model().to_string();
        stream::iter(vec!["reply ".to_string(), "from ".to_string(), model]).boxed()
    }

    async fn health(&self) -> BackendHealth {
        BackendHealth {
            healthy: true,
            models: self.models.clone(),
            error: None,
            response_time: Some(Duration::from_millis(1)),
        }
    }
}

fn setup(models: &[&str]) -> (TempDir, Arc<ScriptedBackend>, Conductor, ChatContext) {
    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::open(dir.path().join("conversations.db")).unwrap();
    let backend = ScriptedBackend::new(models);
    let conductor = Conductor::new(backend.clone(), store);

    let mut ctx = ChatContext::new(BackendSelection::local(Backend::Ollama, "m1"));
    ctx.set_tab("Threat Intelligence");
    (dir, backend, conductor, ctx)
}

// =============================================================================
// Single model
// =============================================================================

#[tokio::test]
async fn test_submit_records_exactly_one_exchange() {
    let (_dir, backend, conductor, mut ctx) = setup(&["m1"]);

    let result = conductor.submit(&mut ctx, "profile APT29").await.unwrap();
    assert_eq!(result.response_text, "reply from m1");
    assert_eq!(result.total_tokens, 6);
    assert_eq!(backend.calls(), 1);

    let history = conductor.store().get_history("Threat Intelligence", 10).unwrap();
    assert_eq!(history.len(), 1);
    let record = &history[0];
    assert_eq!(record.user_message, "profile APT29");
    assert_eq!(record.assistant_response, result.response_text);
    assert_eq!(record.model.as_deref(), Some("m1"));
    assert_eq!(record.max_tokens, Some(2000));
    assert_eq!(record.session_id.as_deref(), Some(ctx.session_id().as_str()));
    assert!(record
        .system_prompt
        .as_deref()
        .unwrap_or_default()
        .starts_with("You are a threat intelligence analyst"));

    let transcript = ctx.transcript("Threat Intelligence");
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Speaker::User);
    assert_eq!(transcript[1].content, "reply from m1");
}

#[tokio::test]
async fn test_tab_alias_files_under_canonical_name() {
    let (_dir, _backend, conductor, mut ctx) = setup(&["m1"]);
    ctx.set_tab("yara_patterns");
    assert_eq!(ctx.current_tab(), "YARA Patterns");

    conductor.submit(&mut ctx, "rule for a dropper").await.unwrap();
    ctx.set_tab("yara patterns");
    conductor.submit(&mut ctx, "rule for a loader").await.unwrap();

    let store = conductor.store();
    assert_eq!(store.get_history("YARA Patterns", 10).unwrap().len(), 2);
    assert!(store.get_history("yara_patterns", 10).unwrap().is_empty());
    assert_eq!(ctx.transcript("YARA Patterns").len(), 4);
}

#[tokio::test]
async fn test_failed_generation_is_still_recorded() {
    let (_dir, _backend, conductor, mut ctx) = setup(&["broken"]);
    ctx.selection.model = "broken".to_string();

    let result = conductor.submit(&mut ctx, "anything").await.unwrap();
    assert!(result.is_error());
    assert_eq!(result.total_tokens, 0);

    let history = conductor.store().get_history("Threat Intelligence", 10).unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].assistant_response.starts_with("Error: "));
}

#[tokio::test]
async fn test_submit_without_model_is_rejected() {
    let (_dir, backend, conductor, mut ctx) = setup(&[]);
    ctx.selection.model.clear();

    let err = conductor.submit(&mut ctx, "hello").await.unwrap_err();
    assert!(matches!(err, ConductorError::NoModelSelected));
    assert_eq!(backend.calls(), 0);
    assert_eq!(conductor.store().status().unwrap().total_conversations, 0);
}

#[tokio::test]
async fn test_refresh_models_picks_first_when_unset() {
    let (_dir, _backend, conductor, mut ctx) = setup(&["alpha", "beta"]);
    ctx.selection.model.clear();

    let models = conductor.refresh_models(&mut ctx).await;
    assert_eq!(models, vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(ctx.selection.model, "alpha");

    // an explicit choice is kept
    ctx.selection.model = "beta".to_string();
    conductor.refresh_models(&mut ctx).await;
    assert_eq!(ctx.selection.model, "beta");

    assert!(conductor.check_backend().await.healthy);
}

// =============================================================================
// Comparison
// =============================================================================

#[tokio::test]
async fn test_compare_writes_once_per_model_in_input_order() {
    let (_dir, backend, conductor, mut ctx) = setup(&["a", "b", "c"]);
    let models = vec!["a".to_string(), "b".to_string(), "c".to_string()];

    let replies = conductor.compare(&mut ctx, "rank these", &models).await.unwrap();
    assert_eq!(backend.calls(), 3);

    let order: Vec<&str> = replies.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);

    let mut stored = conductor.store().get_history("Threat Intelligence", 10).unwrap();
    assert_eq!(stored.len(), 3);
    stored.sort_by_key(|r| r.id);
    for (record, reply) in stored.iter().zip(&replies) {
        assert_eq!(record.model.as_deref(), Some(reply.model.as_str()));
        assert_eq!(record.assistant_response, reply.result.response_text);
    }

    let transcript = ctx.transcript("Threat Intelligence");
    assert_eq!(transcript.len(), 2);
    assert_eq!(
        transcript[1].content,
        "a:\nreply from a\n\nb:\nreply from b\n\nc:\nreply from c"
    );
}

#[tokio::test]
async fn test_compare_limits() {
    let (_dir, backend, conductor, mut ctx) = setup(&[]);

    let none: Vec<String> = vec![" ".to_string()];
    assert!(matches!(
        conductor.compare(&mut ctx, "q", &none).await,
        Err(ConductorError::NoModels)
    ));

    let four: Vec<String> = ["a", "b", "c", "d"].iter().map(|m| m.to_string()).collect();
    assert!(matches!(
        conductor.compare(&mut ctx, "q", &four).await,
        Err(ConductorError::TooManyModels(4))
    ));
    assert_eq!(backend.calls(), 0);

    // duplicates collapse, so this is a two-model comparison
    let dupes: Vec<String> = ["a", "a", "b", "b"].iter().map(|m| m.to_string()).collect();
    let replies = conductor.compare(&mut ctx, "q", &dupes).await.unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(backend.calls(), 2);
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_stream_then_record() {
    let (_dir, _backend, conductor, mut ctx) = setup(&["m1"]);

    let fragments: Vec<String> = conductor
        .stream(&ctx, "go")
        .await
        .unwrap()
        .collect()
        .await;
    let text = fragments.concat();
    assert_eq!(text, "reply from m1");
    assert_eq!(conductor.store().status().unwrap().total_conversations, 0);

    let id = conductor.record(&mut ctx, "go", &text).await.unwrap();
    let record = &conductor.store().recent(1).unwrap()[0];
    assert_eq!(record.id, id);
    assert_eq!(record.assistant_response, "reply from m1");
    assert_eq!(ctx.transcript("Threat Intelligence").len(), 2);
}

// =============================================================================
// HTTP round trip
// =============================================================================

#[tokio::test]
async fn test_ollama_round_trip_through_conductor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "hi",
            "eval_count": 2,
            "prompt_eval_count": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let address = server.address();
    let selection = BackendSelection {
        backend: Backend::Ollama,
        host: address.ip().to_string(),
        port: address.port(),
        model: "m1".to_string(),
    };

    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::open(dir.path().join("c.db")).unwrap();
    let conductor = Conductor::with_retry(&selection, RetryPolicy::immediate(3), store);
    let mut ctx = ChatContext::new(selection);

    let result = conductor.submit(&mut ctx, "hello").await.unwrap();
    assert_eq!(result, GenerationResult::success("hi", 2, 1));
    assert_eq!(result.total_tokens, 3);

    let stored = conductor.store().recent(10).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].assistant_response, "hi");
}
