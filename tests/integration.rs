// End-to-end scenario tests driving `SessionRegistry::submit_turn` against
// a mocked OpenRouter endpoint. `wiremock` is the pack's HTTP-mocking
// crate of choice (`hi-youichi-loom`'s Cargo.toml); no real network calls
// are made.

use scout_engine::atoms::types::{Mode, TurnRequest};
use scout_engine::engine::events::CollectingSink;
use scout_engine::engine::mcp::McpRegistry;
use scout_engine::engine::providers::exa::ExaProvider;
use scout_engine::engine::providers::OpenRouterProvider;
use scout_engine::engine::{EngineConfig, EngineShared, SessionRegistry};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(tag: &str) -> EngineConfig {
    EngineConfig {
        data_base_dir: std::env::temp_dir().join(format!("scout-engine-it-{tag}-{}", uuid::Uuid::new_v4())),
        openrouter_api_key: "test-key".into(),
        exa_api_key: "test-key".into(),
        e2b_api_key: None,
        environment: "development".into(),
        log_level: "info".into(),
        max_iterations: 5,
        default_model: "openai/gpt-5-codex".into(),
        http_port: 0,
    }
}

async fn shared_with_mock(tag: &str, mock: &MockServer) -> Arc<EngineShared> {
    Arc::new(EngineShared {
        config: test_config(tag),
        openrouter: OpenRouterProvider::with_base_url("test-key", mock.uri()),
        exa: ExaProvider::with_base_url("test-key", mock.uri()),
        mcp: Arc::new(McpRegistry::new()),
    })
}

/// A Chat-mode turn with no tool calls completes in a single OpenRouter
/// round trip and is persisted to `chat_history.json`.
#[tokio::test]
async fn chat_turn_without_tools_completes_and_persists() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Hello back" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 4 },
        })))
        .mount(&mock)
        .await;

    let shared = shared_with_mock("chat-turn", &mock).await;
    let config = shared.config.clone();
    let registry = SessionRegistry::new(shared);
    let sink = CollectingSink::new();

    let req = TurnRequest { message: "hi there".into(), session_id: None, mode: Mode::Chat, temperature: None, max_iterations: Some(1) };
    let response = registry.submit_turn(req, &sink).await.expect("turn succeeds");

    assert_eq!(response.assistant_message, "Hello back");
    assert!(!response.used_tools);
    assert_eq!(response.prompt_tokens, Some(12));

    let history = registry.get_session(&response.session_id).unwrap().expect("history persisted");
    assert_eq!(history.responses.len(), 1);
    assert_eq!(history.responses[0].response_id, response.response_id);

    let _ = std::fs::remove_dir_all(&config.data_base_dir);
}

/// A second turn against the same session id reuses the live handle and
/// appends to the same chat history rather than overwriting it.
#[tokio::test]
async fn second_turn_appends_to_existing_session() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "reply" } }],
        })))
        .mount(&mock)
        .await;

    let shared = shared_with_mock("second-turn", &mock).await;
    let config = shared.config.clone();
    let registry = SessionRegistry::new(shared);
    let sink = CollectingSink::new();

    let first = registry
        .submit_turn(TurnRequest { message: "one".into(), session_id: None, mode: Mode::Chat, temperature: None, max_iterations: Some(1) }, &sink)
        .await
        .unwrap();

    let second = registry
        .submit_turn(
            TurnRequest { message: "two".into(), session_id: Some(first.session_id.clone()), mode: Mode::Chat, temperature: None, max_iterations: Some(1) },
            &sink,
        )
        .await
        .unwrap();

    assert_eq!(first.session_id, second.session_id);
    let history = registry.get_session(&first.session_id).unwrap().unwrap();
    assert_eq!(history.responses.len(), 2);

    let _ = std::fs::remove_dir_all(&config.data_base_dir);
}

/// Deleting a session drops it from `list_history` even though the
/// transcript stays on disk.
#[tokio::test]
async fn delete_session_removes_it_from_live_history() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "ok" } }],
        })))
        .mount(&mock)
        .await;

    let shared = shared_with_mock("delete-session", &mock).await;
    let config = shared.config.clone();
    let registry = SessionRegistry::new(shared);
    let sink = CollectingSink::new();

    let response = registry
        .submit_turn(TurnRequest { message: "hi".into(), session_id: None, mode: Mode::Chat, temperature: None, max_iterations: Some(1) }, &sink)
        .await
        .unwrap();

    assert_eq!(registry.list_history().await.len(), 1);
    assert!(registry.delete_session(&response.session_id));
    assert!(registry.list_history().await.is_empty());
    // Transcript survives on disk even though the live record is gone.
    assert!(registry.get_session(&response.session_id).unwrap().is_some());

    let _ = std::fs::remove_dir_all(&config.data_base_dir);
}

/// Rehydration on a fresh `SessionRegistry` recovers a dormant summary from
/// a prior process' `chat_history.json` without instantiating the session.
#[tokio::test]
async fn rehydrates_dormant_session_from_disk_across_registries() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "ok" } }],
        })))
        .mount(&mock)
        .await;

    let config = test_config("rehydrate");
    let shared = Arc::new(EngineShared {
        config: config.clone(),
        openrouter: OpenRouterProvider::with_base_url("test-key", mock.uri()),
        exa: ExaProvider::with_base_url("test-key", mock.uri()),
        mcp: Arc::new(McpRegistry::new()),
    });
    let sink = CollectingSink::new();
    let registry = SessionRegistry::new(shared);
    let response = registry
        .submit_turn(TurnRequest { message: "hi".into(), session_id: None, mode: Mode::Chat, temperature: None, max_iterations: Some(1) }, &sink)
        .await
        .unwrap();
    drop(registry);

    let shared2 = Arc::new(EngineShared {
        config: config.clone(),
        openrouter: OpenRouterProvider::with_base_url("test-key", mock.uri()),
        exa: ExaProvider::with_base_url("test-key", mock.uri()),
        mcp: Arc::new(McpRegistry::new()),
    });
    let registry2 = SessionRegistry::new(shared2);
    let summaries = registry2.list_history().await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].session_id, response.session_id);

    let _ = std::fs::remove_dir_all(&config.data_base_dir);
}
