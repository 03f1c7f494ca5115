// Scout Engine — HTTP routes. Grounded on `api/v1/chat.py` (route names,
// nesting under `/api/v1/chat`, response envelopes) and `main.py` (root /
// health endpoints, permissive CORS, generic 500 fallback).

use crate::atoms::error::EngineError;
use crate::atoms::types::{ChatHistory, ChatResponse, TurnRequest};
use crate::engine::events::CollectingSink;
use crate::engine::SessionRegistry;
use crate::http::sse;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

pub fn router(state: AppState) -> Router {
    let chat_routes = Router::new()
        .route("/stream", post(chat_stream))
        .route("/message", post(send_message))
        .route("/history", get(get_history))
        .route("/session/:session_id", get(get_session).delete(delete_session))
        .route("/session/:session_id/clear", post(clear_session))
        .route("/session/:session_id/stop", post(stop_session));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1/chat", chat_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Scout Engine API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "scout-engine" }))
}

async fn chat_stream(State(state): State<AppState>, Json(req): Json<TurnRequest>) -> Response {
    sse::turn_stream_response(state.registry, req)
}

async fn send_message(State(state): State<AppState>, Json(req): Json<TurnRequest>) -> Result<Json<ChatResponse>, ApiError> {
    let sink = CollectingSink::new();
    let response = state.registry.submit_turn(req, &sink).await.map_err(ApiError::internal)?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn get_history(State(state): State<AppState>, Query(query): Query<HistoryQuery>) -> Json<Value> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let mut sessions = state.registry.list_history().await;
    sessions.truncate(limit);
    Json(json!({ "sessions": sessions }))
}

async fn get_session(State(state): State<AppState>, Path(session_id): Path<String>) -> Result<Json<ChatHistory>, ApiError> {
    match state.registry.get_session(&session_id).map_err(ApiError::internal)? {
        Some(history) => Ok(Json(history)),
        None => Err(ApiError::not_found("Session not found")),
    }
}

async fn delete_session(State(state): State<AppState>, Path(session_id): Path<String>) -> Result<Json<Value>, ApiError> {
    if state.registry.delete_session(&session_id) {
        Ok(Json(json!({ "message": "Session deleted successfully" })))
    } else {
        Err(ApiError::not_found("Session not found"))
    }
}

async fn clear_session(State(state): State<AppState>, Path(session_id): Path<String>) -> Result<Json<Value>, ApiError> {
    match state.registry.clear_session(&session_id).await.map_err(ApiError::internal)? {
        true => Ok(Json(json!({ "message": "Conversation cleared successfully" }))),
        false => Err(ApiError::not_found("Session not found")),
    }
}

/// Always succeeds, matching `chat_service.cancel_session` (spec §6: stop
/// sets the cancel flag; a stop against an unknown/already-finished
/// session is not an error worth surfacing to the caller).
async fn stop_session(State(state): State<AppState>, Path(session_id): Path<String>) -> Json<Value> {
    state.registry.stop_session(&session_id);
    Json(json!({ "message": "Cancellation requested", "session_id": session_id }))
}

/// Maps an internal failure to the same generic-500 shape `main.py`'s
/// global exception handler returns, or a 404 for not-found.
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn internal(e: EngineError) -> Self {
        log::error!("request failed: {e}");
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, detail: "Internal server error".into() }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, detail: detail.into() }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
