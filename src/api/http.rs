// src/api/http.rs
// Message-ingestion boundary: chat, usage and health endpoints

use axum::{
    extract::State,
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use crate::orchestrator::UsageSnapshot;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub platform: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub provider: Option<String>,
    pub fallback: bool,
    pub elapsed_ms: u64,
    pub session_id: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = match state.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => CorsLayer::permissive(),
    };

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/usage", get(usage_handler))
        .route("/api/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// One inbound message in, one reply out. Provider trouble never surfaces
/// here: the worst case is the canned fallback body, still HTTP 200.
async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    // The session identity doubles as the rate-limit caller key; mint one for
    // first-contact visitors so the widget can keep it for the conversation.
    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let deadline = Instant::now() + state.request_deadline;
    let result = state
        .orchestrator
        .handle_with_deadline(message, &session_id, Some(deadline))
        .await;

    info!(
        platform = request.platform.as_deref().unwrap_or("web"),
        provider = result.provider.as_deref().unwrap_or("fallback"),
        fallback = result.is_fallback,
        elapsed_ms = result.elapsed_ms,
        "chat handled"
    );

    Ok(Json(ChatResponse {
        response: result.response,
        provider: result.provider,
        fallback: result.is_fallback,
        elapsed_ms: result.elapsed_ms,
        session_id,
    }))
}

async fn usage_handler(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, UsageSnapshot>> {
    Json(state.orchestrator.usage_snapshot())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = if state.orchestrator.has_providers() {
        "ok"
    } else {
        "fallback-only"
    };
    Json(json!({
        "status": status,
        "providers": state.orchestrator.provider_health(),
    }))
}
