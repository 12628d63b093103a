//! REST API server for the crypto chat backend
//!
//! Exposes chat, model management and conversation management endpoints.
//! Every response is a well-formed JSON object; dispatch failures arrive
//! as structured results, never as transport faults.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config;
use crate::dispatch::{ChatDispatcher, ChatResult};
use crate::error::AgentError;
use crate::tools::ToolInput;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<String>,
    pub memory_policy: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub model_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub mode: Option<String>,
}

/// =============================
/// Response Models
/// =============================

#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    pub success: bool,
    pub changed: bool,
    pub current_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<ChatDispatcher>,
}

/// =============================
/// Service Endpoints
/// =============================

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Crypto Intelligence API",
        "features": [
            "Runtime-swappable models",
            "Conversation memory",
            "Custom tools",
        ]
    }))
}

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let catalog = state.dispatcher.registry().catalog();
    Json(json!({
        "status": "healthy",
        "current_model": state.dispatcher.registry().current_name().await,
        "environment": config::environment_info(catalog),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn debug_environment(State(state): State<ApiState>) -> Json<config::EnvironmentInfo> {
    Json(config::environment_info(state.dispatcher.registry().catalog()))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResult> {
    info!(
        "Received chat request (conversation: {})",
        req.conversation_id.as_deref().unwrap_or("default")
    );

    let result = state
        .dispatcher
        .handle_chat(
            &req.message,
            req.conversation_id.as_deref(),
            req.memory_policy.as_deref(),
        )
        .await;

    Json(result)
}

/// =============================
/// Model Management
/// =============================

async fn switch_model(
    State(state): State<ApiState>,
    Json(req): Json<SwitchRequest>,
) -> (StatusCode, Json<SwitchResponse>) {
    let registry = state.dispatcher.registry();

    match registry.switch(&req.model_name).await {
        Ok(changed) => (
            StatusCode::OK,
            Json(SwitchResponse {
                success: true,
                changed,
                current_model: registry.current_name().await,
                error: None,
            }),
        ),
        Err(e) => {
            let status = match &e {
                AgentError::UnknownModel(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(SwitchResponse {
                    success: false,
                    changed: false,
                    current_model: registry.current_name().await,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

async fn current_model(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(json!({
        "current_model": state.dispatcher.registry().current_name().await,
    }))
}

/// =============================
/// Conversation Management
/// =============================

async fn list_conversations(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let ids = state.dispatcher.store().list_ids().await;
    Json(json!({
        "conversations": ids,
        "count": ids.len(),
    }))
}

async fn conversation_history(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.dispatcher.store().history(&id).await {
        Ok(snapshot) => {
            let count = snapshot.turns.len();
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "conversation": snapshot,
                    "count": count,
                })),
            )
        }
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": e.to_string(),
                "conversation_id": id,
            })),
        ),
    }
}

async fn delete_conversation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> (StatusCode, Json<serde_json::Value>) {
    let store = state.dispatcher.store();
    let mode = params.mode.as_deref().unwrap_or("delete");

    let (action, existed) = match mode {
        "clear" => ("cleared", store.clear(&id).await),
        "delete" => ("deleted", store.delete(&id).await),
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": format!("Unknown mode: {} (expected clear or delete)", other),
                    "conversation_id": id,
                })),
            )
        }
    };

    info!("Conversation '{}' {}", id, action);

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "action": action,
            "existed": existed,
            "conversation_id": id,
        })),
    )
}

/// =============================
/// Tools
/// =============================

async fn list_tools(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(json!({
        "tools": state.dispatcher.tools().catalog(),
    }))
}

async fn crypto_price(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(tool) = state.dispatcher.tools().get("crypto_price") else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": "crypto_price tool not registered",
            })),
        );
    };

    match tool
        .execute(&ToolInput::new(json!({ "symbol": symbol })))
        .await
    {
        Ok(output) => (StatusCode::OK, Json(output.data)),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": e.to_string(),
            })),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(dispatcher: Arc<ChatDispatcher>) -> Router {
    let state = ApiState { dispatcher };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/models/switch", post(switch_model))
        .route("/api/models/current", get(current_model))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/:id/history", get(conversation_history))
        .route("/api/conversations/:id", delete(delete_conversation))
        .route("/api/tools", get(list_tools))
        .route("/api/crypto/:symbol", get(crypto_price))
        .route("/api/debug/environment", get(debug_environment))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    dispatcher: Arc<ChatDispatcher>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(dispatcher);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
