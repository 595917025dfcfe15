//! REST Handlers
//!
//! Health, repository browsing (proxied to the MCP backend), and the
//! conversation endpoints used by clients before opening a WebSocket.
//! Every repository proxy returns 503 the moment the MCP reachability
//! check fails; the backend is never probed lazily from a request path.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use vault_core::Message;

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub services: HealthServices,
}

#[derive(Serialize)]
pub struct HealthServices {
    pub mcp_server: ServiceStatus,
    pub claude_api: ServiceStatus,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct ConversationCreated {
    pub id: Uuid,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn service_unavailable() -> HandlerError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "MCP Server not available".into(),
            code: "MCP_UNAVAILABLE".into(),
        }),
    )
}

fn backend_error(e: impl std::fmt::Display) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
            code: "MCP_ERROR".into(),
        }),
    )
}

fn not_found(message: &str) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.into(),
            code: "NOT_FOUND".into(),
        }),
    )
}

/// Backend argument object with the organization scope applied
fn org_args(state: &AppState, extra: &[(&str, &str)]) -> Value {
    let mut args = serde_json::Map::new();
    if !state.organization.is_empty() {
        args.insert("org".into(), json!(state.organization));
    }
    for (key, value) in extra {
        args.insert((*key).into(), json!(value));
    }
    Value::Object(args)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mcp_ok = state.mcp.is_connected();
    let claude_ok = state.provider.health_check().await.unwrap_or(false);

    let status = match (mcp_ok, claude_ok) {
        (true, true) => "healthy",
        (false, true) => "degraded",
        _ => "unhealthy",
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        services: HealthServices {
            mcp_server: ServiceStatus {
                status: if mcp_ok { "connected" } else { "disconnected" },
                model: None,
            },
            claude_api: ServiceStatus {
                status: if claude_ok { "available" } else { "unavailable" },
                model: Some(state.provider.model().to_string()),
            },
        },
    })
}

/// List all repositories in the organization
pub async fn list_repositories(
    State(state): State<AppState>,
) -> Result<Json<Value>, HandlerError> {
    if !state.mcp.is_connected() {
        return Err(service_unavailable());
    }

    let result = state
        .mcp
        .call_tool("get_org_repos", &org_args(&state, &[]))
        .await
        .map_err(backend_error)?;

    Ok(Json(if result.is_array() { result } else { json!([]) }))
}

/// File tree for one repository
pub async fn repository_tree(
    State(state): State<AppState>,
    Path(repo): Path<String>,
) -> Result<Json<Value>, HandlerError> {
    if !state.mcp.is_connected() {
        return Err(service_unavailable());
    }

    let result = state
        .mcp
        .call_tool("get_repo_docs", &org_args(&state, &[("repo", &repo)]))
        .await
        .map_err(backend_error)?;

    Ok(Json(if result.is_array() { result } else { json!([]) }))
}

/// Content of a specific documentation file
pub async fn file_content(
    State(state): State<AppState>,
    Path((repo, path)): Path<(String, String)>,
) -> Result<Json<Value>, HandlerError> {
    if !state.mcp.is_connected() {
        return Err(service_unavailable());
    }

    let result = state
        .mcp
        .call_tool(
            "get_file_content",
            &org_args(&state, &[("repo", &repo), ("path", &path)]),
        )
        .await
        .map_err(backend_error)?;

    if result.is_null() {
        return Err(not_found("Document not found"));
    }
    Ok(Json(result))
}

/// Create a new conversation
pub async fn create_conversation(State(state): State<AppState>) -> Json<ConversationCreated> {
    let id = state.store.create();
    tracing::debug!(conversation = %id, "conversation created");
    Json(ConversationCreated { id })
}

/// Read-only history accessor
pub async fn conversation_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, HandlerError> {
    let Ok(id) = Uuid::parse_str(&id) else {
        return Err(not_found("Conversation not found"));
    };

    match state.store.messages(id).await {
        Some(messages) => Ok(Json(messages)),
        None => Err(not_found("Conversation not found")),
    }
}
