//! Knowledge Vault HTTP Server
//!
//! Axum-based server exposing the documentation-assistant REST API and the
//! WebSocket chat endpoint.

mod config;
mod handlers;
mod state;
mod ws;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vault_core::{catalog, ChatProvider, ConversationStore, Orchestrator, OrchestratorConfig};
use vault_runtime::{ClaudeProvider, McpClient, McpToolInvoker};

use crate::config::ServerConfig;
use crate::handlers::{
    conversation_messages, create_conversation, file_content, health_check, list_repositories,
    repository_tree,
};
use crate::state::AppState;
use crate::ws::chat_socket_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env();

    // Initialize the model provider
    let provider = Arc::new(ClaudeProvider::from_env());
    match provider.health_check().await {
        Ok(true) => tracing::info!("✓ Claude API configured (model: {})", provider.model()),
        _ => {
            tracing::warn!("⚠ ANTHROPIC_API_KEY not set - chat turns will fail");
        }
    }

    // Initialize the MCP documentation backend client
    let mcp = Arc::new(McpClient::from_env());
    mcp.connect().await;
    if !mcp.is_connected() {
        tracing::warn!("⚠ MCP Server not reachable - repository endpoints disabled");
    }

    tracing::info!("Advertising {} tools:", catalog().len());
    for tool in catalog() {
        tracing::info!("  • {}", tool.name);
    }

    // Conversation loop engine
    let invoker = Arc::new(McpToolInvoker::new(mcp.clone(), config.organization.clone()));
    let orchestrator = Arc::new(Orchestrator::new(
        provider.clone(),
        invoker,
        OrchestratorConfig::default(),
    ));

    // Build application state
    let state = AppState {
        provider,
        mcp,
        store: Arc::new(ConversationStore::new()),
        orchestrator,
        organization: config.organization.clone(),
    };

    // CORS configuration
    let cors = if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Build router
    let app = Router::new()
        // Health & browsing
        .route("/health", get(health_check))
        .route("/api/repos", get(list_repositories))
        .route("/api/repos/{repo}/tree", get(repository_tree))
        .route("/api/repos/{repo}/files/{*path}", get(file_content))
        // Conversations
        .route("/api/conversations", post(create_conversation))
        .route("/api/conversations/{id}/messages", get(conversation_messages))
        // Chat
        .route("/ws/chat/{id}", get(chat_socket_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 knowledge-vault server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                            - Health check");
    tracing::info!("  GET  /api/repos                         - List repositories");
    tracing::info!("  GET  /api/repos/{{repo}}/tree             - Repository file tree");
    tracing::info!("  GET  /api/repos/{{repo}}/files/{{path}}    - File content");
    tracing::info!("  POST /api/conversations                 - Create conversation");
    tracing::info!("  GET  /api/conversations/{{id}}/messages   - Conversation history");
    tracing::info!("  GET  /ws/chat/{{id}}                      - WebSocket chat");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
