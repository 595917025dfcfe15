//! Application State

use std::sync::Arc;

use vault_core::{ChatProvider, ConversationStore, Orchestrator};
use vault_runtime::McpClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Model provider (Claude)
    pub provider: Arc<dyn ChatProvider>,

    /// MCP documentation backend client
    pub mcp: Arc<McpClient>,

    /// In-memory conversation store (process lifetime)
    pub store: Arc<ConversationStore>,

    /// Conversation loop engine
    pub orchestrator: Arc<Orchestrator>,

    /// Organization scope for backend tool calls
    pub organization: String,
}
