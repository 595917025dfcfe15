//! # vault-runtime
//!
//! Concrete collaborators for the orchestration core.
//!
//! ## Components
//!
//! - **Claude**: streaming `ChatProvider` over the Anthropic Messages API
//! - **MCP**: HTTP client for the external documentation backend
//! - **Invoker**: maps catalog tools onto MCP backend tools
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vault_runtime::{ClaudeProvider, McpClient, McpToolInvoker};
//!
//! let provider = Arc::new(ClaudeProvider::from_env());
//! let mcp = Arc::new(McpClient::from_env());
//! let invoker = Arc::new(McpToolInvoker::new(mcp.clone(), "acme"));
//! ```

pub mod claude;
pub mod invoker;
pub mod mcp;

pub use claude::{ClaudeConfig, ClaudeProvider};
pub use invoker::McpToolInvoker;
pub use mcp::{McpClient, McpConfig};

// Re-export core types for convenience
pub use vault_core::{
    catalog, ChatProvider, Conversation, ConversationStore, Message, Orchestrator, Result, Role,
    ToolInvoker, VaultError,
};
