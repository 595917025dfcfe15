//! Error Types

use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Orchestration error types
#[derive(Error, Debug)]
pub enum VaultError {
    /// LLM provider error (malformed stream, bad status, network)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider or tool call exceeded its configured timeout
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// MCP documentation backend not reachable
    #[error("MCP Server not available")]
    McpUnavailable,

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Conversation not found in the store
    #[error("Conversation not found")]
    ConversationNotFound,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl VaultError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VaultError::ProviderUnavailable(_) | VaultError::Timeout(_) | VaultError::Io(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            VaultError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            VaultError::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            VaultError::Timeout(secs) => {
                format!("The request timed out after {} seconds.", secs)
            }
            VaultError::McpUnavailable => "MCP Server not available".into(),
            VaultError::ToolExecution(msg) => format!("Tool error: {}", msg),
            VaultError::ConversationNotFound => "Conversation not found".into(),
            VaultError::Config(msg) => format!("Configuration error: {}", msg),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for VaultError {
    fn from(err: anyhow::Error) -> Self {
        VaultError::Other(err.to_string())
    }
}
