//! Tool Catalog & Invocation
//!
//! The catalog is a fixed, ordered list of retrieval tools advertised to the
//! model. It is pure data; execution lives behind the `ToolInvoker` trait so
//! the conversation loop never talks to the documentation backend directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Tool descriptor shown to the model (name, description, JSON schema)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// JSON Schema for the tool's arguments
    pub input_schema: serde_json::Value,
}

/// The fixed retrieval-tool catalog.
///
/// Must be identical across all call sites that construct a model request;
/// providers validate structural mismatches.
pub fn catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "list_repositories".into(),
            description: "List all available repositories in the organization with their documentation counts.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolDescriptor {
            name: "search_documentation".into(),
            description: "Search across all documentation. Returns matching documents with snippets.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query string"
                    },
                    "repo": {
                        "type": "string",
                        "description": "Optional: Limit search to specific repository"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDescriptor {
            name: "get_documentation".into(),
            description: "Retrieve the full content of a specific documentation file.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "repo": {
                        "type": "string",
                        "description": "Repository name"
                    },
                    "path": {
                        "type": "string",
                        "description": "File path within the repository"
                    }
                },
                "required": ["repo", "path"]
            }),
        },
        ToolDescriptor {
            name: "list_repo_docs".into(),
            description: "List all documentation files in a specific repository.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "repo": {
                        "type": "string",
                        "description": "Repository name"
                    }
                },
                "required": ["repo"]
            }),
        },
    ]
}

/// A fully-formed tool-call request finalized by the delta accumulator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque call identifier assigned by the provider
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Decoded JSON arguments (empty object when parsing failed)
    pub arguments: serde_json::Value,
}

/// Result of one tool invocation.
///
/// Failures are carried in `payload` as `{"error": "..."}` so the loop can
/// always report the result back to the model instead of aborting the turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Call identifier this outcome answers
    pub tool_call_id: String,

    /// Tool that was called
    pub name: String,

    /// Raw result, or an error marker
    pub payload: serde_json::Value,

    /// Wall-clock execution time in milliseconds
    pub duration_ms: u64,
}

impl ToolOutcome {
    /// Wrap a failure message as an error-marker outcome
    pub fn error(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            payload: json!({"error": message.into()}),
            duration_ms,
        }
    }

    /// Whether the payload is an error marker
    pub fn is_error(&self) -> bool {
        self.payload.get("error").is_some_and(|v| v.is_string())
    }
}

/// Strategy trait mapping model-issued tool calls onto the external backend.
///
/// Never errors past this boundary: at most one logical invocation per
/// request, any failure absorbed into the outcome payload. Stateless and
/// safe to call concurrently for independent tool calls.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Execute a finalized tool-call request
    async fn invoke(&self, request: &ToolCallRequest) -> ToolOutcome;
}
