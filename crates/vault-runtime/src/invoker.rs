//! MCP Tool Invoker
//!
//! Maps model-issued tool calls onto the MCP backend's own tool identifiers
//! and argument shape, and absorbs every failure into an error-marker
//! outcome so the conversation loop can always report a result back to the
//! model.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};

use vault_core::tool::{ToolCallRequest, ToolInvoker, ToolOutcome};

use crate::mcp::McpClient;

/// Model-facing tool name → backend tool identifier.
///
/// The backend operates on raw GitHub terms and expects the organization in
/// every call; the catalog exposes simplified names with the organization
/// pre-bound.
const TOOL_MAPPINGS: &[(&str, &str)] = &[
    ("list_repositories", "get_org_repos"),
    ("search_documentation", "search_documentation"),
    ("get_documentation", "get_file_content"),
    ("list_repo_docs", "get_repo_docs"),
];

fn backend_name(name: &str) -> Option<&'static str> {
    TOOL_MAPPINGS
        .iter()
        .find(|(model_facing, _)| *model_facing == name)
        .map(|(_, backend)| *backend)
}

/// Tool invoker backed by the MCP documentation service
pub struct McpToolInvoker {
    mcp: Arc<McpClient>,
    organization: String,
}

impl McpToolInvoker {
    pub fn new(mcp: Arc<McpClient>, organization: impl Into<String>) -> Self {
        Self {
            mcp,
            organization: organization.into(),
        }
    }

    /// Translate arguments to the backend shape, injecting the organization
    fn backend_arguments(&self, arguments: &Value) -> Value {
        let mut args = match arguments {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        if !self.organization.is_empty() {
            args.entry("org".to_string())
                .or_insert_with(|| json!(self.organization));
        }
        Value::Object(args)
    }
}

#[async_trait]
impl ToolInvoker for McpToolInvoker {
    async fn invoke(&self, request: &ToolCallRequest) -> ToolOutcome {
        let started = Instant::now();

        let Some(backend) = backend_name(&request.name) else {
            return ToolOutcome::error(
                &request.id,
                &request.name,
                format!("Unknown tool: {}", request.name),
                elapsed_ms(started),
            );
        };

        let arguments = self.backend_arguments(&request.arguments);

        match self.mcp.call_tool(backend, &arguments).await {
            Ok(result) => {
                let duration_ms = elapsed_ms(started);
                tracing::debug!(tool = %request.name, duration_ms, "tool completed");
                ToolOutcome {
                    tool_call_id: request.id.clone(),
                    name: request.name.clone(),
                    payload: result,
                    duration_ms,
                }
            }
            Err(e) => {
                let duration_ms = elapsed_ms(started);
                tracing::warn!(tool = %request.name, error = %e, "tool failed");
                ToolOutcome::error(&request.id, &request.name, e.to_string(), duration_ms)
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
