//! MCP Backend Client
//!
//! HTTP client for the external documentation service. The service exposes
//! a tool-execution endpoint and a health probe; everything behind those two
//! routes (search, indexing, caching) is opaque to this process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;

use vault_core::error::{Result, VaultError};

/// MCP client configuration
#[derive(Clone, Debug)]
pub struct McpConfig {
    /// Base URL of the MCP server
    pub base_url: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://mcp-server:3000".into(),
            timeout_secs: 30,
        }
    }
}

impl McpConfig {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("MCP_SERVER_URL").unwrap_or_else(|_| "http://mcp-server:3000".into());
        let timeout_secs = std::env::var("MCP_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(30);

        Self {
            base_url,
            timeout_secs,
        }
    }
}

/// Minimal MCP client over HTTP
pub struct McpClient {
    client: reqwest::Client,
    config: McpConfig,
    connected: AtomicBool,
}

impl McpClient {
    /// Create a new client; call `connect` before advertising tools as usable
    pub fn new(config: McpConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client");

        Self {
            client,
            config,
            connected: AtomicBool::new(false),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::new(McpConfig::from_env())
    }

    /// Probe the server's health endpoint and record reachability
    pub async fn connect(&self) {
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                self.connected.store(true, Ordering::SeqCst);
                tracing::info!("MCP Server: connected");
            }
            Ok(response) => {
                self.connected.store(false, Ordering::SeqCst);
                tracing::warn!(status = %response.status(), "MCP Server: health probe failed");
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                tracing::warn!(error = %e, "MCP Server connection failed");
            }
        }
    }

    /// Whether the last reachability probe succeeded.
    ///
    /// Gates whether the REST surface advertises tools as usable.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Execute a tool on the MCP server.
    ///
    /// The response envelope is `{"result": ...}`; a body without the
    /// envelope is returned as-is.
    pub async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Value> {
        let url = format!(
            "{}/tools/execute",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({"name": name, "arguments": arguments}))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VaultError::ToolExecution(format!("MCP tool '{}' timed out", name))
                } else {
                    VaultError::ToolExecution(format!("MCP tool '{}' error: {}", name, e))
                }
            })?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VaultError::ToolExecution(format!(
                "MCP tool '{}' failed: {}",
                name, body
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| VaultError::ToolExecution(format!("MCP tool '{}' error: {}", name, e)))?;

        Ok(match data.get("result") {
            Some(result) => result.clone(),
            None => data,
        })
    }
}
