//! Claude Streaming Provider
//!
//! Implementation of `ChatProvider` for the Anthropic Messages API. The SSE
//! stream is parsed line-by-line and mapped to the provider-agnostic event
//! vocabulary; block indices are translated to tool-call identifiers so
//! nothing Anthropic-shaped crosses the boundary.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use vault_core::error::{Result, VaultError};
use vault_core::message::{ContentBlock, Message, Role};
use vault_core::provider::{ChatProvider, ChatRequest, EventStream, StopReason, StreamEvent};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude provider configuration
#[derive(Clone, Debug)]
pub struct ClaudeConfig {
    /// API key; empty means unconfigured
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Maximum tokens to generate per turn
    pub max_tokens: u32,

    /// API base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 4096,
            base_url: "https://api.anthropic.com/v1".into(),
            timeout_secs: 120,
        }
    }
}

impl ClaudeConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        let model = std::env::var("CLAUDE_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".into());
        let max_tokens = std::env::var("CLAUDE_MAX_TOKENS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(4096);

        Self {
            api_key,
            model,
            max_tokens,
            ..Default::default()
        }
    }
}

/// Claude chat provider
pub struct ClaudeProvider {
    client: reqwest::Client,
    config: ClaudeConfig,
}

impl ClaudeProvider {
    pub fn new(config: ClaudeConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client");

        Self { client, config }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::new(ClaudeConfig::from_env())
    }

    /// Convert orchestration messages to the Messages API shape.
    ///
    /// Tool-role messages become user-role `tool_result` blocks, which is
    /// how the API expects results to be fed back.
    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::User | Role::Assistant => {
                    let role = if m.role == Role::User { "user" } else { "assistant" };
                    json!({
                        "role": role,
                        "content": m.content.iter().map(convert_block).collect::<Vec<_>>(),
                    })
                }
                Role::Tool => json!({
                    "role": "user",
                    "content": m.content.iter().map(convert_block).collect::<Vec<_>>(),
                }),
            })
            .collect()
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": request.system,
            "messages": Self::convert_messages(&request.messages),
            "tools": request.tools.iter().map(|t| json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })).collect::<Vec<_>>(),
            "stream": true,
        })
    }
}

fn convert_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::ToolUse { id, name, input } => json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        ContentBlock::ToolResult { tool_use_id, content } => {
            let text = match content {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": text,
            })
        }
    }
}

/// Extract the payload of an SSE `data:` line
fn parse_sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

fn map_stop_reason(reason: &str) -> Option<StopReason> {
    match reason {
        "end_turn" | "stop_sequence" => Some(StopReason::EndTurn),
        "tool_use" => Some(StopReason::ToolUse),
        "max_tokens" => Some(StopReason::MaxTokens),
        _ => None,
    }
}

#[async_trait]
impl ChatProvider for ClaudeProvider {
    async fn stream_chat(&self, request: ChatRequest) -> Result<EventStream> {
        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));
        let body = self.build_body(&request);

        tracing::debug!(model = %self.config.model, messages = request.messages.len(), "claude stream_chat");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VaultError::Timeout(self.config.timeout_secs)
                } else {
                    VaultError::ProviderUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                VaultError::ProviderUnavailable(format!("{}: {}", status, body_text))
            } else {
                VaultError::Provider(format!("{}: {}", status, body_text))
            });
        }

        let byte_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            // SSE events carry a block index; tool events downstream are
            // keyed by the provider-assigned call id.
            let mut tool_blocks: HashMap<u64, String> = HashMap::new();
            let mut sent_done = false;

            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(VaultError::Provider(e.to_string()));
                        break;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
                        continue;
                    }

                    let Some(data) = parse_sse_data(&line) else { continue };
                    let Ok(event) = serde_json::from_str::<Value>(data) else { continue };
                    let event_type = event.get("type").and_then(|t| t.as_str()).unwrap_or("");

                    match event_type {
                        "content_block_start" => {
                            let index = event.get("index").and_then(Value::as_u64);
                            let block = event.get("content_block");
                            let block_type = block
                                .and_then(|b| b.get("type"))
                                .and_then(|t| t.as_str())
                                .unwrap_or("");

                            if block_type == "tool_use" {
                                let id = block
                                    .and_then(|b| b.get("id"))
                                    .and_then(|v| v.as_str())
                                    .unwrap_or_default()
                                    .to_string();
                                let name = block
                                    .and_then(|b| b.get("name"))
                                    .and_then(|v| v.as_str())
                                    .unwrap_or_default()
                                    .to_string();
                                if let Some(index) = index {
                                    tool_blocks.insert(index, id.clone());
                                }
                                yield Ok(StreamEvent::ToolCallOpen { id, name });
                            }
                        }

                        "content_block_delta" => {
                            let index = event.get("index").and_then(Value::as_u64);
                            let delta = event.get("delta");
                            let delta_type = delta
                                .and_then(|d| d.get("type"))
                                .and_then(|t| t.as_str())
                                .unwrap_or("");

                            match delta_type {
                                "text_delta" => {
                                    if let Some(text) =
                                        delta.and_then(|d| d.get("text")).and_then(|t| t.as_str())
                                    {
                                        yield Ok(StreamEvent::TextFragment(text.to_string()));
                                    }
                                }
                                "input_json_delta" => {
                                    let fragment = delta
                                        .and_then(|d| d.get("partial_json"))
                                        .and_then(|t| t.as_str())
                                        .unwrap_or_default();
                                    if let Some(id) =
                                        index.and_then(|i| tool_blocks.get(&i)).cloned()
                                    {
                                        yield Ok(StreamEvent::ToolCallArgFragment {
                                            id,
                                            text: fragment.to_string(),
                                        });
                                    }
                                }
                                _ => {}
                            }
                        }

                        "content_block_stop" => {
                            let index = event.get("index").and_then(Value::as_u64);
                            if let Some(id) = index.and_then(|i| tool_blocks.remove(&i)) {
                                yield Ok(StreamEvent::BlockClose { id });
                            }
                        }

                        "message_delta" => {
                            let stop = event
                                .get("delta")
                                .and_then(|d| d.get("stop_reason"))
                                .and_then(|s| s.as_str())
                                .and_then(map_stop_reason);
                            if let Some(stop_reason) = stop {
                                sent_done = true;
                                yield Ok(StreamEvent::StreamDone { stop_reason });
                            }
                        }

                        "message_stop" => {
                            if !sent_done {
                                sent_done = true;
                                yield Ok(StreamEvent::StreamDone {
                                    stop_reason: StopReason::EndTurn,
                                });
                            }
                        }

                        "error" => {
                            let message = event
                                .get("error")
                                .and_then(|e| e.get("message"))
                                .and_then(|m| m.as_str())
                                .unwrap_or("stream error");
                            yield Err(VaultError::Provider(message.to_string()));
                        }

                        _ => {}
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.config.api_key.is_empty())
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_core::tool::catalog;

    #[test]
    fn test_config_defaults() {
        let config = ClaudeConfig::default();
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert_eq!(config.max_tokens, 4096);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_parse_sse_data() {
        assert_eq!(
            parse_sse_data(r#"data: {"type":"message_stop"}"#),
            Some(r#"{"type":"message_stop"}"#)
        );
        assert_eq!(parse_sse_data("event: message_stop"), None);
        assert_eq!(parse_sse_data(""), None);
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason("end_turn"), Some(StopReason::EndTurn));
        assert_eq!(map_stop_reason("tool_use"), Some(StopReason::ToolUse));
        assert_eq!(map_stop_reason("max_tokens"), Some(StopReason::MaxTokens));
        assert_eq!(map_stop_reason("weird"), None);
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::user("What repositories are available?"),
            Message::tool_use("toolu_1", "list_repositories", json!({})),
            Message::tool_result("toolu_1", json!([{"name": "repo1"}])),
        ];

        let converted = ClaudeProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0]["role"], "user");
        assert_eq!(converted[1]["role"], "assistant");
        assert_eq!(converted[1]["content"][0]["type"], "tool_use");

        // Tool results travel back as user-role blocks with string content
        assert_eq!(converted[2]["role"], "user");
        assert_eq!(converted[2]["content"][0]["type"], "tool_result");
        assert_eq!(converted[2]["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(
            converted[2]["content"][0]["content"],
            r#"[{"name":"repo1"}]"#
        );
    }

    #[test]
    fn test_build_body_advertises_catalog() {
        let provider = ClaudeProvider::new(ClaudeConfig::default());
        let body = provider.build_body(&ChatRequest {
            system: "You are a helpful documentation assistant.".into(),
            messages: vec![Message::user("hi")],
            tools: catalog(),
        });

        assert_eq!(body["stream"], true);
        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["tools"].as_array().unwrap().len(), 4);
        assert_eq!(body["tools"][0]["name"], "list_repositories");
        assert!(body["tools"][1]["input_schema"]["properties"]["query"].is_object());
    }
}
