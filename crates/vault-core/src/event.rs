//! Canonical Events
//!
//! The normalized vocabulary crossing from the orchestration core to the
//! transport layer. No provider-specific shape leaks past this point; the
//! serialized form is exactly what WebSocket clients receive.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event emitted by the conversation loop, relayed verbatim to clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalEvent {
    /// Incremental text fragment, forwarded unbuffered
    Text { content: String },

    /// A tool-call block opened; arguments are still streaming
    ToolUseStart {
        #[serde(rename = "toolId")]
        tool_id: String,
        name: String,
        /// Always empty at start; arguments are not useful until complete
        input: serde_json::Value,
    },

    /// A tool finished executing (success or absorbed failure)
    ToolResult {
        #[serde(rename = "toolId")]
        tool_id: String,
        name: String,
        result: serde_json::Value,
        /// Wall-clock execution time in milliseconds
        duration: u64,
    },

    /// Turn completed; `message_id` identifies the finalized assistant message
    Done {
        #[serde(rename = "messageId")]
        message_id: Uuid,
    },

    /// Turn aborted; partial text already streamed is not retracted
    Error { message: String },
}

impl CanonicalEvent {
    /// Whether this event terminates a turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, CanonicalEvent::Done { .. } | CanonicalEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_text() {
        let ev = CanonicalEvent::Text {
            content: "hello".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "content": "hello"}));
    }

    #[test]
    fn test_wire_format_tool_events() {
        let start = CanonicalEvent::ToolUseStart {
            tool_id: "toolu_1".into(),
            name: "list_repositories".into(),
            input: serde_json::json!({}),
        };
        let json = serde_json::to_value(&start).unwrap();
        assert_eq!(json["type"], "tool_use_start");
        assert_eq!(json["toolId"], "toolu_1");
        assert_eq!(json["name"], "list_repositories");

        let finished = CanonicalEvent::ToolResult {
            tool_id: "toolu_1".into(),
            name: "list_repositories".into(),
            result: serde_json::json!([{"name": "repo1"}]),
            duration: 42,
        };
        let json = serde_json::to_value(&finished).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["duration"], 42);
        assert_eq!(json["result"][0]["name"], "repo1");
    }

    #[test]
    fn test_terminal_events() {
        let done = CanonicalEvent::Done {
            message_id: Uuid::new_v4(),
        };
        let err = CanonicalEvent::Error {
            message: "boom".into(),
        };
        let text = CanonicalEvent::Text { content: "x".into() };

        assert!(done.is_terminal());
        assert!(err.is_terminal());
        assert!(!text.is_terminal());

        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["type"], "done");
        assert!(json["messageId"].is_string());
    }
}
