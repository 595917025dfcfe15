//! Model Provider Boundary
//!
//! Defines a common interface for streaming chat providers, allowing the
//! conversation loop to work with any backend without code changes. The
//! provider emits a normalized incremental event stream; everything
//! provider-specific (SSE framing, field names) stays behind this trait.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::message::Message;
use crate::tool::ToolDescriptor;

/// Why the provider stopped streaming
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural completion
    EndTurn,
    /// The model wants tool results before continuing
    ToolUse,
    /// Output truncated at the token limit
    MaxTokens,
}

/// Incremental event from a provider stream
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// A text fragment
    TextFragment(String),

    /// A tool-call block opened
    ToolCallOpen { id: String, name: String },

    /// A fragment of the JSON argument text for an open tool-call block
    ToolCallArgFragment { id: String, text: String },

    /// A tool-call block closed; its arguments are complete
    BlockClose { id: String },

    /// The stream ended with the given stop reason
    StreamDone { stop_reason: StopReason },
}

/// Stream type for provider events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// One streamed model request
#[derive(Clone, Debug)]
pub struct ChatRequest {
    /// System prompt for this turn
    pub system: String,

    /// Full message history, oldest first
    pub messages: Vec<Message>,

    /// Tool catalog advertised to the model
    pub tools: Vec<ToolDescriptor>,
}

/// Strategy trait for streaming chat providers
///
/// Implement this trait to add support for new model backends.
/// The conversation loop depends exclusively on this interface.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open a streamed chat request
    async fn stream_chat(&self, request: ChatRequest) -> Result<EventStream>;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Model identifier advertised in health reports
    fn model(&self) -> &str;
}
