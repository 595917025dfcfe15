//! Delta Accumulator
//!
//! Reconstructs complete logical units from a provider's incremental event
//! stream. Text reaches the transport immediately; tool-call arguments are
//! buffered per block until the block closes and the JSON is complete.

use std::collections::HashMap;

use crate::event::CanonicalEvent;
use crate::provider::{StopReason, StreamEvent};
use crate::tool::ToolCallRequest;

/// Accumulator lifecycle for one streamed turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccumulatorState {
    Idle,
    Streaming,
    Closed,
}

/// Output of feeding one provider event into the accumulator
#[derive(Clone, Debug)]
pub enum TurnItem {
    /// A canonical event to forward to the transport without buffering
    Event(CanonicalEvent),

    /// A fully-formed tool-call request, ready for execution
    ToolCall(ToolCallRequest),

    /// The provider stream ended with this stop reason
    Finished(StopReason),
}

#[derive(Debug)]
struct OpenBlock {
    name: String,
    arg_buffer: String,
}

/// Per-turn state machine: Idle → Streaming → Closed.
///
/// Multiple tool-call blocks may be open at once; each is tracked
/// independently by its provider-assigned identifier.
#[derive(Debug)]
pub struct DeltaAccumulator {
    state: AccumulatorState,
    open_blocks: HashMap<String, OpenBlock>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self {
            state: AccumulatorState::Idle,
            open_blocks: HashMap::new(),
        }
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Feed one provider event, producing the items to act on, in order.
    pub fn push(&mut self, event: StreamEvent) -> Vec<TurnItem> {
        if self.state == AccumulatorState::Idle {
            self.state = AccumulatorState::Streaming;
        }

        match event {
            StreamEvent::TextFragment(text) => {
                vec![TurnItem::Event(CanonicalEvent::Text { content: text })]
            }

            StreamEvent::ToolCallOpen { id, name } => {
                self.open_blocks.insert(
                    id.clone(),
                    OpenBlock {
                        name: name.clone(),
                        arg_buffer: String::new(),
                    },
                );
                // Emitted immediately so clients can show progress before
                // the arguments finish streaming.
                vec![TurnItem::Event(CanonicalEvent::ToolUseStart {
                    tool_id: id,
                    name,
                    input: serde_json::json!({}),
                })]
            }

            StreamEvent::ToolCallArgFragment { id, text } => {
                if let Some(block) = self.open_blocks.get_mut(&id) {
                    block.arg_buffer.push_str(&text);
                }
                Vec::new()
            }

            StreamEvent::BlockClose { id } => match self.open_blocks.remove(&id) {
                Some(block) => {
                    let arguments = parse_arguments(&block.arg_buffer);
                    vec![TurnItem::ToolCall(ToolCallRequest {
                        id,
                        name: block.name,
                        arguments,
                    })]
                }
                // Close of a non-tool block (e.g. text); nothing to finalize.
                None => Vec::new(),
            },

            StreamEvent::StreamDone { stop_reason } => {
                self.state = AccumulatorState::Closed;
                vec![TurnItem::Finished(stop_reason)]
            }
        }
    }
}

impl Default for DeltaAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Malformed partial JSON must not abort the conversation; degrade to an
/// empty object instead.
fn parse_arguments(buffer: &str) -> serde_json::Value {
    if buffer.is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(buffer).unwrap_or_else(|_| serde_json::json!({}))
}
