//! # vault-core
//!
//! Streaming tool-orchestration core for the documentation assistant.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Orchestrator                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────┐  │
//! │  │    Delta     │  │    Tool      │  │   ChatProvider    │  │
//! │  │ Accumulator  │──│   Invoker    │──│   (Strategy)      │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ChatProvider` trait normalizes any model backend's token-delta
//! stream into one event vocabulary; the orchestrator turns that into
//! canonical events, executes tool calls mid-stream through `ToolInvoker`,
//! and commits conversation history only when a turn finalizes.

pub mod accumulator;
pub mod error;
pub mod event;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod store;
pub mod tool;

pub use accumulator::{AccumulatorState, DeltaAccumulator, TurnItem};
pub use error::{Result, VaultError};
pub use event::CanonicalEvent;
pub use message::{ContentBlock, Conversation, Message, Role};
pub use orchestrator::{Orchestrator, OrchestratorConfig, ScopeContext};
pub use provider::{ChatProvider, ChatRequest, EventStream, StopReason, StreamEvent};
pub use store::ConversationStore;
pub use tool::{catalog, ToolCallRequest, ToolDescriptor, ToolInvoker, ToolOutcome};
