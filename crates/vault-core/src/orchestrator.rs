//! Conversation Loop
//!
//! Drives one user turn: stream the model, forward canonical events as they
//! are produced, execute tool calls mid-stream, feed results back, and
//! re-enter the model until it stops requesting tools. History for the turn
//! is staged locally and committed to the conversation only when the turn
//! finalizes, so an aborted turn never leaves a partial entry or an
//! unmatched tool-call/tool-result pair behind.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::accumulator::{DeltaAccumulator, TurnItem};
use crate::error::{Result, VaultError};
use crate::event::CanonicalEvent;
use crate::message::{Conversation, Message};
use crate::provider::{ChatProvider, ChatRequest, StopReason};
use crate::tool::{catalog, ToolInvoker};

/// Scope context supplied by the client alongside a user message
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeContext {
    pub scope: String,

    #[serde(default)]
    pub repo_name: Option<String>,
}

impl ScopeContext {
    /// The repository this turn is focused on, if any
    pub fn focused_repo(&self) -> Option<&str> {
        if self.scope == "repo" {
            self.repo_name.as_deref()
        } else {
            None
        }
    }
}

/// Orchestrator configuration
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Base system prompt
    pub system_prompt: String,

    /// Hard cap on model re-entries per user message
    pub max_iterations: usize,

    /// Timeout for opening the provider stream and for each chunk await
    pub request_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            request_timeout: Duration::from_secs(120),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful documentation assistant for a GitHub organization.

You have access to tools to search and retrieve documentation:
- list_repositories: List all available repositories
- search_documentation: Search across documentation
- get_documentation: Get a specific document's content
- list_repo_docs: List all documents in a repository

When answering questions:
1. Use tools to find relevant documentation
2. Cite specific documents when providing information
3. If information is not found, clearly state that
4. Provide accurate, helpful responses based on the documentation"#;

/// Build the per-turn system prompt, optionally scoped to one repository
pub fn build_system_prompt(base: &str, scope: Option<&ScopeContext>) -> String {
    let mut prompt = base.to_string();

    if let Some(repo) = scope.and_then(ScopeContext::focused_repo) {
        prompt.push_str(&format!(
            r#"

IMPORTANT: The user is currently focused on the '{repo}' repository.
When searching for documentation:
1. Search within '{repo}' first
2. If not found there, mention you're expanding to other repositories
3. Always clarify which repository information comes from"#
        ));
    }

    prompt
}

/// The conversation loop engine
pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    invoker: Arc<dyn ToolInvoker>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        invoker: Arc<dyn ToolInvoker>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            invoker,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn ChatProvider>, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self::new(provider, invoker, OrchestratorConfig::default())
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one user turn against the conversation.
    ///
    /// Emits every canonical event for the turn through `events`, ending with
    /// exactly one `done` or `error`. On success the staged messages (user,
    /// tool pairs, finalized assistant) are committed to the conversation in
    /// order; on a provider failure the conversation is left untouched.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        content: &str,
        scope: Option<&ScopeContext>,
        events: &mpsc::Sender<CanonicalEvent>,
    ) -> Result<()> {
        let mut staged = vec![Message::user(content)];
        let mut turn_text = String::new();

        match self
            .drive(conversation, &mut staged, &mut turn_text, scope, events)
            .await
        {
            Ok(()) => {
                let assistant = Message::assistant(turn_text);
                let message_id = assistant.id;
                staged.push(assistant);
                conversation.extend(staged);

                send(events, CanonicalEvent::Done { message_id }).await?;
                Ok(())
            }
            Err(e) => {
                tracing::error!(conversation = %conversation.id, error = %e, "turn aborted");
                // Partial text already streamed is not retracted; staged
                // history is dropped so no corrupt entry is committed.
                let _ = events
                    .send(CanonicalEvent::Error {
                        message: e.user_message(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// The continuation loop: stream, execute tools, repeat.
    async fn drive(
        &self,
        conversation: &Conversation,
        staged: &mut Vec<Message>,
        turn_text: &mut String,
        scope: Option<&ScopeContext>,
        events: &mpsc::Sender<CanonicalEvent>,
    ) -> Result<()> {
        let system = build_system_prompt(&self.config.system_prompt, scope);
        let mut iterations = 0;

        loop {
            iterations += 1;

            let mut messages = conversation.messages().to_vec();
            messages.extend(staged.iter().cloned());

            let request = ChatRequest {
                system: system.clone(),
                messages,
                tools: catalog(),
            };

            let mut stream = self.bounded(self.provider.stream_chat(request)).await??;
            let mut acc = DeltaAccumulator::new();
            let mut stop_reason = None;

            while let Some(event) = self.bounded(stream.next()).await? {
                for item in acc.push(event?) {
                    match item {
                        TurnItem::Event(ev) => {
                            if let CanonicalEvent::Text { content } = &ev {
                                turn_text.push_str(content);
                            }
                            send(events, ev).await?;
                        }

                        TurnItem::ToolCall(request) => {
                            tracing::debug!(tool = %request.name, id = %request.id, "executing tool");
                            let outcome = self.invoker.invoke(&request).await;

                            send(
                                events,
                                CanonicalEvent::ToolResult {
                                    tool_id: outcome.tool_call_id.clone(),
                                    name: outcome.name.clone(),
                                    result: outcome.payload.clone(),
                                    duration: outcome.duration_ms,
                                },
                            )
                            .await?;

                            // The pair is staged together: a tool message can
                            // never appear without its assistant request.
                            staged.push(Message::tool_use(
                                request.id,
                                request.name,
                                request.arguments,
                            ));
                            staged.push(Message::tool_result(outcome.tool_call_id, outcome.payload));
                        }

                        TurnItem::Finished(reason) => stop_reason = Some(reason),
                    }
                }
            }

            match stop_reason {
                Some(StopReason::ToolUse) => {
                    if iterations >= self.config.max_iterations {
                        // Safety valve: finalize as if the model stopped
                        // naturally instead of hanging the connection.
                        tracing::warn!(
                            max = self.config.max_iterations,
                            "iteration cap reached, finalizing turn"
                        );
                        return Ok(());
                    }
                }
                Some(StopReason::EndTurn) | Some(StopReason::MaxTokens) => return Ok(()),
                None => {
                    return Err(VaultError::Provider(
                        "stream ended without a completion event".into(),
                    ))
                }
            }
        }
    }

    /// Bound a suspension point by the configured request timeout
    async fn bounded<F: std::future::Future>(&self, fut: F) -> Result<F::Output> {
        timeout(self.config.request_timeout, fut)
            .await
            .map_err(|_| VaultError::Timeout(self.config.request_timeout.as_secs()))
    }
}

async fn send(events: &mpsc::Sender<CanonicalEvent>, event: CanonicalEvent) -> Result<()> {
    events
        .send(event)
        .await
        .map_err(|_| VaultError::Other("event receiver dropped".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{EventStream, StreamEvent};
    use crate::tool::{ToolCallRequest, ToolOutcome};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that replays scripted event streams, one per model request.
    /// When the scripts run out it falls back to `repeat`, if set.
    struct ScriptedProvider {
        scripts: Mutex<VecDeque<Vec<StreamEvent>>>,
        repeat: Option<Vec<StreamEvent>>,
        fail_after: Mutex<Option<usize>>,
    }

    impl ScriptedProvider {
        fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                repeat: None,
                fail_after: Mutex::new(None),
            }
        }

        fn repeating(script: Vec<StreamEvent>) -> Self {
            Self {
                scripts: Mutex::new(VecDeque::new()),
                repeat: Some(script),
                fail_after: Mutex::new(None),
            }
        }

        /// Emit `n` events of the first script, then a provider error.
        fn failing_after(script: Vec<StreamEvent>, n: usize) -> Self {
            Self {
                scripts: Mutex::new(vec![script].into()),
                repeat: None,
                fail_after: Mutex::new(Some(n)),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn stream_chat(&self, _request: ChatRequest) -> Result<EventStream> {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .or_else(|| self.repeat.clone())
                .expect("provider called more times than scripted");

            let fail_after = *self.fail_after.lock().unwrap();
            let mut items: Vec<Result<StreamEvent>> = script.into_iter().map(Ok).collect();
            if let Some(n) = fail_after {
                items.truncate(n);
                items.push(Err(VaultError::Provider("connection reset".into())));
            }

            Ok(Box::pin(futures::stream::iter(items)))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    /// Invoker that records every request and answers with a fixed payload.
    struct RecordingInvoker {
        calls: Mutex<Vec<ToolCallRequest>>,
        payload: serde_json::Value,
    }

    impl RecordingInvoker {
        fn new(payload: serde_json::Value) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                payload,
            }
        }
    }

    #[async_trait]
    impl ToolInvoker for RecordingInvoker {
        async fn invoke(&self, request: &ToolCallRequest) -> ToolOutcome {
            self.calls.lock().unwrap().push(request.clone());
            ToolOutcome {
                tool_call_id: request.id.clone(),
                name: request.name.clone(),
                payload: self.payload.clone(),
                duration_ms: 1,
            }
        }
    }

    fn tool_turn(id: &str, name: &str, args: &str) -> Vec<StreamEvent> {
        vec![
            StreamEvent::ToolCallOpen {
                id: id.into(),
                name: name.into(),
            },
            StreamEvent::ToolCallArgFragment {
                id: id.into(),
                text: args.into(),
            },
            StreamEvent::BlockClose { id: id.into() },
            StreamEvent::StreamDone {
                stop_reason: StopReason::ToolUse,
            },
        ]
    }

    fn text_turn(fragments: &[&str]) -> Vec<StreamEvent> {
        let mut events: Vec<StreamEvent> = fragments
            .iter()
            .map(|f| StreamEvent::TextFragment((*f).to_string()))
            .collect();
        events.push(StreamEvent::StreamDone {
            stop_reason: StopReason::EndTurn,
        });
        events
    }

    async fn run_and_collect(
        orchestrator: &Orchestrator,
        conversation: &mut Conversation,
        content: &str,
    ) -> (Result<()>, Vec<CanonicalEvent>) {
        let (tx, mut rx) = mpsc::channel(256);
        let result = orchestrator.run_turn(conversation, content, None, &tx).await;
        drop(tx);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        (result, events)
    }

    fn event_kinds(events: &[CanonicalEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                CanonicalEvent::Text { .. } => "text",
                CanonicalEvent::ToolUseStart { .. } => "tool_use_start",
                CanonicalEvent::ToolResult { .. } => "tool_result",
                CanonicalEvent::Done { .. } => "done",
                CanonicalEvent::Error { .. } => "error",
            })
            .collect()
    }

    #[tokio::test]
    async fn test_plain_text_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_turn(&[
            "Hello", ", ", "world",
        ])]));
        let invoker = Arc::new(RecordingInvoker::new(serde_json::json!(null)));
        let orchestrator = Orchestrator::with_defaults(provider, invoker.clone());

        let mut conversation = Conversation::new();
        let (result, events) = run_and_collect(&orchestrator, &mut conversation, "Hi").await;

        result.unwrap();
        assert_eq!(
            event_kinds(&events),
            ["text", "text", "text", "done"]
        );

        // Exactly one new assistant message, equal to the concatenated text
        assert_eq!(conversation.len(), 2);
        let assistant = conversation.last().unwrap();
        assert_eq!(assistant.role, crate::message::Role::Assistant);
        assert_eq!(assistant.text(), "Hello, world");
        assert!(invoker.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_call_turn() {
        // The list_repositories scenario: tool request, then a continuation
        // with the final text.
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_turn("toolu_1", "list_repositories", ""),
            text_turn(&["The repositories are: repo1"]),
        ]));
        let invoker = Arc::new(RecordingInvoker::new(
            serde_json::json!([{"name": "repo1"}]),
        ));
        let orchestrator = Orchestrator::with_defaults(provider, invoker.clone());

        let mut conversation = Conversation::new();
        let (result, events) = run_and_collect(
            &orchestrator,
            &mut conversation,
            "What repositories are available?",
        )
        .await;

        result.unwrap();
        assert_eq!(
            event_kinds(&events),
            ["tool_use_start", "tool_result", "text", "done"]
        );

        match &events[1] {
            CanonicalEvent::ToolResult { name, result, .. } => {
                assert_eq!(name, "list_repositories");
                assert_eq!(result[0]["name"], "repo1");
            }
            other => panic!("expected tool_result, got {:?}", other),
        }

        // History: user, assistant(tool_use), tool(result), assistant(text)
        assert_eq!(conversation.len(), 4);
        let roles: Vec<_> = conversation.messages().iter().map(|m| m.role).collect();
        use crate::message::Role::*;
        assert_eq!(roles, [User, Assistant, Tool, Assistant]);
        assert_eq!(
            conversation.last().unwrap().text(),
            "The repositories are: repo1"
        );
    }

    #[tokio::test]
    async fn test_malformed_arguments_still_invoke() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_turn("toolu_1", "search_documentation", r#"{"query": "unterm"#),
            text_turn(&["No results."]),
        ]));
        let invoker = Arc::new(RecordingInvoker::new(serde_json::json!([])));
        let orchestrator = Orchestrator::with_defaults(provider, invoker.clone());

        let mut conversation = Conversation::new();
        let (result, events) = run_and_collect(&orchestrator, &mut conversation, "search").await;

        result.unwrap();
        assert!(event_kinds(&events).contains(&"tool_result"));

        let calls = invoker.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_iteration_cap_forces_done() {
        let provider = Arc::new(ScriptedProvider::repeating(tool_turn(
            "toolu_n",
            "list_repositories",
            "",
        )));
        let invoker = Arc::new(RecordingInvoker::new(serde_json::json!([])));
        let orchestrator = Orchestrator::new(
            provider,
            invoker.clone(),
            OrchestratorConfig {
                max_iterations: 3,
                ..Default::default()
            },
        );

        let mut conversation = Conversation::new();
        let (result, events) = run_and_collect(&orchestrator, &mut conversation, "loop").await;

        result.unwrap();
        let kinds = event_kinds(&events);
        assert_eq!(kinds.last(), Some(&"done"));
        assert!(!kinds.contains(&"error"));
        assert_eq!(invoker.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_history_untouched() {
        let provider = Arc::new(ScriptedProvider::failing_after(
            text_turn(&["partial text"]),
            1,
        ));
        let invoker = Arc::new(RecordingInvoker::new(serde_json::json!(null)));
        let orchestrator = Orchestrator::with_defaults(provider, invoker);

        let mut conversation = Conversation::new();
        let (result, events) = run_and_collect(&orchestrator, &mut conversation, "Hi").await;

        assert!(result.is_err());
        // Streamed text is not retracted, and the turn ends with an error
        assert_eq!(event_kinds(&events), ["text", "error"]);
        assert!(conversation.is_empty());
    }

    #[tokio::test]
    async fn test_identical_input_identical_event_shape() {
        let make = || {
            let provider = Arc::new(ScriptedProvider::new(vec![
                tool_turn("toolu_1", "list_repositories", ""),
                text_turn(&["The repositories are: repo1"]),
            ]));
            let invoker = Arc::new(RecordingInvoker::new(serde_json::json!([{"name": "repo1"}])));
            Orchestrator::with_defaults(provider, invoker)
        };

        let mut first = Conversation::new();
        let mut second = Conversation::new();
        let (r1, e1) = run_and_collect(&make(), &mut first, "What repositories are available?").await;
        let (r2, e2) = run_and_collect(&make(), &mut second, "What repositories are available?").await;

        r1.unwrap();
        r2.unwrap();
        assert_eq!(event_kinds(&e1), event_kinds(&e2));
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_scoped_system_prompt() {
        let scope = ScopeContext {
            scope: "repo".into(),
            repo_name: Some("frontend-app".into()),
        };
        let prompt = build_system_prompt(DEFAULT_SYSTEM_PROMPT, Some(&scope));
        assert!(prompt.contains("focused on the 'frontend-app' repository"));
        assert!(prompt.contains("Search within 'frontend-app' first"));

        let unscoped = build_system_prompt(DEFAULT_SYSTEM_PROMPT, None);
        assert!(!unscoped.contains("IMPORTANT"));

        // A non-repo scope does not narrow the prompt
        let global = ScopeContext {
            scope: "global".into(),
            repo_name: Some("frontend-app".into()),
        };
        assert!(!build_system_prompt(DEFAULT_SYSTEM_PROMPT, Some(&global)).contains("IMPORTANT"));
    }
}
