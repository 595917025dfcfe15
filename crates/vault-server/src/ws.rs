//! Session Transport Adapter
//!
//! Binds one WebSocket connection to a conversation. A connection processes
//! one user message at a time and fully relays the turn's terminal event
//! before reading the next frame; turns on the same conversation serialize
//! across connections through the store's per-conversation lock.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use vault_core::{CanonicalEvent, ScopeContext};

use crate::state::AppState;

/// Inbound WebSocket frames
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A user message, optionally scoped to one repository
    Message {
        content: String,
        #[serde(default)]
        context: Option<ScopeContext>,
    },

    /// Idle keepalive
    Ping,
}

/// WebSocket chat endpoint
pub async fn chat_socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, conversation_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, conversation_id: Uuid) {
    // Conversations are created on first use of an identifier and survive
    // this connection.
    let conversation = state.store.get_or_create(conversation_id);
    let (mut sender, mut receiver) = socket.split();

    tracing::debug!(conversation = %conversation_id, "websocket connected");

    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Err(e) => {
                tracing::debug!(error = %e, "websocket receive failed");
                break;
            }
            _ => continue,
        };

        let message: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                if send_error(&mut sender, &e.to_string()).await.is_err() {
                    break;
                }
                continue;
            }
        };

        match message {
            ClientMessage::Ping => {
                let pong = serde_json::json!({"type": "pong"});
                if sender
                    .send(WsMessage::Text(pong.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }

            ClientMessage::Message { content, context } => {
                if content.trim().is_empty() {
                    // No model call, conversation unmodified
                    if send_error(&mut sender, "Empty message").await.is_err() {
                        break;
                    }
                    continue;
                }

                let (tx, rx) = mpsc::channel::<CanonicalEvent>(64);
                let orchestrator = state.orchestrator.clone();
                let handle = conversation.clone();

                let turn = tokio::spawn(async move {
                    // Holding the lock for the whole turn keeps same-key
                    // turns serialized and history append-order well defined.
                    let mut conversation = handle.lock().await;
                    let _ = orchestrator
                        .run_turn(&mut conversation, &content, context.as_ref(), &tx)
                        .await;
                });

                let mut events = ReceiverStream::new(rx);
                let mut client_gone = false;

                while let Some(event) = events.next().await {
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                        client_gone = true;
                        break;
                    }
                }

                if client_gone {
                    // Disconnect mid-turn: cancel the in-flight turn. Staged
                    // history is dropped with it, so no unmatched tool pair
                    // can be committed.
                    turn.abort();
                    break;
                }

                let _ = turn.await;
            }
        }
    }

    tracing::debug!(conversation = %conversation_id, "websocket closed");
}

async fn send_error(
    sender: &mut (impl SinkExt<WsMessage> + Unpin),
    message: &str,
) -> Result<(), ()> {
    let event = CanonicalEvent::Error {
        message: message.into(),
    };
    let payload = serde_json::to_string(&event).map_err(|_| ())?;
    sender
        .send(WsMessage::Text(payload.into()))
        .await
        .map_err(|_| ())
}
