//! WebSocket handler for the chat protocol.
//!
//! One duplex connection carries any number of sessions. Each `submit`
//! spawns its own execution task and event forwarder; a single writer task
//! owns the socket sink so concurrent executions interleave safely at
//! message granularity.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::application::handlers::{
    ClearMemoryHandler, GatewayHealthHandler, InterruptCommand, InterruptHandler,
    SubmitMessageCommand, SubmitMessageHandler,
};
use crate::domain::engine::StreamEmitter;

use super::dto::ChatClientMessage;

/// Shared state for the chat transport.
#[derive(Clone)]
pub struct ChatState {
    /// Message submission handler.
    pub submit: Arc<SubmitMessageHandler>,
    /// Interrupt handler.
    pub interrupt: Arc<InterruptHandler>,
    /// Memory clearing handler.
    pub clear_memory: Arc<ClearMemoryHandler>,
    /// Gateway health handler.
    pub gateway_health: Arc<GatewayHealthHandler>,
    /// Capacity of each execution's event channel.
    pub stream_buffer: usize,
}

/// Handle WebSocket upgrade for the chat protocol.
///
/// Route: `GET /ws/chat`
pub async fn chat_ws_handler(ws: WebSocketUpgrade, State(state): State<ChatState>) -> Response {
    ws.on_upgrade(move |socket| handle_chat_socket(socket, state))
}

/// Drives one established chat connection.
async fn handle_chat_socket(socket: WebSocket, state: ChatState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Single writer task owns the sink; execution tasks feed it.
    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    tracing::info!("chat connection established");

    while let Some(result) = ws_receiver.next().await {
        let message = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue, // ping/pong/binary
        };

        match serde_json::from_str::<ChatClientMessage>(&message) {
            Ok(ChatClientMessage::Submit {
                session_id,
                message,
                context,
            }) => {
                let (emitter, mut events) =
                    StreamEmitter::channel(session_id, state.stream_buffer);

                // Forward this execution's events to the shared writer.
                let out = out_tx.clone();
                tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if out.send(json).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::error!(error = %err, "failed to serialize stream event");
                            }
                        }
                    }
                });

                let submit = state.submit.clone();
                tokio::spawn(async move {
                    let cmd = SubmitMessageCommand::new(session_id, message, context);
                    submit.handle(cmd, emitter).await;
                });
            }
            Ok(ChatClientMessage::Interrupt { session_id, reason }) => {
                state
                    .interrupt
                    .handle(InterruptCommand { session_id, reason });
            }
            Ok(ChatClientMessage::ClearMemory { session_id }) => {
                state.clear_memory.handle(session_id);
            }
            Err(err) => {
                tracing::debug!(error = %err, "ignoring malformed chat message");
            }
        }
    }

    drop(out_tx);
    let _ = writer.await;
    tracing::info!("chat connection closed");
}
