//! Wire types for the chat WebSocket protocol.
//!
//! Inbound: `submit` and `interrupt`, tagged JSON. Outbound: the engine's
//! [`StreamEvent`](crate::domain::engine::StreamEvent) serialized directly,
//! so the public protocol and the internal event contract cannot drift.

use serde::{Deserialize, Serialize};

use crate::application::handlers::SessionContext;
use crate::domain::foundation::SessionId;

/// Messages a client may send over the chat socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatClientMessage {
    /// Submit a message for processing.
    Submit {
        session_id: SessionId,
        message: String,
        #[serde(default)]
        context: SessionContext,
    },
    /// Cancel the session's running execution.
    Interrupt {
        session_id: SessionId,
        #[serde(default)]
        reason: Option<String>,
    },
    /// Drop the session's conversation memory.
    ClearMemory { session_id: SessionId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_deserializes_with_defaulted_context() {
        let session_id = SessionId::new();
        let json = format!(
            r#"{{"type": "submit", "session_id": "{session_id}", "message": "hello"}}"#
        );
        match serde_json::from_str::<ChatClientMessage>(&json).unwrap() {
            ChatClientMessage::Submit {
                message, context, ..
            } => {
                assert_eq!(message, "hello");
                assert!(context.prior_turns.is_empty());
            }
            other => panic!("expected submit, got {other:?}"),
        }
    }

    #[test]
    fn interrupt_round_trips() {
        let msg = ChatClientMessage::Interrupt {
            session_id: SessionId::new(),
            reason: Some("user pressed stop".into()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"interrupt\""));
        let back: ChatClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ChatClientMessage::Interrupt { .. }));
    }
}
