//! Streaming event contract.
//!
//! Every execution emits, in order: `start`, zero or more `content` events,
//! then exactly one terminal event (`end`, `error`, or `interrupted`). The
//! emitter enforces that ordering with an internal phase machine; nothing
//! can be emitted after a terminal event.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

use super::state::{FinalResponse, ResponseKind, SocialDraft};
use crate::domain::foundation::SessionId;

/// Incremental payload carried by a `content` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fragment", rename_all = "snake_case")]
pub enum ContentFragment {
    /// A chunk of streamed answer text.
    Text { delta: String },
    /// A structured draft produced mid-execution.
    Draft { draft: SocialDraft },
}

/// Session-scoped lifecycle and content events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Execution begins. Always first.
    Start { session_id: SessionId },
    /// Incremental output during generation.
    Content {
        session_id: SessionId,
        #[serde(flatten)]
        fragment: ContentFragment,
    },
    /// Normal completion. Terminal.
    End {
        session_id: SessionId,
        response_kind: ResponseKind,
        response: FinalResponse,
    },
    /// Unrecoverable failure. Terminal.
    Error {
        session_id: SessionId,
        message: String,
    },
    /// Cancelled mid-flight. Terminal; may carry no content.
    Interrupted {
        session_id: SessionId,
        reason: Option<String>,
    },
}

impl StreamEvent {
    /// True for `end`, `error`, and `interrupted`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::End { .. } | StreamEvent::Error { .. } | StreamEvent::Interrupted { .. }
        )
    }
}

/// Errors from emitting out of order or into a closed channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmitError {
    #[error("stream has not been started")]
    NotStarted,

    #[error("stream was already started")]
    AlreadyStarted,

    #[error("stream already closed by a terminal event")]
    AlreadyClosed,

    #[error("event channel closed by receiver")]
    ChannelClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitterPhase {
    Created,
    Open,
    Closed,
}

/// Ordered, session-scoped event emitter over a bounded channel.
///
/// Cloneable handle; all clones share the phase machine, so the ordering
/// contract holds across the executor and its stages.
#[derive(Clone)]
pub struct StreamEmitter {
    session_id: SessionId,
    tx: mpsc::Sender<StreamEvent>,
    phase: Arc<Mutex<EmitterPhase>>,
}

impl StreamEmitter {
    /// Creates an emitter and the receiving half of its channel.
    pub fn channel(session_id: SessionId, capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                session_id,
                tx,
                phase: Arc::new(Mutex::new(EmitterPhase::Created)),
            },
            rx,
        )
    }

    /// The session this emitter belongs to.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// True once a terminal event has been emitted.
    pub fn is_closed(&self) -> bool {
        *self.phase.lock().expect("emitter phase lock poisoned") == EmitterPhase::Closed
    }

    /// Emits `start`. Must be the first event, exactly once.
    pub async fn start(&self) -> Result<(), EmitError> {
        {
            let mut phase = self.phase.lock().expect("emitter phase lock poisoned");
            match *phase {
                EmitterPhase::Created => *phase = EmitterPhase::Open,
                EmitterPhase::Open => return Err(EmitError::AlreadyStarted),
                EmitterPhase::Closed => return Err(EmitError::AlreadyClosed),
            }
        }
        self.send(StreamEvent::Start {
            session_id: self.session_id,
        })
        .await
    }

    /// Emits an incremental content fragment.
    pub async fn content(&self, fragment: ContentFragment) -> Result<(), EmitError> {
        self.check_open()?;
        self.send(StreamEvent::Content {
            session_id: self.session_id,
            fragment,
        })
        .await
    }

    /// Convenience for streamed text deltas.
    pub async fn text_delta(&self, delta: impl Into<String>) -> Result<(), EmitError> {
        self.content(ContentFragment::Text {
            delta: delta.into(),
        })
        .await
    }

    /// Emits the terminal `end` event.
    pub async fn end(&self, response: FinalResponse) -> Result<(), EmitError> {
        self.close()?;
        self.send(StreamEvent::End {
            session_id: self.session_id,
            response_kind: response.kind(),
            response,
        })
        .await
    }

    /// Emits the terminal `error` event with a sanitized message.
    pub async fn error(&self, message: impl Into<String>) -> Result<(), EmitError> {
        self.close()?;
        self.send(StreamEvent::Error {
            session_id: self.session_id,
            message: message.into(),
        })
        .await
    }

    /// Emits the terminal `interrupted` event.
    pub async fn interrupted(&self, reason: Option<String>) -> Result<(), EmitError> {
        self.close()?;
        self.send(StreamEvent::Interrupted {
            session_id: self.session_id,
            reason,
        })
        .await
    }

    fn check_open(&self) -> Result<(), EmitError> {
        match *self.phase.lock().expect("emitter phase lock poisoned") {
            EmitterPhase::Created => Err(EmitError::NotStarted),
            EmitterPhase::Open => Ok(()),
            EmitterPhase::Closed => Err(EmitError::AlreadyClosed),
        }
    }

    fn close(&self) -> Result<(), EmitError> {
        let mut phase = self.phase.lock().expect("emitter phase lock poisoned");
        match *phase {
            EmitterPhase::Created => Err(EmitError::NotStarted),
            EmitterPhase::Open => {
                *phase = EmitterPhase::Closed;
                Ok(())
            }
            EmitterPhase::Closed => Err(EmitError::AlreadyClosed),
        }
    }

    async fn send(&self, event: StreamEvent) -> Result<(), EmitError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| EmitError::ChannelClosed)
    }
}
