//! Clear memory handler.
//!
//! Drops a session's conversation window and rolling summary.

use std::sync::Arc;

use crate::domain::engine::ConversationMemoryManager;
use crate::domain::foundation::SessionId;

/// Handler for explicit memory clearing.
pub struct ClearMemoryHandler {
    memory: Arc<ConversationMemoryManager>,
}

impl ClearMemoryHandler {
    /// Creates a new handler.
    pub fn new(memory: Arc<ConversationMemoryManager>) -> Self {
        Self { memory }
    }

    /// Clears the session's memory. Returns true when memory existed.
    pub fn handle(&self, session_id: SessionId) -> bool {
        let cleared = self.memory.clear(session_id);
        tracing::info!(session_id = %session_id, cleared, "memory clear requested");
        cleared
    }
}
