//! Interrupt handler.
//!
//! Signals the session registry to cancel the session's running execution.
//! The running execution itself observes the token at its next suspension
//! point and closes its stream with an `interrupted` event.

use std::sync::Arc;

use crate::domain::engine::SessionRegistry;
use crate::domain::foundation::SessionId;

/// Command to interrupt a session's running execution.
#[derive(Debug, Clone)]
pub struct InterruptCommand {
    /// The session to interrupt.
    pub session_id: SessionId,
    /// Optional caller-supplied reason, kept for logs.
    pub reason: Option<String>,
}

/// Result of an interrupt request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptResult {
    /// True when a running execution existed and was signaled.
    pub was_running: bool,
}

/// Handler for caller-driven cancellation.
pub struct InterruptHandler {
    registry: Arc<SessionRegistry>,
}

impl InterruptHandler {
    /// Creates a new handler.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Signals cancellation for the session.
    pub fn handle(&self, cmd: InterruptCommand) -> InterruptResult {
        let was_running = self.registry.cancel(cmd.session_id);
        tracing::info!(
            session_id = %cmd.session_id,
            was_running,
            reason = cmd.reason.as_deref().unwrap_or("unspecified"),
            "interrupt requested"
        );
        InterruptResult { was_running }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_signals_running_session() {
        let registry = Arc::new(SessionRegistry::new());
        let session_id = SessionId::new();
        let token = registry.begin(session_id);

        let handler = InterruptHandler::new(registry);
        let result = handler.handle(InterruptCommand {
            session_id,
            reason: Some("user pressed stop".into()),
        });

        assert!(result.was_running);
        assert!(token.is_cancelled());
    }

    #[test]
    fn interrupt_of_idle_session_reports_not_running() {
        let handler = InterruptHandler::new(Arc::new(SessionRegistry::new()));
        let result = handler.handle(InterruptCommand {
            session_id: SessionId::new(),
            reason: None,
        });

        assert!(!result.was_running);
    }
}
