//! Session registry - at most one active execution per session.
//!
//! `begin` installs a fresh cancellation token for the session, cancelling
//! any execution already running under the same id ("newest message wins").
//! Cancellation is cooperative: the token is an atomic flag checked at every
//! suspension point; nothing is forcibly terminated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::foundation::{SessionId, Timestamp};

/// Cooperative cancellation token.
///
/// Clones share the underlying flag; a token cloned into a running
/// execution observes cancellations signaled through the registry.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Checks whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether two handles refer to the same underlying token.
    pub fn same_token(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveExecution {
    token: CancellationToken,
    started_at: Timestamp,
}

/// Per-session execution registry.
///
/// The session→token map is the only shared mutable state between
/// concurrent submissions for the same session; it is mutex-guarded and
/// never held across an await point.
pub struct SessionRegistry {
    active: Mutex<HashMap<SessionId, ActiveExecution>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a new execution for the session.
    ///
    /// Any execution already running under the same session is cancelled
    /// first; the returned token belongs to the new execution.
    pub fn begin(&self, session_id: SessionId) -> CancellationToken {
        let token = CancellationToken::new();
        let mut active = self.active.lock().expect("registry lock poisoned");

        if let Some(previous) = active.insert(
            session_id,
            ActiveExecution {
                token: token.clone(),
                started_at: Timestamp::now(),
            },
        ) {
            previous.token.cancel();
            tracing::debug!(session_id = %session_id, "superseded running execution");
        }

        token
    }

    /// Signals cancellation of the session's running execution.
    ///
    /// Returns true when a running execution existed and was signaled.
    pub fn cancel(&self, session_id: SessionId) -> bool {
        let active = self.active.lock().expect("registry lock poisoned");
        match active.get(&session_id) {
            Some(execution) => {
                execution.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether the session currently has a registered execution.
    pub fn is_active(&self, session_id: SessionId) -> bool {
        self.active
            .lock()
            .expect("registry lock poisoned")
            .contains_key(&session_id)
    }

    /// Releases the session's handle when the finishing execution still
    /// owns it.
    ///
    /// A superseded execution finishing late must not evict its successor's
    /// handle, so the stored token is compared by identity.
    pub fn finish(&self, session_id: SessionId, token: &CancellationToken) {
        let mut active = self.active.lock().expect("registry lock poisoned");
        if let Some(execution) = active.get(&session_id) {
            if execution.token.same_token(token) {
                active.remove(&session_id);
            }
        }
    }

    /// Removes handles of executions older than `max_age`.
    ///
    /// Returns the number of handles removed. Removed executions are
    /// cancelled so an orphaned task still observes the signal.
    pub fn sweep_inactive(&self, max_age: Duration) -> usize {
        let mut active = self.active.lock().expect("registry lock poisoned");
        let before = active.len();
        active.retain(|session_id, execution| {
            let age = execution.started_at.elapsed();
            let stale = age.num_seconds() >= max_age.as_secs() as i64;
            if stale {
                execution.token.cancel();
                tracing::warn!(session_id = %session_id, age_secs = age.num_seconds(), "swept stale execution handle");
            }
            !stale
        });
        before - active.len()
    }

    /// Number of registered executions.
    pub fn active_count(&self) -> usize {
        self.active.lock().expect("registry lock poisoned").len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_returns_live_token() {
        let registry = SessionRegistry::new();
        let token = registry.begin(SessionId::new());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn newest_message_wins() {
        let registry = SessionRegistry::new();
        let session_id = SessionId::new();

        let first = registry.begin(session_id);
        assert!(!first.is_cancelled());

        let second = registry.begin(session_id);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn cancel_signals_running_execution() {
        let registry = SessionRegistry::new();
        let session_id = SessionId::new();
        let token = registry.begin(session_id);

        assert!(registry.cancel(session_id));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_without_execution_returns_false() {
        let registry = SessionRegistry::new();
        assert!(!registry.cancel(SessionId::new()));
    }

    #[test]
    fn finish_releases_own_handle() {
        let registry = SessionRegistry::new();
        let session_id = SessionId::new();
        let token = registry.begin(session_id);

        assert!(registry.is_active(session_id));
        registry.finish(session_id, &token);
        assert!(!registry.is_active(session_id));
    }

    #[test]
    fn superseded_finish_does_not_evict_successor() {
        let registry = SessionRegistry::new();
        let session_id = SessionId::new();

        let first = registry.begin(session_id);
        let _second = registry.begin(session_id);

        // The superseded execution finishing late must leave the successor
        // registered.
        registry.finish(session_id, &first);
        assert!(registry.is_active(session_id));
    }

    #[test]
    fn sweep_removes_and_cancels_stale_handles() {
        let registry = SessionRegistry::new();
        let session_id = SessionId::new();
        let token = registry.begin(session_id);

        let swept = registry.sweep_inactive(Duration::from_secs(0));
        assert_eq!(swept, 1);
        assert!(token.is_cancelled());
        assert!(!registry.is_active(session_id));
    }

    #[test]
    fn sweep_keeps_fresh_handles() {
        let registry = SessionRegistry::new();
        registry.begin(SessionId::new());

        let swept = registry.sweep_inactive(Duration::from_secs(3600));
        assert_eq!(swept, 0);
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn cloned_tokens_share_the_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(token.same_token(&clone));
        assert!(!token.same_token(&CancellationToken::new()));
    }
}
