//! Conversation memory manager.
//!
//! Owns, per session, a bounded window of recent turns plus a rolling
//! natural-language summary. Every T committed messages the window is
//! compacted: one gateway call folds the evicted history into the summary,
//! then the window is truncated to the last K turns. Summarization failure
//! never aborts the user-facing request; the previous summary survives
//! unchanged.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::state::ChatTurn;
use crate::domain::foundation::{SessionId, Timestamp};
use crate::ports::{AIProvider, CompletionRequest, MessageRole, RequestMetadata};

/// Sentinel used as the "previous summary" before the first compaction.
pub const SUMMARY_SENTINEL: &str = "(beginning of conversation)";

/// Memory sizing parameters.
#[derive(Debug, Clone, Copy)]
pub struct MemoryConfig {
    /// Maximum retained turns (W).
    pub window_size: usize,
    /// Turns kept after a summarization pass (K < W).
    pub retained_after_summary: usize,
    /// Summarize every T committed messages.
    pub summarize_threshold: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            retained_after_summary: 8,
            summarize_threshold: 5,
        }
    }
}

#[derive(Debug, Clone)]
struct SessionMemory {
    turns: Vec<ChatTurn>,
    summary: Option<String>,
    total_message_count: u64,
    last_active: Timestamp,
}

impl SessionMemory {
    fn empty() -> Self {
        Self {
            turns: Vec::new(),
            summary: None,
            total_message_count: 0,
            last_active: Timestamp::now(),
        }
    }
}

/// Per-session window + rolling-summary store.
///
/// The session map is mutex-guarded and never held across an await point;
/// per-session write serialization is guaranteed upstream by the session
/// registry.
pub struct ConversationMemoryManager {
    config: MemoryConfig,
    sessions: Mutex<HashMap<SessionId, SessionMemory>>,
}

impl ConversationMemoryManager {
    /// Creates an empty manager.
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Loads the session's window, summary, and committed message count.
    pub fn load(&self, session_id: SessionId) -> (Vec<ChatTurn>, Option<String>, u64) {
        let sessions = self.sessions.lock().expect("memory lock poisoned");
        match sessions.get(&session_id) {
            Some(memory) => (
                memory.turns.clone(),
                memory.summary.clone(),
                memory.total_message_count,
            ),
            None => (Vec::new(), None, 0),
        }
    }

    /// Installs caller-supplied context for a session not yet resident.
    ///
    /// A resident session keeps its own state; the caller's snapshot is
    /// assumed stale in that case.
    pub fn seed(
        &self,
        session_id: SessionId,
        turns: Vec<ChatTurn>,
        summary: Option<String>,
        total_message_count: u64,
    ) {
        let mut sessions = self.sessions.lock().expect("memory lock poisoned");
        sessions.entry(session_id).or_insert_with(|| {
            let mut turns = turns;
            let excess = turns.len().saturating_sub(self.config.window_size);
            turns.drain(..excess);
            SessionMemory {
                turns,
                summary,
                total_message_count,
                last_active: Timestamp::now(),
            }
        });
    }

    /// Trigger rule: summarize iff `n >= T && n % T == 0`.
    ///
    /// Fires exactly once per threshold crossing, bounding gateway calls.
    pub fn should_summarize(&self, total_message_count: u64) -> bool {
        let t = self.config.summarize_threshold;
        total_message_count >= t && total_message_count % t == 0
    }

    /// Commits one completed exchange and compacts when the threshold is
    /// crossed. Returns the rolling summary current after the commit.
    pub async fn commit(
        &self,
        session_id: SessionId,
        user_message: &str,
        ai_response: &str,
        reference_summary: Option<&str>,
        provider: &dyn AIProvider,
    ) -> Option<String> {
        let (total, previous_summary, recent) = {
            let mut sessions = self.sessions.lock().expect("memory lock poisoned");
            let memory = sessions
                .entry(session_id)
                .or_insert_with(SessionMemory::empty);

            memory.turns.push(ChatTurn::new(user_message, ai_response));
            if memory.turns.len() > self.config.window_size {
                let excess = memory.turns.len() - self.config.window_size;
                memory.turns.drain(..excess);
            }
            memory.total_message_count += 1;
            memory.last_active = Timestamp::now();

            let k = self.config.retained_after_summary;
            let recent: Vec<ChatTurn> = memory
                .turns
                .iter()
                .rev()
                .take(k)
                .rev()
                .cloned()
                .collect();
            (memory.total_message_count, memory.summary.clone(), recent)
        };

        if !self.should_summarize(total) {
            return previous_summary;
        }

        let new_summary = self
            .summarize(session_id, &previous_summary, &recent, reference_summary, provider)
            .await;

        let mut sessions = self.sessions.lock().expect("memory lock poisoned");
        let Some(memory) = sessions.get_mut(&session_id) else {
            // Cleared concurrently; nothing to write back.
            return new_summary;
        };
        memory.summary = new_summary.clone();
        let k = self.config.retained_after_summary;
        if memory.turns.len() > k {
            let excess = memory.turns.len() - k;
            memory.turns.drain(..excess);
        }
        new_summary
    }

    /// Single gateway call folding recent history into the rolling summary.
    ///
    /// Falls back to the unmodified previous summary on any failure.
    async fn summarize(
        &self,
        session_id: SessionId,
        previous_summary: &Option<String>,
        recent: &[ChatTurn],
        reference_summary: Option<&str>,
        provider: &dyn AIProvider,
    ) -> Option<String> {
        let mut context = String::new();
        context.push_str("Previous summary:\n");
        context.push_str(previous_summary.as_deref().unwrap_or(SUMMARY_SENTINEL));
        if let Some(reference) = reference_summary {
            context.push_str("\n\nReference document summary:\n");
            context.push_str(reference);
        }
        context.push_str("\n\nRecent conversation:\n");
        for turn in recent {
            context.push_str("User: ");
            context.push_str(&turn.user_text);
            context.push_str("\nAssistant: ");
            context.push_str(&turn.ai_text);
            context.push('\n');
        }

        let request = CompletionRequest::new(RequestMetadata::new(session_id, "summarize"))
            .with_system_prompt(
                "Condense the previous summary and the recent conversation into one short \
                 paragraph capturing goals, decisions, and open threads. Reply with the \
                 summary only.",
            )
            .with_message(MessageRole::User, context)
            .with_max_tokens(400)
            .with_temperature(0.2);

        match provider.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                Some(response.content.trim().to_string())
            }
            Ok(_) => {
                tracing::warn!(session_id = %session_id, "summarization returned empty content, keeping previous summary");
                previous_summary.clone()
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "summarization failed, keeping previous summary");
                previous_summary.clone()
            }
        }
    }

    /// Drops a session's memory entirely.
    pub fn clear(&self, session_id: SessionId) -> bool {
        self.sessions
            .lock()
            .expect("memory lock poisoned")
            .remove(&session_id)
            .is_some()
    }

    /// Removes sessions idle longer than `max_idle`. Returns the count.
    pub fn sweep_inactive(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().expect("memory lock poisoned");
        let before = sessions.len();
        sessions.retain(|session_id, memory| {
            let idle = memory.last_active.elapsed();
            let stale = idle.num_seconds() >= max_idle.as_secs() as i64;
            if stale {
                tracing::debug!(session_id = %session_id, idle_secs = idle.num_seconds(), "swept idle session memory");
            }
            !stale
        });
        before - sessions.len()
    }

    /// Number of resident sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("memory lock poisoned").len()
    }
}
