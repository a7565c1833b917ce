//! Stage implementations for the orchestration graph.
//!
//! Each stage is one step of an execution, typically a single gateway call
//! plus validation and fallback logic. Stages read the session state and
//! return a partial update; they never mutate the state directly. Gateway
//! and schema failures are absorbed here, behind deterministic defaults or
//! apologetic fallbacks, so the executor only ever sees unrecoverable
//! failures.

mod clarification;
mod intent_classifier;
mod platform_classifier;
mod post_creator;
mod post_editor;
mod post_selector;
mod question_answer;

pub use clarification::PlatformClarificationStage;
pub use intent_classifier::IntentClassifierStage;
pub use platform_classifier::PlatformClassifierStage;
pub use post_creator::PostCreatorStage;
pub use post_editor::PostEditorStage;
pub use post_selector::PostSelectorStage;
pub use question_answer::QuestionAnswerStage;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::errors::StageError;
use super::events::StreamEmitter;
use super::graph::StageKey;
use super::registry::CancellationToken;
use super::state::{SessionState, StageUpdate};
use crate::ports::{AIProvider, CompletionRequest};

/// Execution-scoped facilities handed to every stage.
pub struct StageContext<'a> {
    /// The execution's cancellation token.
    pub token: &'a CancellationToken,
    /// The execution's event emitter.
    pub emitter: &'a StreamEmitter,
}

/// One node of the stage graph.
#[async_trait]
pub trait Stage: Send + Sync {
    /// The graph key this stage is registered under.
    fn key(&self) -> StageKey;

    /// Runs the stage against the current state.
    async fn run(
        &self,
        state: &SessionState,
        ctx: &StageContext<'_>,
    ) -> Result<StageUpdate, StageError>;
}

/// Fixed apologetic message used when a content generator cannot produce
/// its payload.
pub(crate) const FALLBACK_APOLOGY: &str =
    "Sorry, I couldn't finish that request just now. Please try again in a moment.";

/// Generic follow-up options, used with fallback payloads.
pub(crate) fn generic_suggestions() -> Vec<String> {
    vec![
        "Try asking again".to_string(),
        "Create a social post".to_string(),
        "Ask about the reference document".to_string(),
    ]
}

/// Bails out with `StageError::Cancelled` when the token is signaled.
pub(crate) fn guard(token: &CancellationToken) -> Result<(), StageError> {
    if token.is_cancelled() {
        Err(StageError::Cancelled)
    } else {
        Ok(())
    }
}

/// Issues a completion expected to contain a single JSON value matching
/// `T`, re-checking the cancellation token around the suspension point.
pub(crate) async fn call_structured<T: DeserializeOwned>(
    provider: &dyn AIProvider,
    token: &CancellationToken,
    request: CompletionRequest,
) -> Result<T, StageError> {
    guard(token)?;
    let response = provider.complete(request).await?;
    guard(token)?;

    let payload = extract_json_payload(&response.content);
    serde_json::from_str(payload).map_err(|e| {
        StageError::MalformedOutput(format!("{e} in model output: {}", truncate(payload, 120)))
    })
}

/// Strips a surrounding markdown code fence from model output, if any.
pub(crate) fn extract_json_payload(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = after_open
        .split_once('\n')
        .map(|(_, rest)| rest)
        .unwrap_or(after_open);
    body.rsplit_once("```")
        .map(|(inner, _)| inner.trim())
        .unwrap_or_else(|| body.trim())
}

/// Renders the bounded recent history for a prompt.
pub(crate) fn history_block(state: &SessionState, max_turns: usize) -> String {
    let mut block = String::new();
    if let Some(summary) = &state.rolling_summary {
        block.push_str("Conversation summary: ");
        block.push_str(summary);
        block.push('\n');
    }
    for turn in state.recent_messages.iter().rev().take(max_turns).rev() {
        block.push_str("User: ");
        block.push_str(&turn.user_text);
        block.push_str("\nAssistant: ");
        block.push_str(&turn.ai_text);
        block.push('\n');
    }
    block
}

/// Whether the user explicitly asked for code inside the post text.
pub(crate) fn inline_code_requested(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("inline code")
        || lowered.contains("code in the post")
        || lowered.contains("code in the text")
        || lowered.contains("embed the code")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect::<String>() + "…"
    }
}
