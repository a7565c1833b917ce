//! Submit message handler.
//!
//! The application-level entry point for one incoming chat message: claim
//! the session in the registry (cancelling any predecessor), hydrate the
//! session state from memory and caller context, drive the stage graph, and
//! close the stream with exactly one terminal event. Only a completed,
//! uncancelled execution is committed back into conversation memory.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::engine::{
    CachedPost, ChatTurn, ConversationMemoryManager, ExecutionOutcome, FinalResponse,
    PostContext, SessionRegistry, SessionState, StageGraphExecutor, StreamEmitter,
};
use crate::domain::engine::{CancellationToken, Platform, SocialDraft};
use crate::domain::foundation::SessionId;
use crate::ports::{AIProvider, ReferenceDocumentReader};

/// Caller-supplied session context accompanying one message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    /// Prior conversation turns, oldest first.
    #[serde(default)]
    pub prior_turns: Vec<ChatTurn>,
    /// Prior rolling summary.
    #[serde(default)]
    pub prior_summary: Option<String>,
    /// Prior committed message count.
    #[serde(default)]
    pub prior_message_count: u64,
    /// Previously generated drafts for this session.
    #[serde(default)]
    pub cached_posts: Vec<CachedPost>,
    /// Reference document id, resolvable through the document reader.
    #[serde(default)]
    pub document_id: Option<String>,
    /// Cached summary of the reference document.
    #[serde(default)]
    pub document_summary: Option<String>,
    /// Free-form style preferences.
    #[serde(default)]
    pub style_preferences: Option<String>,
}

/// Command to process one chat message.
#[derive(Debug, Clone)]
pub struct SubmitMessageCommand {
    /// The session this message belongs to.
    pub session_id: SessionId,
    /// The message content.
    pub message: String,
    /// Session context supplied by the caller.
    pub context: SessionContext,
}

impl SubmitMessageCommand {
    /// Creates a new command.
    pub fn new(session_id: SessionId, message: impl Into<String>, context: SessionContext) -> Self {
        Self {
            session_id,
            message: message.into(),
            context,
        }
    }
}

/// Synchronous result for non-streaming callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageOutcome {
    /// The session the message belonged to.
    pub session_id: SessionId,
    /// False when the execution was interrupted or failed.
    pub is_complete: bool,
    /// The user-facing text (answer, clarification, or draft body).
    pub content: String,
    /// Sanitized error note, when something went wrong.
    pub error: Option<String>,
    /// Rolling summary current after the commit.
    pub summary: Option<String>,
    /// Whether the result is a structured social post.
    pub is_social_post: bool,
    /// Platform of the structured draft, when applicable.
    pub platform: Option<Platform>,
    /// The structured draft, when applicable.
    pub structured_draft: Option<SocialDraft>,
}

impl MessageOutcome {
    fn incomplete(session_id: SessionId, error: Option<String>) -> Self {
        Self {
            session_id,
            is_complete: false,
            content: String::new(),
            error,
            summary: None,
            is_social_post: false,
            platform: None,
            structured_draft: None,
        }
    }
}

/// Message shown to the user when an execution fails unrecoverably.
const INTERNAL_ERROR_MESSAGE: &str =
    "Something went wrong while handling your message. Please try again.";

/// Handler driving one message through the engine.
pub struct SubmitMessageHandler {
    registry: Arc<SessionRegistry>,
    memory: Arc<ConversationMemoryManager>,
    executor: Arc<StageGraphExecutor>,
    provider: Arc<dyn AIProvider>,
    documents: Arc<dyn ReferenceDocumentReader>,
}

impl SubmitMessageHandler {
    /// Creates a new handler with its dependencies.
    pub fn new(
        registry: Arc<SessionRegistry>,
        memory: Arc<ConversationMemoryManager>,
        executor: Arc<StageGraphExecutor>,
        provider: Arc<dyn AIProvider>,
        documents: Arc<dyn ReferenceDocumentReader>,
    ) -> Self {
        Self {
            registry,
            memory,
            executor,
            provider,
            documents,
        }
    }

    /// Processes one message, emitting events on `emitter` as execution
    /// proceeds. The returned outcome mirrors the terminal event.
    pub async fn handle(&self, cmd: SubmitMessageCommand, emitter: StreamEmitter) -> MessageOutcome {
        let session_id = cmd.session_id;

        // Newest message wins: any running execution for this session is
        // cancelled before ours is registered.
        let token = self.registry.begin(session_id);
        let outcome = self.run(cmd, &token, &emitter).await;
        self.registry.finish(session_id, &token);
        outcome
    }

    async fn run(
        &self,
        cmd: SubmitMessageCommand,
        token: &CancellationToken,
        emitter: &StreamEmitter,
    ) -> MessageOutcome {
        let session_id = cmd.session_id;

        if let Err(err) = emitter.start().await {
            tracing::debug!(session_id = %session_id, error = %err, "caller went away before start");
        }

        // 1. Hydrate memory: caller context seeds a session we don't hold.
        self.memory.seed(
            session_id,
            cmd.context.prior_turns.clone(),
            cmd.context.prior_summary.clone(),
            cmd.context.prior_message_count,
        );
        let (recent, summary, total) = self.memory.load(session_id);

        // 2. Resolve reference material. The cached summary is preferred;
        //    full text is fetched only when no summary is available.
        let document_text = match (&cmd.context.document_id, &cmd.context.document_summary) {
            (Some(id), None) => match self.documents.fetch_full_text(id).await {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(session_id = %session_id, document_id = %id, error = %err, "reference document fetch failed");
                    None
                }
            },
            _ => None,
        };

        // 3. Build the execution state.
        let state = SessionState::new(session_id, &cmd.message)
            .with_post_context(PostContext {
                document_summary: cmd.context.document_summary.clone(),
                document_text,
                style_preferences: cmd.context.style_preferences.clone(),
            })
            .with_memory(recent, summary, total)
            .with_cached_posts(cmd.context.cached_posts.clone());

        // 4. Drive the stage graph.
        match self.executor.execute(state, token, emitter).await {
            Ok(ExecutionOutcome::Completed(final_state)) => {
                // A cancellation racing the last stage still discards the
                // output: nothing is committed and the stream closes with
                // `interrupted`.
                if token.is_cancelled() {
                    self.emit_interrupted(emitter, session_id, None).await;
                    return MessageOutcome::incomplete(session_id, None);
                }

                let Some(result) = final_state.result else {
                    tracing::error!(session_id = %session_id, "completed execution carried no result");
                    if let Err(err) = emitter.error(INTERNAL_ERROR_MESSAGE).await {
                        tracing::debug!(session_id = %session_id, error = %err, "caller went away before error");
                    }
                    return MessageOutcome::incomplete(
                        session_id,
                        Some(INTERNAL_ERROR_MESSAGE.to_string()),
                    );
                };

                let summary = self
                    .memory
                    .commit(
                        session_id,
                        &cmd.message,
                        result.content_text(),
                        cmd.context.document_summary.as_deref(),
                        self.provider.as_ref(),
                    )
                    .await;

                if let Err(err) = emitter.end(result.clone()).await {
                    tracing::debug!(session_id = %session_id, error = %err, "caller went away before end");
                }

                let (is_social_post, platform, structured_draft) = match &result {
                    FinalResponse::SocialPost {
                        platform, draft, ..
                    } => (true, Some(*platform), Some(draft.clone())),
                    FinalResponse::Answer { .. } => (false, None, None),
                };

                MessageOutcome {
                    session_id,
                    is_complete: true,
                    content: result.content_text().to_string(),
                    error: final_state.error,
                    summary,
                    is_social_post,
                    platform,
                    structured_draft,
                }
            }
            Ok(ExecutionOutcome::Cancelled(_)) => {
                self.emit_interrupted(emitter, session_id, None).await;
                MessageOutcome::incomplete(session_id, None)
            }
            Err(err) => {
                // Full detail stays server-side; the caller sees a
                // sanitized message.
                tracing::error!(session_id = %session_id, error = %err, "execution failed");
                if let Err(emit_err) = emitter.error(INTERNAL_ERROR_MESSAGE).await {
                    tracing::debug!(session_id = %session_id, error = %emit_err, "caller went away before error");
                }
                MessageOutcome::incomplete(session_id, Some(INTERNAL_ERROR_MESSAGE.to_string()))
            }
        }
    }

    async fn emit_interrupted(
        &self,
        emitter: &StreamEmitter,
        session_id: SessionId,
        reason: Option<String>,
    ) {
        if let Err(err) = emitter.interrupted(reason).await {
            tracing::debug!(session_id = %session_id, error = %err, "caller went away before interrupted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDocumentReader, MockAIProvider};
    use crate::domain::engine::{MemoryConfig, StageGraph};

    fn handler_with(provider: MockAIProvider) -> SubmitMessageHandler {
        let provider = Arc::new(provider);
        SubmitMessageHandler::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(ConversationMemoryManager::new(MemoryConfig::default())),
            Arc::new(StageGraphExecutor::new(StageGraph::standard(
                provider.clone(),
                0.7,
            ))),
            provider,
            Arc::new(InMemoryDocumentReader::new()),
        )
    }

    #[tokio::test]
    async fn answer_outcome_is_complete() {
        let provider = MockAIProvider::new()
            .with_response(r#"{"intent": "support", "confidence": 0.9, "reasoning": "q"}"#)
            .with_response("Here is your answer.");
        let handler = handler_with(provider);

        let session_id = SessionId::new();
        let (emitter, _rx) = StreamEmitter::channel(session_id, 64);
        let outcome = handler
            .handle(
                SubmitMessageCommand::new(session_id, "What is Rust?", SessionContext::default()),
                emitter,
            )
            .await;

        assert!(outcome.is_complete);
        assert_eq!(outcome.content, "Here is your answer.");
        assert!(!outcome.is_social_post);
        assert!(outcome.structured_draft.is_none());
    }

    #[tokio::test]
    async fn social_outcome_carries_draft() {
        let provider = MockAIProvider::new()
            .with_response(r#"{"intent": "social_content", "confidence": 0.95, "reasoning": "post"}"#)
            .with_response(r#"{"platform": "linkedin", "confidence": 0.92, "reasoning": "named"}"#)
            .with_response(r#"{"main_text": "Draft body", "code_examples": [], "visual_elements": []}"#);
        let handler = handler_with(provider);

        let session_id = SessionId::new();
        let (emitter, _rx) = StreamEmitter::channel(session_id, 64);
        let outcome = handler
            .handle(
                SubmitMessageCommand::new(
                    session_id,
                    "Create a LinkedIn post about hiring",
                    SessionContext::default(),
                ),
                emitter,
            )
            .await;

        assert!(outcome.is_complete);
        assert!(outcome.is_social_post);
        assert_eq!(outcome.platform, Some(Platform::LinkedIn));
        assert_eq!(outcome.structured_draft.unwrap().main_text, "Draft body");
    }

    #[tokio::test]
    async fn completed_execution_commits_memory() {
        let provider = MockAIProvider::new()
            .with_response(r#"{"intent": "support", "confidence": 0.9, "reasoning": "q"}"#)
            .with_response("Answer.");
        let handler = handler_with(provider);

        let session_id = SessionId::new();
        let (emitter, _rx) = StreamEmitter::channel(session_id, 64);
        handler
            .handle(
                SubmitMessageCommand::new(session_id, "hi", SessionContext::default()),
                emitter,
            )
            .await;

        let (turns, _, count) = handler.memory.load(session_id);
        assert_eq!(count, 1);
        assert_eq!(turns[0].user_text, "hi");
        assert_eq!(turns[0].ai_text, "Answer.");
    }
}
