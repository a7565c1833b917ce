//! Stage graph executor.
//!
//! Drives one execution through the graph: check the cancellation token,
//! run the stage, merge its partial update, stop as soon as the terminal
//! result is set, otherwise follow the edge table. Purely sequential per
//! session; concurrency across sessions happens above this layer.

use super::errors::{EngineError, StageError};
use super::events::StreamEmitter;
use super::graph::StageGraph;
use super::registry::CancellationToken;
use super::stages::StageContext;
use super::state::SessionState;

/// How one execution ended.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The graph reached a terminal result.
    Completed(SessionState),
    /// The cancellation token was signaled; partial state is discarded by
    /// the caller.
    Cancelled(SessionState),
}

/// Executes session states against a static stage graph.
pub struct StageGraphExecutor {
    graph: StageGraph,
}

impl StageGraphExecutor {
    /// Creates an executor over the given graph.
    pub fn new(graph: StageGraph) -> Self {
        Self { graph }
    }

    /// Runs one execution to a terminal result or cancellation.
    ///
    /// Stage-local recoverable failures become an `error` note on the state
    /// and the walk continues; unrecoverable failures abort the execution
    /// with an `EngineError` for the caller to translate into an `error`
    /// event.
    pub async fn execute(
        &self,
        mut state: SessionState,
        token: &CancellationToken,
        emitter: &StreamEmitter,
    ) -> Result<ExecutionOutcome, EngineError> {
        let mut current = Some(self.graph.entry());

        while let Some(key) = current {
            if token.is_cancelled() {
                tracing::debug!(session_id = %state.session_id, stage = ?key, "execution cancelled before stage");
                return Ok(ExecutionOutcome::Cancelled(state));
            }

            let stage = self.graph.stage(key)?;
            let ctx = StageContext { token, emitter };

            match stage.run(&state, &ctx).await {
                Ok(update) => state.apply(update)?,
                Err(StageError::Cancelled) => {
                    tracing::debug!(session_id = %state.session_id, stage = ?key, "execution cancelled inside stage");
                    return Ok(ExecutionOutcome::Cancelled(state));
                }
                Err(err) if err.is_unrecoverable() => {
                    return Err(EngineError::Stage { stage: key, source: err });
                }
                Err(err) => {
                    // Stages normally absorb recoverable failures; one that
                    // escapes still must not abort the graph.
                    tracing::warn!(session_id = %state.session_id, stage = ?key, error = %err, "stage failed recoverably");
                    state.error = Some(err.to_string());
                }
            }

            if state.is_terminal() {
                break;
            }
            current = self.graph.next(key, &state)?;
        }

        if !state.is_terminal() {
            return Err(EngineError::NoTerminalResult);
        }
        Ok(ExecutionOutcome::Completed(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAIProvider;
    use crate::domain::engine::state::FinalResponse;
    use crate::domain::foundation::SessionId;
    use std::sync::Arc;

    fn executor(provider: MockAIProvider) -> StageGraphExecutor {
        StageGraphExecutor::new(StageGraph::standard(Arc::new(provider), 0.7))
    }

    async fn run(provider: MockAIProvider, message: &str) -> ExecutionOutcome {
        let state = SessionState::new(SessionId::new(), message);
        let token = CancellationToken::new();
        let (emitter, _rx) = StreamEmitter::channel(state.session_id, 64);
        emitter.start().await.unwrap();
        executor(provider)
            .execute(state, &token, &emitter)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn question_path_completes_with_answer() {
        let provider = MockAIProvider::new()
            .with_response(r#"{"intent": "support", "confidence": 0.9, "reasoning": "question"}"#)
            .with_response("Rust is a systems programming language.");

        match run(provider, "What is Rust?").await {
            ExecutionOutcome::Completed(state) => match state.result.unwrap() {
                FinalResponse::Answer { text, .. } => {
                    assert_eq!(text, "Rust is a systems programming language.");
                }
                other => panic!("expected answer, got {other:?}"),
            },
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn social_path_completes_with_draft() {
        let provider = MockAIProvider::new()
            .with_response(r#"{"intent": "social_content", "confidence": 0.95, "reasoning": "post"}"#)
            .with_response(r#"{"platform": "linkedin", "confidence": 0.92, "reasoning": "named"}"#)
            .with_response(r#"{"main_text": "Remote work tip: protect your mornings.", "code_examples": [], "visual_elements": []}"#);

        match run(provider, "Create a LinkedIn post about remote work tips").await {
            ExecutionOutcome::Completed(state) => match state.result.unwrap() {
                FinalResponse::SocialPost { draft, .. } => {
                    assert!(!draft.main_text.is_empty());
                }
                other => panic!("expected social post, got {other:?}"),
            },
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pre_cancelled_token_stops_before_first_stage() {
        let provider = MockAIProvider::new().with_default_response("should never be called");
        let state = SessionState::new(SessionId::new(), "hello");
        let token = CancellationToken::new();
        token.cancel();
        let (emitter, _rx) = StreamEmitter::channel(state.session_id, 8);
        emitter.start().await.unwrap();

        let exec = executor(provider);
        match exec.execute(state, &token, &emitter).await.unwrap() {
            ExecutionOutcome::Cancelled(state) => assert!(state.result.is_none()),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn gateway_outage_still_completes() {
        let provider = MockAIProvider::new().always_failing();

        match run(provider, "anything at all").await {
            ExecutionOutcome::Completed(state) => {
                let result = state.result.unwrap();
                assert!(!result.content_text().is_empty());
                assert!(!result.suggested_options().is_empty());
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }
}
