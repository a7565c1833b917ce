//! Question-answer generator stage.
//!
//! Streams a free-form answer for general/support and document questions,
//! forwarding text deltas to the execution's emitter as they arrive. The
//! cancellation token is re-checked before the call and between chunks so a
//! superseded execution stops mid-generation. Gateway failure at any point
//! degrades to the fixed apologetic fallback, still a normal completion.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

use super::{generic_suggestions, guard, Stage, StageContext, FALLBACK_APOLOGY};
use crate::domain::engine::errors::StageError;
use crate::domain::engine::graph::StageKey;
use crate::domain::engine::intent::Intent;
use crate::domain::engine::stages::history_block;
use crate::domain::engine::state::{FinalResponse, SessionState, StageUpdate};
use crate::ports::{AIProvider, CompletionRequest, MessageRole, RequestMetadata};

/// Generates streamed free-form answers.
pub struct QuestionAnswerStage {
    provider: Arc<dyn AIProvider>,
}

impl QuestionAnswerStage {
    /// Creates the stage.
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self { provider }
    }

    fn build_request(&self, state: &SessionState) -> CompletionRequest {
        let mut prompt = String::new();
        let history = history_block(state, 8);
        if !history.is_empty() {
            prompt.push_str(&history);
            prompt.push('\n');
        }
        if let Some(text) = &state.post_context.document_text {
            prompt.push_str("Reference document:\n");
            prompt.push_str(text);
            prompt.push('\n');
        } else if let Some(summary) = &state.post_context.document_summary {
            prompt.push_str("Reference document summary:\n");
            prompt.push_str(summary);
            prompt.push('\n');
        }
        prompt.push_str("User: ");
        prompt.push_str(&state.user_message);

        CompletionRequest::new(RequestMetadata::new(state.session_id, "question_answer"))
            .with_system_prompt(
                "You are a helpful assistant for a social-content workspace. Answer the \
                 user's question directly and concisely, using the reference document \
                 when it is relevant.",
            )
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(1500)
            .with_temperature(0.7)
    }

    /// Follow-up options offered alongside the answer.
    fn suggestions(state: &SessionState) -> Vec<String> {
        match state.intent.as_ref().map(|d| d.intent) {
            Some(Intent::DocumentQuestion) => vec![
                "Summarize the document".to_string(),
                "Create a social post from it".to_string(),
                "Ask a follow-up question".to_string(),
            ],
            _ => vec![
                "Tell me more".to_string(),
                "Create a social post about this".to_string(),
                "Ask something else".to_string(),
            ],
        }
    }

    fn fallback() -> StageUpdate {
        StageUpdate::with_result(FinalResponse::Answer {
            text: FALLBACK_APOLOGY.to_string(),
            suggested_options: generic_suggestions(),
        })
        .noting_error("answer generation failed")
    }
}

#[async_trait]
impl Stage for QuestionAnswerStage {
    fn key(&self) -> StageKey {
        StageKey::QuestionAnswer
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &StageContext<'_>,
    ) -> Result<StageUpdate, StageError> {
        let request = self.build_request(state);

        guard(ctx.token)?;
        let mut stream = match self.provider.stream_complete(request).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(session_id = %state.session_id, error = %err, "answer stream failed to open, using fallback");
                return Ok(Self::fallback());
            }
        };
        guard(ctx.token)?;

        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            guard(ctx.token)?;
            match chunk {
                Ok(chunk) => {
                    let is_final = chunk.is_final();
                    if !chunk.delta.is_empty() {
                        answer.push_str(&chunk.delta);
                        if let Err(err) = ctx.emitter.text_delta(chunk.delta).await {
                            tracing::debug!(session_id = %state.session_id, error = %err, "dropping answer delta, stream closed");
                        }
                    }
                    if is_final {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(session_id = %state.session_id, error = %err, "answer stream failed mid-generation, using fallback");
                    return Ok(Self::fallback());
                }
            }
        }

        if answer.trim().is_empty() {
            tracing::warn!(session_id = %state.session_id, "answer stream produced no content, using fallback");
            return Ok(Self::fallback());
        }

        Ok(StageUpdate::with_result(FinalResponse::Answer {
            text: answer,
            suggested_options: Self::suggestions(state),
        }))
    }
}
