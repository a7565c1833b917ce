//! Social-post editor stage.
//!
//! Rewrites the draft the selector resolved, carrying the target's platform
//! and id through to the result. Output goes through the same separation
//! enforcement as freshly created drafts.

use async_trait::async_trait;
use std::sync::Arc;

use super::post_creator::DraftWire;
use super::{
    call_structured, generic_suggestions, inline_code_requested, Stage, StageContext,
    FALLBACK_APOLOGY,
};
use crate::domain::engine::errors::StageError;
use crate::domain::engine::events::ContentFragment;
use crate::domain::engine::graph::StageKey;
use crate::domain::engine::state::{FinalResponse, SessionState, StageUpdate};
use crate::ports::{AIProvider, CompletionRequest, MessageRole, RequestMetadata};

/// Edits an existing cached draft.
pub struct PostEditorStage {
    provider: Arc<dyn AIProvider>,
}

impl PostEditorStage {
    /// Creates the stage.
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self { provider }
    }

    fn fallback() -> StageUpdate {
        StageUpdate::with_result(FinalResponse::Answer {
            text: FALLBACK_APOLOGY.to_string(),
            suggested_options: generic_suggestions(),
        })
        .noting_error("post edit failed")
    }
}

#[async_trait]
impl Stage for PostEditorStage {
    fn key(&self) -> StageKey {
        StageKey::PostEditor
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &StageContext<'_>,
    ) -> Result<StageUpdate, StageError> {
        let target_id = state
            .edit_target
            .ok_or(StageError::MissingUpstream("edit_target"))?;
        let target = state
            .cached_post(target_id)
            .ok_or(StageError::MissingUpstream("cached_posts entry for edit_target"))?;

        let mut prompt = String::new();
        prompt.push_str("Current draft (");
        prompt.push_str(target.platform.as_str());
        prompt.push_str("):\n");
        prompt.push_str(&target.draft.main_text);
        prompt.push('\n');
        if !target.draft.code_examples.is_empty() {
            prompt.push_str("Attached code examples:\n");
            for example in &target.draft.code_examples {
                prompt.push_str("```");
                prompt.push_str(&example.language);
                prompt.push('\n');
                prompt.push_str(&example.code);
                prompt.push_str("\n```\n");
            }
        }
        if let Some(style) = &state.post_context.style_preferences {
            prompt.push_str("Style preferences: ");
            prompt.push_str(style);
            prompt.push('\n');
        }
        prompt.push_str("Edit request: ");
        prompt.push_str(&state.user_message);

        let request = CompletionRequest::new(RequestMetadata::new(state.session_id, "post_editor"))
            .with_system_prompt(
                "Apply the requested edit to the draft, preserving its platform \
                 conventions. Reply with JSON only: {\"main_text\": \"...\", \
                 \"code_examples\": [{\"language\": \"...\", \"code\": \"...\"}], \
                 \"visual_elements\": [\"...\"]}. Keep code snippets and visual ideas \
                 out of main_text.",
            )
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(1200)
            .with_temperature(0.7);

        let inline_requested = inline_code_requested(&state.user_message);
        let wire =
            match call_structured::<DraftWire>(self.provider.as_ref(), ctx.token, request).await {
                Ok(wire) => wire,
                Err(StageError::Cancelled) => return Err(StageError::Cancelled),
                Err(err) => {
                    tracing::warn!(session_id = %state.session_id, error = %err, "post edit failed, using fallback");
                    return Ok(Self::fallback());
                }
            };

        let draft = wire.into_draft(inline_requested);
        if draft.check_separation(inline_requested).is_err() {
            tracing::warn!(session_id = %state.session_id, "edited draft violates separation contract after repair, using fallback");
            return Ok(Self::fallback());
        }

        if let Err(err) = ctx
            .emitter
            .content(ContentFragment::Draft {
                draft: draft.clone(),
            })
            .await
        {
            tracing::debug!(session_id = %state.session_id, error = %err, "dropping draft fragment, stream closed");
        }

        Ok(StageUpdate::with_result(FinalResponse::SocialPost {
            platform: target.platform,
            draft,
            edited_post_id: Some(target_id),
            suggested_options: vec![
                "Undo this edit".to_string(),
                "Make it shorter".to_string(),
                "Create a new post instead".to_string(),
            ],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAIProvider;
    use crate::domain::engine::events::StreamEmitter;
    use crate::domain::engine::platform::Platform;
    use crate::domain::engine::registry::CancellationToken;
    use crate::domain::engine::state::{CachedPost, SocialDraft};
    use crate::domain::foundation::{PostId, SessionId};

    fn state_with_target(message: &str) -> (SessionState, PostId) {
        let post = CachedPost {
            id: PostId::new(),
            platform: Platform::LinkedIn,
            draft: SocialDraft::text("Original hiring post"),
        };
        let id = post.id;
        let mut state = SessionState::new(SessionId::new(), message).with_cached_posts(vec![post]);
        state.edit_target = Some(id);
        (state, id)
    }

    async fn run_stage(provider: MockAIProvider, state: &SessionState) -> StageUpdate {
        let stage = PostEditorStage::new(Arc::new(provider));
        let token = CancellationToken::new();
        let (emitter, _rx) = StreamEmitter::channel(state.session_id, 16);
        emitter.start().await.unwrap();
        let ctx = StageContext {
            token: &token,
            emitter: &emitter,
        };
        stage.run(state, &ctx).await.unwrap()
    }

    #[tokio::test]
    async fn edits_target_and_keeps_its_identity() {
        let provider = MockAIProvider::new().with_response(
            r#"{"main_text": "Sharper hiring post", "code_examples": [], "visual_elements": []}"#,
        );
        let (state, id) = state_with_target("make it more engaging");

        let update = run_stage(provider, &state).await;
        match update.result.unwrap() {
            FinalResponse::SocialPost {
                platform,
                draft,
                edited_post_id,
                ..
            } => {
                assert_eq!(platform, Platform::LinkedIn);
                assert_eq!(edited_post_id, Some(id));
                assert_eq!(draft.main_text, "Sharper hiring post");
            }
            other => panic!("expected social post, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn gateway_failure_degrades_to_fallback() {
        let provider = MockAIProvider::new().always_failing();
        let (state, _) = state_with_target("make it more engaging");

        let update = run_stage(provider, &state).await;
        assert!(matches!(update.result, Some(FinalResponse::Answer { .. })));
        assert!(update.error.is_some());
    }

    #[tokio::test]
    async fn missing_target_is_unrecoverable() {
        let provider = MockAIProvider::new().with_response("{}");
        let state = SessionState::new(SessionId::new(), "edit the post");
        let stage = PostEditorStage::new(Arc::new(provider));
        let token = CancellationToken::new();
        let (emitter, _rx) = StreamEmitter::channel(state.session_id, 8);
        emitter.start().await.unwrap();
        let ctx = StageContext {
            token: &token,
            emitter: &emitter,
        };

        let result = stage.run(&state, &ctx).await;
        assert!(matches!(result, Err(StageError::MissingUpstream(_))));
    }
}
