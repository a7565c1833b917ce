//! Social-post creator stage.
//!
//! One structured gateway call producing a platform-specific draft. The
//! separation contract is enforced on the output: fenced code in the main
//! text is extracted into `code_examples` unless the user explicitly asked
//! for inline code. Cached drafts are passed as context for duplicate
//! avoidance.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{
    call_structured, generic_suggestions, inline_code_requested, Stage, StageContext,
    FALLBACK_APOLOGY,
};
use crate::domain::engine::errors::StageError;
use crate::domain::engine::graph::StageKey;
use crate::domain::engine::events::ContentFragment;
use crate::domain::engine::platform::Platform;
use crate::domain::engine::stages::history_block;
use crate::domain::engine::state::{
    CodeExample, FinalResponse, SessionState, SocialDraft, StageUpdate,
};
use crate::ports::{AIProvider, CompletionRequest, MessageRole, RequestMetadata};

/// Wire schema for generated drafts.
#[derive(Debug, Deserialize)]
pub(super) struct DraftWire {
    pub main_text: String,
    #[serde(default)]
    pub code_examples: Vec<CodeExampleWire>,
    #[serde(default)]
    pub visual_elements: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CodeExampleWire {
    #[serde(default)]
    pub language: String,
    pub code: String,
}

impl DraftWire {
    /// Converts wire output into a conforming draft.
    pub(super) fn into_draft(self, inline_requested: bool) -> SocialDraft {
        let mut draft = SocialDraft {
            main_text: self.main_text,
            code_examples: self
                .code_examples
                .into_iter()
                .map(|c| CodeExample {
                    language: c.language,
                    code: c.code,
                })
                .collect(),
            visual_elements: self.visual_elements,
        };
        if draft.check_separation(inline_requested).is_err() && !inline_requested {
            draft.extract_inline_code();
        }
        draft
    }
}

/// Creates a new social-post draft.
pub struct PostCreatorStage {
    provider: Arc<dyn AIProvider>,
}

impl PostCreatorStage {
    /// Creates the stage.
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self { provider }
    }

    fn build_request(&self, state: &SessionState, platform: Platform) -> CompletionRequest {
        let mut prompt = String::new();
        let history = history_block(state, 4);
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
        if let Some(style) = &state.post_context.style_preferences {
            prompt.push_str("Style preferences: ");
            prompt.push_str(style);
            prompt.push('\n');
        }
        if !state.cached_posts.is_empty() {
            prompt.push_str("Existing drafts (do not repeat them):\n");
            for post in &state.cached_posts {
                prompt.push_str("- ");
                prompt.push_str(&post.preview(80));
                prompt.push('\n');
            }
        }
        prompt.push_str("Platform: ");
        prompt.push_str(platform.as_str());
        prompt.push_str("\nRequest: ");
        prompt.push_str(&state.user_message);

        CompletionRequest::new(RequestMetadata::new(state.session_id, "post_creator"))
            .with_system_prompt(
                "Draft a social-media post for the given platform. Reply with JSON only: \
                 {\"main_text\": \"...\", \"code_examples\": [{\"language\": \"...\", \
                 \"code\": \"...\"}], \"visual_elements\": [\"...\"]}. Keep code snippets \
                 and visual ideas out of main_text; they belong in their own fields.",
            )
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(1200)
            .with_temperature(0.8)
    }

    fn fallback() -> StageUpdate {
        StageUpdate::with_result(FinalResponse::Answer {
            text: FALLBACK_APOLOGY.to_string(),
            suggested_options: generic_suggestions(),
        })
        .noting_error("post generation failed")
    }

    fn suggestions(platform: Platform) -> Vec<String> {
        vec![
            "Make it shorter".to_string(),
            "Change the tone".to_string(),
            format!("Write a version for another platform than {platform}"),
        ]
    }
}

#[async_trait]
impl Stage for PostCreatorStage {
    fn key(&self) -> StageKey {
        StageKey::PostCreator
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &StageContext<'_>,
    ) -> Result<StageUpdate, StageError> {
        let platform = state
            .platform_decision
            .as_ref()
            .and_then(|d| d.platform)
            .ok_or(StageError::MissingUpstream("platform_decision.platform"))?;

        let request = self.build_request(state, platform);
        let inline_requested = inline_code_requested(&state.user_message);

        let wire =
            match call_structured::<DraftWire>(self.provider.as_ref(), ctx.token, request).await {
                Ok(wire) => wire,
                Err(StageError::Cancelled) => return Err(StageError::Cancelled),
                Err(err) => {
                    tracing::warn!(session_id = %state.session_id, error = %err, "post creation failed, using fallback");
                    return Ok(Self::fallback());
                }
            };

        let draft = wire.into_draft(inline_requested);
        if draft.check_separation(inline_requested).is_err() {
            tracing::warn!(session_id = %state.session_id, "draft violates separation contract after repair, using fallback");
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
            platform,
            draft,
            edited_post_id: None,
            suggested_options: Self::suggestions(platform),
        }))
    }
}
