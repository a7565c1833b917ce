//! Post selector stage.
//!
//! Runs on the social path whenever cached drafts exist, and decides
//! between creating a new post and editing an existing one. An edit must
//! resolve to exactly one target: an explicit platform mention narrows the
//! candidates, a single survivor may be edited, and anything still
//! ambiguous terminates with a clarification listing short previews of each
//! candidate — never a guess.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{call_structured, Stage, StageContext};
use crate::domain::engine::errors::StageError;
use crate::domain::engine::graph::StageKey;
use crate::domain::engine::platform::{ExplicitMention, Platform};
use crate::domain::engine::state::{CachedPost, FinalResponse, SessionState, StageUpdate};
use crate::domain::foundation::PostId;
use crate::ports::{AIProvider, CompletionRequest, MessageRole, RequestMetadata};

const PREVIEW_CHARS: usize = 60;

/// Wire schema the model must produce.
#[derive(Debug, Deserialize)]
struct SelectorWire {
    /// "create" or "edit".
    action: String,
    #[serde(default)]
    selected_post_id: Option<String>,
}

/// Resolves whether the request targets an existing cached draft.
pub struct PostSelectorStage {
    provider: Arc<dyn AIProvider>,
}

impl PostSelectorStage {
    /// Creates the stage.
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self { provider }
    }

    fn build_request(&self, state: &SessionState) -> CompletionRequest {
        let mut prompt = String::new();
        prompt.push_str("Cached drafts:\n");
        for post in &state.cached_posts {
            prompt.push_str(&format!("- id {}: {}\n", post.id, post.preview(PREVIEW_CHARS)));
        }
        prompt.push_str("Message: ");
        prompt.push_str(&state.user_message);

        CompletionRequest::new(RequestMetadata::new(state.session_id, "post_selector"))
            .with_system_prompt(
                "Does the message ask to edit one of the cached drafts, or create a new \
                 one? Reply with JSON only: {\"action\": \"create\" | \"edit\", \
                 \"selected_post_id\": \"<id>\" | null}. Select an id only when the \
                 message clearly refers to that specific draft.",
            )
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(150)
            .with_temperature(0.0)
    }

    /// Candidates after narrowing by an explicit platform mention.
    fn candidates<'a>(state: &'a SessionState) -> Vec<&'a CachedPost> {
        match Platform::detect_explicit(&state.user_message) {
            ExplicitMention::One(platform) => {
                let narrowed: Vec<&CachedPost> = state
                    .cached_posts
                    .iter()
                    .filter(|p| p.platform == platform)
                    .collect();
                if narrowed.is_empty() {
                    state.cached_posts.iter().collect()
                } else {
                    narrowed
                }
            }
            _ => state.cached_posts.iter().collect(),
        }
    }

    /// Whether the message reads like an edit of existing content.
    fn looks_like_edit(message: &str) -> bool {
        let lowered = message.to_lowercase();
        ["edit", "change", "update", "rewrite", "revise", "make it", "shorten", "improve"]
            .iter()
            .any(|verb| lowered.contains(verb))
    }

    fn clarification(candidates: &[&CachedPost]) -> StageUpdate {
        let previews: Vec<String> = candidates
            .iter()
            .map(|p| p.preview(PREVIEW_CHARS))
            .collect();
        let mut text =
            String::from("Which post would you like to edit? Here's what I have so far:\n");
        for preview in &previews {
            text.push_str("- ");
            text.push_str(preview);
            text.push('\n');
        }
        StageUpdate::with_result(FinalResponse::Answer {
            text,
            suggested_options: previews,
        })
    }
}

#[async_trait]
impl Stage for PostSelectorStage {
    fn key(&self) -> StageKey {
        StageKey::PostSelector
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &StageContext<'_>,
    ) -> Result<StageUpdate, StageError> {
        if state.cached_posts.is_empty() {
            return Err(StageError::MissingUpstream("cached_posts"));
        }

        let request = self.build_request(state);
        let wire = match call_structured::<SelectorWire>(self.provider.as_ref(), ctx.token, request)
            .await
        {
            Ok(wire) => Some(wire),
            Err(StageError::Cancelled) => return Err(StageError::Cancelled),
            Err(err) => {
                tracing::warn!(session_id = %state.session_id, error = %err, "post selection failed, deciding deterministically");
                None
            }
        };

        let wants_edit = match &wire {
            Some(w) => w.action.eq_ignore_ascii_case("edit"),
            None => Self::looks_like_edit(&state.user_message),
        };

        if !wants_edit {
            // A fresh draft; the creator handles duplicate avoidance.
            return Ok(StageUpdate::none());
        }

        let candidates = Self::candidates(state);
        if candidates.len() == 1 {
            return Ok(StageUpdate::with_edit_target(candidates[0].id));
        }

        // The model's pick counts only when the message itself disambiguates.
        let explicit_platform = matches!(
            Platform::detect_explicit(&state.user_message),
            ExplicitMention::One(_)
        );
        if explicit_platform {
            if let Some(id) = wire
                .as_ref()
                .and_then(|w| w.selected_post_id.as_deref())
                .and_then(|raw| raw.parse::<PostId>().ok())
            {
                if candidates.iter().any(|p| p.id == id) {
                    return Ok(StageUpdate::with_edit_target(id));
                }
            }
        }

        tracing::debug!(
            session_id = %state.session_id,
            candidates = candidates.len(),
            "edit request is ambiguous, asking the user"
        );
        Ok(Self::clarification(&candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAIProvider;
    use crate::domain::engine::events::StreamEmitter;
    use crate::domain::engine::registry::CancellationToken;
    use crate::domain::engine::state::SocialDraft;
    use crate::domain::foundation::SessionId;

    fn cached(platform: Platform, text: &str) -> CachedPost {
        CachedPost {
            id: PostId::new(),
            platform,
            draft: SocialDraft::text(text),
        }
    }

    fn state_with_posts(message: &str, posts: Vec<CachedPost>) -> SessionState {
        SessionState::new(SessionId::new(), message).with_cached_posts(posts)
    }

    async fn run_stage(provider: MockAIProvider, state: &SessionState) -> StageUpdate {
        let stage = PostSelectorStage::new(Arc::new(provider));
        let token = CancellationToken::new();
        let (emitter, _rx) = StreamEmitter::channel(state.session_id, 8);
        emitter.start().await.unwrap();
        let ctx = StageContext {
            token: &token,
            emitter: &emitter,
        };
        stage.run(state, &ctx).await.unwrap()
    }

    #[tokio::test]
    async fn ambiguous_edit_with_two_posts_clarifies() {
        let posts = vec![
            cached(Platform::Twitter, "Short tweet about rust"),
            cached(Platform::LinkedIn, "Longer post about hiring"),
        ];
        let provider = MockAIProvider::new()
            .with_response(r#"{"action": "edit", "selected_post_id": null}"#);
        let state = state_with_posts("edit the post", posts);

        let update = run_stage(provider, &state).await;
        assert!(update.edit_target.is_none());
        match update.result.unwrap() {
            FinalResponse::Answer { text, suggested_options } => {
                assert!(text.contains("[twitter]"));
                assert!(text.contains("[linkedin]"));
                assert_eq!(suggested_options.len(), 2);
            }
            other => panic!("expected clarification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn explicit_platform_narrows_to_single_target() {
        let twitter = cached(Platform::Twitter, "Short tweet about rust");
        let twitter_id = twitter.id;
        let posts = vec![twitter, cached(Platform::LinkedIn, "Post about hiring")];
        let provider = MockAIProvider::new()
            .with_response(r#"{"action": "edit", "selected_post_id": null}"#);
        let state = state_with_posts("edit the twitter post", posts);

        let update = run_stage(provider, &state).await;
        assert_eq!(update.edit_target, Some(twitter_id));
        assert!(update.result.is_none());
    }

    #[tokio::test]
    async fn single_cached_post_is_the_target() {
        let post = cached(Platform::LinkedIn, "Post about hiring");
        let id = post.id;
        let provider = MockAIProvider::new()
            .with_response(r#"{"action": "edit", "selected_post_id": null}"#);
        let state = state_with_posts("make it more engaging", vec![post]);

        let update = run_stage(provider, &state).await;
        assert_eq!(update.edit_target, Some(id));
    }

    #[tokio::test]
    async fn create_action_passes_through() {
        let posts = vec![cached(Platform::Twitter, "Old tweet")];
        let provider = MockAIProvider::new()
            .with_response(r#"{"action": "create", "selected_post_id": null}"#);
        let state = state_with_posts("write another post about testing", posts);

        let update = run_stage(provider, &state).await;
        assert!(update.edit_target.is_none());
        assert!(update.result.is_none());
    }

    #[tokio::test]
    async fn gateway_failure_with_ambiguous_edit_clarifies() {
        let posts = vec![
            cached(Platform::Twitter, "Tweet one"),
            cached(Platform::LinkedIn, "Post two"),
        ];
        let provider = MockAIProvider::new().always_failing();
        let state = state_with_posts("edit the post", posts);

        let update = run_stage(provider, &state).await;
        assert!(update.edit_target.is_none());
        assert!(matches!(update.result, Some(FinalResponse::Answer { .. })));
    }
}
