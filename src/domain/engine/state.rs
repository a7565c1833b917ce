//! Session execution state.
//!
//! A [`SessionState`] is constructed fresh for each incoming message from
//! caller-supplied session context, threaded through the stage graph, and
//! discarded when the execution's terminal event has been emitted. Stages
//! never mutate it directly; they return a [`StageUpdate`] that the executor
//! merges.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::errors::EngineError;
use super::intent::IntentDecision;
use super::platform::{Platform, PlatformDecision};
use crate::domain::foundation::{PostId, SessionId};

/// One committed conversation exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// What the user said.
    pub user_text: String,
    /// What the assistant answered.
    pub ai_text: String,
}

impl ChatTurn {
    /// Creates a new turn.
    pub fn new(user_text: impl Into<String>, ai_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            ai_text: ai_text.into(),
        }
    }
}

/// Reference-document context and style preferences for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostContext {
    /// Cached summary of the reference document.
    pub document_summary: Option<String>,
    /// Full text of the reference document, fetched on demand.
    pub document_text: Option<String>,
    /// User-supplied style preference, free-form.
    pub style_preferences: Option<String>,
}

impl PostContext {
    /// True when any reference material is available.
    pub fn has_reference(&self) -> bool {
        self.document_summary.is_some() || self.document_text.is_some()
    }
}

/// A code snippet attached to a post draft, kept out of the main text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExample {
    /// Language tag, possibly empty.
    pub language: String,
    /// The snippet itself.
    pub code: String,
}

/// Violations of the draft separation contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DraftViolation {
    #[error("main text contains a fenced code block; code belongs in code_examples")]
    InlineCodeBlock,

    #[error("main text is empty")]
    EmptyMainText,
}

/// Structured social-post draft.
///
/// Code snippets and visual-element descriptions live in their own fields;
/// the main text stays prose unless the user explicitly asked for inline
/// code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialDraft {
    /// The post body.
    pub main_text: String,
    /// Code snippets referenced by the post.
    #[serde(default)]
    pub code_examples: Vec<CodeExample>,
    /// Descriptions of suggested visuals (image/diagram ideas).
    #[serde(default)]
    pub visual_elements: Vec<String>,
}

impl SocialDraft {
    /// Creates a text-only draft.
    pub fn text(main_text: impl Into<String>) -> Self {
        Self {
            main_text: main_text.into(),
            code_examples: Vec::new(),
            visual_elements: Vec::new(),
        }
    }

    /// Conformance check for the separation contract.
    ///
    /// A fenced code block inside the main text is a violation unless the
    /// user explicitly asked for inline code.
    pub fn check_separation(&self, inline_code_requested: bool) -> Result<(), DraftViolation> {
        if self.main_text.trim().is_empty() {
            return Err(DraftViolation::EmptyMainText);
        }
        if !inline_code_requested && self.main_text.contains("```") {
            return Err(DraftViolation::InlineCodeBlock);
        }
        Ok(())
    }

    /// Repairs a violating draft by moving fenced code blocks out of the
    /// main text into `code_examples`.
    pub fn extract_inline_code(&mut self) {
        if !self.main_text.contains("```") {
            return;
        }

        let mut prose = String::new();
        let mut rest = self.main_text.as_str();

        while let Some(open) = rest.find("```") {
            prose.push_str(&rest[..open]);
            let after_open = &rest[open + 3..];

            let Some(close) = after_open.find("```") else {
                // Unterminated fence: treat everything after it as code.
                let (language, code) = split_fence_header(after_open);
                self.code_examples.push(CodeExample { language, code });
                rest = "";
                break;
            };

            let (language, code) = split_fence_header(&after_open[..close]);
            self.code_examples.push(CodeExample { language, code });
            rest = &after_open[close + 3..];
        }

        prose.push_str(rest);
        self.main_text = prose.split_whitespace().collect::<Vec<_>>().join(" ");
    }
}

/// Splits a fenced block body into its language tag and code.
fn split_fence_header(body: &str) -> (String, String) {
    match body.split_once('\n') {
        Some((header, code)) if !header.trim().contains(' ') => {
            (header.trim().to_string(), code.trim().to_string())
        }
        _ => (String::new(), body.trim().to_string()),
    }
}

/// A previously generated post draft cached for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPost {
    /// Stable id used for edit targeting.
    pub id: PostId,
    /// Platform the draft was written for.
    pub platform: Platform,
    /// The draft itself.
    pub draft: SocialDraft,
}

impl CachedPost {
    /// Short preview of the post for clarification listings.
    pub fn preview(&self, max_chars: usize) -> String {
        let text = self.draft.main_text.trim();
        if text.chars().count() <= max_chars {
            format!("[{}] {}", self.platform, text)
        } else {
            let cut: String = text.chars().take(max_chars).collect();
            format!("[{}] {}…", self.platform, cut.trim_end())
        }
    }
}

/// Which kind of terminal payload an execution produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Answer,
    SocialPost,
}

/// Terminal payload of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalResponse {
    /// Free-form answer (also used for clarification questions).
    Answer {
        text: String,
        suggested_options: Vec<String>,
    },
    /// Structured social-post draft.
    SocialPost {
        platform: Platform,
        draft: SocialDraft,
        /// Set when the draft replaces an existing cached post.
        edited_post_id: Option<PostId>,
        suggested_options: Vec<String>,
    },
}

impl FinalResponse {
    /// The response kind tag.
    pub fn kind(&self) -> ResponseKind {
        match self {
            FinalResponse::Answer { .. } => ResponseKind::Answer,
            FinalResponse::SocialPost { .. } => ResponseKind::SocialPost,
        }
    }

    /// The user-facing text of the response.
    pub fn content_text(&self) -> &str {
        match self {
            FinalResponse::Answer { text, .. } => text,
            FinalResponse::SocialPost { draft, .. } => &draft.main_text,
        }
    }

    /// The suggested follow-up options.
    pub fn suggested_options(&self) -> &[String] {
        match self {
            FinalResponse::Answer {
                suggested_options, ..
            }
            | FinalResponse::SocialPost {
                suggested_options, ..
            } => suggested_options,
        }
    }
}

/// Partial update returned by a stage, merged into the state by the
/// executor.
#[derive(Debug, Default)]
pub struct StageUpdate {
    /// Intent classifier output.
    pub intent: Option<IntentDecision>,
    /// Platform classifier output.
    pub platform: Option<PlatformDecision>,
    /// Post id resolved by the selector for editing.
    pub edit_target: Option<PostId>,
    /// Terminal result.
    pub result: Option<FinalResponse>,
    /// Stage-local recoverable failure, surfaced to the caller.
    pub error: Option<String>,
}

impl StageUpdate {
    /// An empty update.
    pub fn none() -> Self {
        Self::default()
    }

    /// Update carrying an intent decision.
    pub fn with_intent(decision: IntentDecision) -> Self {
        Self {
            intent: Some(decision),
            ..Self::default()
        }
    }

    /// Update carrying a platform decision.
    pub fn with_platform(decision: PlatformDecision) -> Self {
        Self {
            platform: Some(decision),
            ..Self::default()
        }
    }

    /// Update carrying an edit target.
    pub fn with_edit_target(id: PostId) -> Self {
        Self {
            edit_target: Some(id),
            ..Self::default()
        }
    }

    /// Update carrying the terminal result.
    pub fn with_result(result: FinalResponse) -> Self {
        Self {
            result: Some(result),
            ..Self::default()
        }
    }

    /// Attaches a recoverable error note to this update.
    pub fn noting_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// The mutable record threaded through one execution.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Stable session key.
    pub session_id: SessionId,
    /// The triggering user message.
    pub user_message: String,
    /// Reference-document context and style preferences.
    pub post_context: PostContext,
    /// Bounded recent history, oldest first.
    pub recent_messages: Vec<ChatTurn>,
    /// Rolling summary, replaced wholesale by the memory manager.
    pub rolling_summary: Option<String>,
    /// Committed message counter, independent of window eviction.
    pub total_message_count: u64,
    /// Previously generated drafts for this session.
    pub cached_posts: Vec<CachedPost>,
    /// Intent classifier output; absent until its stage runs.
    pub intent: Option<IntentDecision>,
    /// Platform classifier output; absent until its stage runs.
    pub platform_decision: Option<PlatformDecision>,
    /// Edit target resolved by the post selector.
    pub edit_target: Option<PostId>,
    /// Terminal result; set at most once.
    pub result: Option<FinalResponse>,
    /// Recoverable failure note, surfaced alongside the result.
    pub error: Option<String>,
}

impl SessionState {
    /// Creates a fresh state for one incoming message.
    pub fn new(session_id: SessionId, user_message: impl Into<String>) -> Self {
        Self {
            session_id,
            user_message: user_message.into(),
            post_context: PostContext::default(),
            recent_messages: Vec::new(),
            rolling_summary: None,
            total_message_count: 0,
            cached_posts: Vec::new(),
            intent: None,
            platform_decision: None,
            edit_target: None,
            result: None,
            error: None,
        }
    }

    /// Attaches reference-document context.
    pub fn with_post_context(mut self, context: PostContext) -> Self {
        self.post_context = context;
        self
    }

    /// Attaches conversation memory loaded from the memory manager.
    pub fn with_memory(
        mut self,
        recent_messages: Vec<ChatTurn>,
        rolling_summary: Option<String>,
        total_message_count: u64,
    ) -> Self {
        self.recent_messages = recent_messages;
        self.rolling_summary = rolling_summary;
        self.total_message_count = total_message_count;
        self
    }

    /// Attaches the session's cached posts.
    pub fn with_cached_posts(mut self, posts: Vec<CachedPost>) -> Self {
        self.cached_posts = posts;
        self
    }

    /// Merges a stage's partial update.
    ///
    /// The terminal result may be set at most once; a second attempt is an
    /// unrecoverable engine defect.
    pub fn apply(&mut self, update: StageUpdate) -> Result<(), EngineError> {
        if let Some(result) = update.result {
            if self.result.is_some() {
                return Err(EngineError::ResultAlreadySet);
            }
            self.result = Some(result);
        }
        if let Some(intent) = update.intent {
            self.intent = Some(intent);
        }
        if let Some(platform) = update.platform {
            self.platform_decision = Some(platform);
        }
        if let Some(target) = update.edit_target {
            self.edit_target = Some(target);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        Ok(())
    }

    /// True once the terminal result is set.
    pub fn is_terminal(&self) -> bool {
        self.result.is_some()
    }

    /// Looks up a cached post by id.
    pub fn cached_post(&self, id: PostId) -> Option<&CachedPost> {
        self.cached_posts.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::intent::Intent;

    fn sample_state() -> SessionState {
        SessionState::new(SessionId::new(), "hello")
    }

    #[test]
    fn apply_merges_classifier_outputs() {
        let mut state = sample_state();
        state
            .apply(StageUpdate::with_intent(IntentDecision::new(
                Intent::SocialContent,
                0.9,
                "asked for a post",
            )))
            .unwrap();

        assert_eq!(state.intent.as_ref().unwrap().intent, Intent::SocialContent);
        assert!(!state.is_terminal());
    }

    #[test]
    fn result_is_set_at_most_once() {
        let mut state = sample_state();
        let answer = FinalResponse::Answer {
            text: "hi".into(),
            suggested_options: vec![],
        };

        state.apply(StageUpdate::with_result(answer.clone())).unwrap();
        assert!(state.is_terminal());

        let second = state.apply(StageUpdate::with_result(answer));
        assert!(matches!(second, Err(EngineError::ResultAlreadySet)));
    }

    #[test]
    fn separation_check_rejects_fenced_code() {
        let draft = SocialDraft::text("Here is a tip:\n```rust\nfn main() {}\n```");
        assert_eq!(
            draft.check_separation(false),
            Err(DraftViolation::InlineCodeBlock)
        );
    }

    #[test]
    fn separation_check_allows_requested_inline_code() {
        let draft = SocialDraft::text("Look:\n```rust\nfn main() {}\n```");
        assert!(draft.check_separation(true).is_ok());
    }

    #[test]
    fn separation_check_rejects_empty_text() {
        let draft = SocialDraft::text("  ");
        assert_eq!(
            draft.check_separation(false),
            Err(DraftViolation::EmptyMainText)
        );
    }

    #[test]
    fn extract_inline_code_moves_fences_out() {
        let mut draft = SocialDraft::text("Intro text\n```rust\nfn main() {}\n```\nclosing line");
        draft.extract_inline_code();

        assert!(draft.check_separation(false).is_ok());
        assert_eq!(draft.code_examples.len(), 1);
        assert_eq!(draft.code_examples[0].language, "rust");
        assert_eq!(draft.code_examples[0].code, "fn main() {}");
        assert!(draft.main_text.contains("Intro text"));
        assert!(draft.main_text.contains("closing line"));
    }

    #[test]
    fn extract_inline_code_handles_unterminated_fence() {
        let mut draft = SocialDraft::text("Intro\n```python\nprint('hi')");
        draft.extract_inline_code();

        assert!(!draft.main_text.contains("```"));
        assert_eq!(draft.code_examples.len(), 1);
        assert_eq!(draft.code_examples[0].language, "python");
    }

    #[test]
    fn cached_post_preview_truncates() {
        let post = CachedPost {
            id: PostId::new(),
            platform: Platform::Twitter,
            draft: SocialDraft::text("a".repeat(100)),
        };
        let preview = post.preview(20);
        assert!(preview.starts_with("[twitter]"));
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn final_response_kind_tags() {
        let answer = FinalResponse::Answer {
            text: "hi".into(),
            suggested_options: vec![],
        };
        assert_eq!(answer.kind(), ResponseKind::Answer);

        let post = FinalResponse::SocialPost {
            platform: Platform::LinkedIn,
            draft: SocialDraft::text("body"),
            edited_post_id: None,
            suggested_options: vec![],
        };
        assert_eq!(post.kind(), ResponseKind::SocialPost);
        assert_eq!(post.content_text(), "body");
    }
}
