//! Platform classifier stage.
//!
//! The gateway call provides reasoning and a continuity signal, but the
//! decision authority is the deterministic keyword scan: only an explicit,
//! unambiguous platform mention in the message avoids clarification.
//! Stylistic or inferred cues never count, whatever the model's confidence.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{call_structured, Stage, StageContext};
use crate::domain::engine::errors::StageError;
use crate::domain::engine::graph::StageKey;
use crate::domain::engine::platform::{ExplicitMention, Platform, PlatformDecision};
use crate::domain::engine::stages::history_block;
use crate::domain::engine::state::{SessionState, StageUpdate};
use crate::ports::{AIProvider, CompletionRequest, MessageRole, RequestMetadata};

/// Wire schema the model must produce.
#[derive(Debug, Deserialize)]
struct PlatformWire {
    #[serde(default)]
    platform: Option<String>,
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

/// Detects which platform a social-content request targets.
pub struct PlatformClassifierStage {
    provider: Arc<dyn AIProvider>,
    confidence_floor: f32,
}

impl PlatformClassifierStage {
    /// Creates the stage.
    pub fn new(provider: Arc<dyn AIProvider>, confidence_floor: f32) -> Self {
        Self {
            provider,
            confidence_floor,
        }
    }

    fn build_request(&self, state: &SessionState) -> CompletionRequest {
        let mut prompt = String::new();
        let history = history_block(state, 4);
        if !history.is_empty() {
            prompt.push_str(&history);
            prompt.push('\n');
        }
        if let Some(last) = state.cached_posts.last() {
            prompt.push_str("Most recent draft platform: ");
            prompt.push_str(last.platform.as_str());
            prompt.push('\n');
        }
        prompt.push_str("Message: ");
        prompt.push_str(&state.user_message);

        CompletionRequest::new(RequestMetadata::new(state.session_id, "platform_classifier"))
            .with_system_prompt(
                "Which social platform does the message target? Reply with JSON only: \
                 {\"platform\": \"twitter\" | \"linkedin\" | \"instagram\" | \"facebook\" | null, \
                 \"confidence\": 0.0-1.0, \"reasoning\": \"...\"}. \
                 Use null unless the message names a platform.",
            )
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(200)
            .with_temperature(0.0)
    }

    /// Combines the keyword scan with the model's report.
    ///
    /// The scan is the tie-break authority; the model contributes reasoning
    /// and confidence only when it agrees with an explicit mention.
    fn decide(&self, state: &SessionState, wire: Option<PlatformWire>) -> PlatformDecision {
        match Platform::detect_explicit(&state.user_message) {
            ExplicitMention::One(platform) => {
                let (confidence, reasoning) = match wire {
                    Some(w) if w.confidence >= self.confidence_floor => {
                        (w.confidence, w.reasoning)
                    }
                    Some(w) => (
                        self.confidence_floor,
                        format!("explicit mention overrides low model confidence ({})", w.confidence),
                    ),
                    None => (self.confidence_floor, "explicit mention".to_string()),
                };
                PlatformDecision::explicit(platform, confidence, reasoning)
            }
            ExplicitMention::Several(platforms) => PlatformDecision::clarify(format!(
                "several platforms mentioned: {}",
                platforms
                    .iter()
                    .map(Platform::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            ExplicitMention::None => {
                if let Some(w) = &wire {
                    if w.platform.is_some() {
                        tracing::debug!(
                            session_id = %state.session_id,
                            guessed = ?w.platform,
                            "discarding inferred platform guess, asking the user"
                        );
                    }
                }
                PlatformDecision::clarify("no explicit platform mention")
            }
        }
    }
}

#[async_trait]
impl Stage for PlatformClassifierStage {
    fn key(&self) -> StageKey {
        StageKey::PlatformClassifier
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &StageContext<'_>,
    ) -> Result<StageUpdate, StageError> {
        let request = self.build_request(state);

        let wire = match call_structured::<PlatformWire>(self.provider.as_ref(), ctx.token, request)
            .await
        {
            Ok(wire) => Some(wire),
            Err(StageError::Cancelled) => return Err(StageError::Cancelled),
            Err(err) => {
                tracing::warn!(session_id = %state.session_id, error = %err, "platform classification failed, deciding from keywords only");
                None
            }
        };

        let decision = self.decide(state, wire);
        tracing::debug!(
            session_id = %state.session_id,
            platform = ?decision.platform,
            needs_clarification = decision.needs_clarification,
            "platform detected"
        );
        Ok(StageUpdate::with_platform(decision))
    }
}
