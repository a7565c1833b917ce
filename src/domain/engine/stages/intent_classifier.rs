//! Intent classifier stage.
//!
//! One gateway call mapping the user's message onto the fixed three-way
//! intent taxonomy. Any gateway or schema failure, and any classification
//! below the confidence floor, resolves to the deterministic default
//! (general question) so the pipeline always reaches a terminal stage.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{call_structured, Stage, StageContext};
use crate::domain::engine::errors::StageError;
use crate::domain::engine::graph::StageKey;
use crate::domain::engine::intent::{Intent, IntentDecision};
use crate::domain::engine::stages::history_block;
use crate::domain::engine::state::{SessionState, StageUpdate};
use crate::ports::{AIProvider, CompletionRequest, MessageRole, RequestMetadata};

/// Wire schema the model must produce.
#[derive(Debug, Deserialize)]
struct IntentWire {
    intent: String,
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

/// Classifies the user's intent.
pub struct IntentClassifierStage {
    provider: Arc<dyn AIProvider>,
    confidence_floor: f32,
}

impl IntentClassifierStage {
    /// Creates the stage.
    pub fn new(provider: Arc<dyn AIProvider>, confidence_floor: f32) -> Self {
        Self {
            provider,
            confidence_floor,
        }
    }

    fn build_request(&self, state: &SessionState) -> CompletionRequest {
        let mut prompt = String::new();
        let history = history_block(state, 6);
        if !history.is_empty() {
            prompt.push_str(&history);
            prompt.push('\n');
        }
        if let Some(previous) = &state.intent {
            prompt.push_str("Previous intent: ");
            prompt.push_str(previous.intent.as_str());
            prompt.push('\n');
        }
        prompt.push_str("Message: ");
        prompt.push_str(&state.user_message);

        CompletionRequest::new(RequestMetadata::new(state.session_id, "intent_classifier"))
            .with_system_prompt(
                "Classify the user's latest message. Reply with JSON only: \
                 {\"intent\": \"support\" | \"document_question\" | \"social_content\", \
                 \"confidence\": 0.0-1.0, \"reasoning\": \"...\"}. \
                 Use social_content for requests to create or edit social-media posts, \
                 document_question for questions about the reference document, and \
                 support for everything else.",
            )
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(200)
            .with_temperature(0.0)
    }

    fn decide(&self, wire: IntentWire) -> IntentDecision {
        let Some(intent) = Intent::from_label(&wire.intent) else {
            tracing::warn!(label = %wire.intent, "unknown intent label, using default");
            return IntentDecision::fallback("unknown intent label");
        };

        let decision = IntentDecision::new(intent, wire.confidence, wire.reasoning);
        if decision.confidence < self.confidence_floor {
            tracing::debug!(
                intent = intent.as_str(),
                confidence = decision.confidence,
                "intent confidence below floor, using default"
            );
            return IntentDecision::fallback("confidence below floor");
        }
        decision
    }
}

#[async_trait]
impl Stage for IntentClassifierStage {
    fn key(&self) -> StageKey {
        StageKey::IntentClassifier
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &StageContext<'_>,
    ) -> Result<StageUpdate, StageError> {
        let request = self.build_request(state);

        let decision =
            match call_structured::<IntentWire>(self.provider.as_ref(), ctx.token, request).await {
                Ok(wire) => self.decide(wire),
                Err(StageError::Cancelled) => return Err(StageError::Cancelled),
                Err(err) => {
                    tracing::warn!(session_id = %state.session_id, error = %err, "intent classification failed, using default");
                    IntentDecision::fallback("classifier unavailable")
                }
            };

        tracing::debug!(
            session_id = %state.session_id,
            intent = decision.intent.as_str(),
            confidence = decision.confidence,
            "intent classified"
        );
        Ok(StageUpdate::with_intent(decision))
    }
}
