//! Intent classification types.
//!
//! The engine uses a fixed three-way taxonomy: general/support questions,
//! questions about the reference document, and requests to create or edit
//! social content.

use serde::{Deserialize, Serialize};

/// What the user is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// General or support question.
    Support,
    /// Question about the reference document.
    DocumentQuestion,
    /// Create or edit social-media content.
    SocialContent,
}

impl Intent {
    /// Parse a classifier label. Unknown labels map to `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "support" | "general" | "question" => Some(Intent::Support),
            "document_question" | "document" => Some(Intent::DocumentQuestion),
            "social_content" | "social" => Some(Intent::SocialContent),
            _ => None,
        }
    }

    /// Stable label for prompts and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Support => "support",
            Intent::DocumentQuestion => "document_question",
            Intent::SocialContent => "social_content",
        }
    }
}

/// Result of the intent classifier stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDecision {
    /// Classified intent.
    pub intent: Intent,
    /// Classifier confidence in [0, 1].
    pub confidence: f32,
    /// Short model-provided rationale, kept for logs.
    pub reasoning: String,
}

impl IntentDecision {
    /// Creates a decision, clamping confidence into [0, 1].
    pub fn new(intent: Intent, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            intent,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
        }
    }

    /// Deterministic default used when the gateway fails or returns
    /// malformed output: treat the message as a general question.
    pub fn fallback(reason: &str) -> Self {
        Self {
            intent: Intent::Support,
            confidence: 0.0,
            reasoning: format!("fallback: {reason}"),
        }
    }
}
