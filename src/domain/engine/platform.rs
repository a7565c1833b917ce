//! Platform detection types.
//!
//! Platform detection is deliberately conservative: only an explicit,
//! unambiguous platform mention in the user's message counts. Inferred or
//! stylistic cues always resolve to asking the user instead of guessing.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Supported social-media platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Twitter,
    LinkedIn,
    Instagram,
    Facebook,
}

/// Keyword aliases that count as an explicit mention of each platform.
static PLATFORM_ALIASES: Lazy<Vec<(Platform, &'static [&'static str])>> = Lazy::new(|| {
    vec![
        (Platform::Twitter, &["twitter", "tweet"][..]),
        (Platform::LinkedIn, &["linkedin"][..]),
        (Platform::Instagram, &["instagram", "insta"][..]),
        (Platform::Facebook, &["facebook", "fb"][..]),
    ]
});

impl Platform {
    /// All supported platforms, in display order.
    pub fn all() -> &'static [Platform] {
        &[
            Platform::Twitter,
            Platform::LinkedIn,
            Platform::Instagram,
            Platform::Facebook,
        ]
    }

    /// Stable label for prompts, payloads, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::LinkedIn => "linkedin",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
        }
    }

    /// Parse a classifier label. Unknown labels map to `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let lowered = label.trim().to_lowercase();
        PLATFORM_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&lowered.as_str()))
            .map(|(platform, _)| *platform)
    }

    /// Scan a message for explicit platform mentions.
    ///
    /// This is the tie-break authority for the platform router: the model's
    /// opinion never overrides what the message literally says.
    pub fn detect_explicit(message: &str) -> ExplicitMention {
        let lowered = message.to_lowercase();
        let mut found = Vec::new();

        for (platform, aliases) in PLATFORM_ALIASES.iter() {
            if aliases.iter().any(|alias| lowered.contains(alias)) {
                found.push(*platform);
            }
        }

        match found.as_slice() {
            [] => ExplicitMention::None,
            [single] => ExplicitMention::One(*single),
            _ => ExplicitMention::Several(found),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of scanning a message for explicit platform keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplicitMention {
    /// No platform keyword in the message.
    None,
    /// Exactly one platform mentioned.
    One(Platform),
    /// More than one platform mentioned; still ambiguous.
    Several(Vec<Platform>),
}

/// Result of the platform classifier stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformDecision {
    /// Detected platform, when the mention was explicit and unambiguous.
    pub platform: Option<Platform>,
    /// Classifier confidence in [0, 1].
    pub confidence: f32,
    /// Short model-provided rationale, kept for logs.
    pub reasoning: String,
    /// Whether the user must be asked to disambiguate.
    pub needs_clarification: bool,
}

impl PlatformDecision {
    /// Decision for an explicit, unambiguous platform mention.
    pub fn explicit(platform: Platform, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            platform: Some(platform),
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            needs_clarification: false,
        }
    }

    /// Decision that defers to the user.
    pub fn clarify(reasoning: impl Into<String>) -> Self {
        Self {
            platform: None,
            confidence: 0.0,
            reasoning: reasoning.into(),
            needs_clarification: true,
        }
    }

    /// Deterministic default used when the gateway fails or returns
    /// malformed output.
    pub fn fallback(reason: &str) -> Self {
        Self::clarify(format!("fallback: {reason}"))
    }
}
