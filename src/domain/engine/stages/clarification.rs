//! Platform clarification stage.
//!
//! Terminal, fully deterministic: when platform detection could not resolve
//! an explicit mention, ask the user instead of guessing. No gateway call.

use async_trait::async_trait;

use super::{Stage, StageContext};
use crate::domain::engine::errors::StageError;
use crate::domain::engine::graph::StageKey;
use crate::domain::engine::platform::Platform;
use crate::domain::engine::state::{FinalResponse, SessionState, StageUpdate};

/// Asks the user which platform the post is for.
pub struct PlatformClarificationStage;

impl PlatformClarificationStage {
    /// Creates the stage.
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlatformClarificationStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for PlatformClarificationStage {
    fn key(&self) -> StageKey {
        StageKey::PlatformClarification
    }

    async fn run(
        &self,
        state: &SessionState,
        _ctx: &StageContext<'_>,
    ) -> Result<StageUpdate, StageError> {
        tracing::debug!(session_id = %state.session_id, "asking for platform clarification");

        let options: Vec<String> = Platform::all()
            .iter()
            .map(|p| format!("Post it on {p}"))
            .collect();

        Ok(StageUpdate::with_result(FinalResponse::Answer {
            text: "Happy to help with that! Which platform should the post target?"
                .to_string(),
            suggested_options: options,
        }))
    }
}
