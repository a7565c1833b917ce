//! Error types for the orchestration engine.
//!
//! Stage-local failures are caught at the stage boundary and converted into
//! fallback payloads or an `error` field on the session state; only
//! unrecoverable failures (missing upstream data, graph defects) surface as
//! `EngineError` and terminate the stream with an `error` event.

use thiserror::Error;

use super::graph::StageKey;
use crate::ports::AIError;

/// Failure raised inside a single stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// The model gateway call failed.
    #[error("model gateway error: {0}")]
    Gateway(#[from] AIError),

    /// The model returned output that does not match the declared schema.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    /// A field a previous stage should have produced is missing.
    #[error("missing upstream field: {0}")]
    MissingUpstream(&'static str),

    /// The execution's cancellation token was signaled.
    #[error("execution cancelled")]
    Cancelled,
}

impl StageError {
    /// Whether the executor must abort the whole graph for this failure.
    ///
    /// Gateway and schema failures are recoverable: stages convert them into
    /// deterministic defaults or fallback payloads before they ever reach
    /// the executor. Missing upstream data means the graph itself is broken
    /// for this execution.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, StageError::MissingUpstream(_))
    }
}

/// Failure of an execution as a whole.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A graph edge points at a stage that was never registered.
    #[error("stage {0:?} is not registered in the graph")]
    UnknownStage(StageKey),

    /// A router needed a classifier result that was never written.
    #[error("router requires missing stage output: {0}")]
    MissingStageOutput(&'static str),

    /// An unrecoverable stage failure.
    #[error("stage {stage:?} failed: {source}")]
    Stage {
        stage: StageKey,
        source: StageError,
    },

    /// The graph was exhausted without any stage producing a result.
    #[error("execution finished without a terminal result")]
    NoTerminalResult,

    /// A stage attempted to set the terminal result twice.
    #[error("result is terminal and was already set")]
    ResultAlreadySet,
}
