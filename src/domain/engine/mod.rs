//! Conversation orchestration engine.
//!
//! The core of Postsmith: a static stage graph executed once per incoming
//! message, with per-session cancellation (newest message wins), a rolling
//! conversation memory, and an ordered streaming event contract.

mod errors;
mod events;
mod executor;
mod graph;
mod intent;
mod memory;
mod platform;
mod registry;
mod stages;
mod state;

pub use errors::{EngineError, StageError};
pub use events::{ContentFragment, EmitError, StreamEmitter, StreamEvent};
pub use executor::{ExecutionOutcome, StageGraphExecutor};
pub use graph::{Edge, StageGraph, StageKey};
pub use intent::{Intent, IntentDecision};
pub use memory::{ConversationMemoryManager, MemoryConfig, SUMMARY_SENTINEL};
pub use platform::{ExplicitMention, Platform, PlatformDecision};
pub use registry::{CancellationToken, SessionRegistry};
pub use stages::{Stage, StageContext};
pub use state::{
    CachedPost, ChatTurn, CodeExample, DraftViolation, FinalResponse, PostContext, ResponseKind,
    SessionState, SocialDraft, StageUpdate,
};
