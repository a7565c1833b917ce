//! Ports module - Interfaces consumed by the domain and application layers.
//!
//! Ports define the contracts that adapters implement. The orchestration
//! engine depends only on these traits, never on concrete vendor APIs.

mod ai_provider;
mod document_reader;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, Message,
    MessageRole, ProviderInfo, RequestMetadata, StreamChunk, TokenUsage,
};
pub use document_reader::{DocumentReadError, ReferenceDocumentReader};
