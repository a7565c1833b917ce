//! Adapters implementing the ports against concrete infrastructure.

pub mod ai;
pub mod document;
pub mod http;

pub use ai::{AnthropicConfig, AnthropicProvider, MockAIProvider};
pub use document::InMemoryDocumentReader;
