//! Model gateway adapters.
//!
//! - `AnthropicProvider` - production gateway against the Anthropic API
//! - `MockAIProvider` - configurable test double

mod anthropic_provider;
mod mock_provider;

pub use anthropic_provider::{AnthropicConfig, AnthropicProvider};
pub use mock_provider::{MockAIProvider, MockResponse};
