//! Mock AI Provider for testing.
//!
//! A configurable implementation of the AIProvider port, allowing tests to
//! run without calling a real model gateway.
//!
//! # Features
//!
//! - Pre-configured responses, consumed in order
//! - A repeating default response once the queue is drained
//! - Error injection for resilience testing
//! - Simulated delays for cancellation/supersession testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_response("{\"intent\": \"support\", \"confidence\": 0.9}")
//!     .with_delay(Duration::from_millis(100));
//!
//! let response = provider.complete(request).await?;
//! ```

use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, ProviderInfo,
    StreamChunk, TokenUsage,
};

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a successful completion with this content.
    Success(String),
    /// Return an unavailable error with this message.
    Failure(String),
}

/// Mock AI provider for testing.
#[derive(Debug, Clone)]
pub struct MockAIProvider {
    /// Pre-configured responses (consumed in order).
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Returned when the queue is empty.
    default_response: Arc<Mutex<Option<MockResponse>>>,
    /// Simulated latency per request.
    delay: Duration,
    /// Call history for verification.
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Provider info to return.
    info: ProviderInfo,
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAIProvider {
    /// Creates a new mock provider with default settings.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_response: Arc::new(Mutex::new(None)),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
            info: ProviderInfo::new("mock", "mock-model-1", 128_000).with_streaming(true),
        }
    }

    /// Queues a successful response.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Success(content.into()));
        self
    }

    /// Queues an error response.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Failure(message.into()));
        self
    }

    /// Sets the response returned once the queue is drained.
    pub fn with_default_response(self, content: impl Into<String>) -> Self {
        *self.default_response.lock().unwrap() = Some(MockResponse::Success(content.into()));
        self
    }

    /// Makes every call fail (queue and default are ignored).
    pub fn always_failing(self) -> Self {
        self.responses.lock().unwrap().clear();
        *self.default_response.lock().unwrap() =
            Some(MockResponse::Failure("mock gateway down".into()));
        self
    }

    /// Adds simulated latency to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of gateway calls issued so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Snapshot of the recorded requests.
    pub fn recorded_calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn next_response(&self) -> MockResponse {
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        self.default_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| MockResponse::Failure("mock response queue exhausted".into()))
    }

    fn record(&self, request: &CompletionRequest) {
        self.calls.lock().unwrap().push(request.clone());
    }
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        self.record(&request);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_response() {
            MockResponse::Success(content) => {
                let tokens = self.estimate_tokens(&content);
                Ok(CompletionResponse {
                    content,
                    usage: TokenUsage::new(10, tokens),
                    model: self.info.model.clone(),
                    finish_reason: FinishReason::Stop,
                })
            }
            MockResponse::Failure(message) => Err(AIError::unavailable(message)),
        }
    }

    async fn stream_complete(
        &self,
        request: CompletionRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk, AIError>> + Send>>, AIError> {
        self.record(&request);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_response() {
            MockResponse::Success(content) => {
                let tokens = self.estimate_tokens(&content);
                // Split into word-sized chunks so streaming consumers see
                // more than one delta.
                let mut chunks: Vec<Result<StreamChunk, AIError>> = content
                    .split_inclusive(' ')
                    .map(|piece| Ok(StreamChunk::content(piece)))
                    .collect();
                chunks.push(Ok(StreamChunk::final_chunk(
                    FinishReason::Stop,
                    TokenUsage::new(10, tokens),
                )));
                Ok(Box::pin(stream::iter(chunks)))
            }
            MockResponse::Failure(message) => Err(AIError::unavailable(message)),
        }
    }

    fn estimate_tokens(&self, text: &str) -> u32 {
        (text.len() / 4).max(1) as u32
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}
