//! Gateway health handler.
//!
//! Issues a minimal completion to verify the model gateway is reachable.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::foundation::SessionId;
use crate::ports::{AIProvider, CompletionRequest, MessageRole, RequestMetadata};

/// Connectivity report for the model gateway.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayHealth {
    /// Whether a round trip succeeded.
    pub reachable: bool,
    /// Provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Error description when unreachable.
    pub error: Option<String>,
}

/// Handler probing model gateway connectivity.
pub struct GatewayHealthHandler {
    provider: Arc<dyn AIProvider>,
}

impl GatewayHealthHandler {
    /// Creates a new handler.
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self { provider }
    }

    /// Probes the gateway with a one-token request.
    pub async fn handle(&self) -> GatewayHealth {
        let info = self.provider.provider_info();
        let request = CompletionRequest::new(RequestMetadata::new(SessionId::new(), "health"))
            .with_message(MessageRole::User, "ping")
            .with_max_tokens(1);

        match self.provider.complete(request).await {
            Ok(_) => GatewayHealth {
                reachable: true,
                provider: info.name,
                model: info.model,
                error: None,
            },
            Err(err) => {
                tracing::warn!(error = %err, "gateway health probe failed");
                GatewayHealth {
                    reachable: false,
                    provider: info.name,
                    model: info.model,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}
