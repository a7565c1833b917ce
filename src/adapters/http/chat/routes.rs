//! Route definitions for the chat transport.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::websocket::{chat_ws_handler, ChatState};

/// Builds the chat router: WebSocket endpoint plus health probes.
pub fn chat_routes(state: ChatState) -> Router {
    Router::new()
        .route("/ws/chat", get(chat_ws_handler))
        .route("/health", get(liveness))
        .route("/health/gateway", get(gateway_health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Liveness probe.
async fn liveness() -> &'static str {
    "ok"
}

/// Model gateway connectivity probe.
async fn gateway_health(State(state): State<ChatState>) -> impl IntoResponse {
    let health = state.gateway_health.handle().await;
    let status = if health.reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}
