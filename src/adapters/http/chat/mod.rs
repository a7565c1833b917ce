//! Chat transport: duplex WebSocket protocol plus health endpoints.

mod dto;
mod routes;
mod websocket;

pub use dto::ChatClientMessage;
pub use routes::chat_routes;
pub use websocket::{chat_ws_handler, ChatState};
