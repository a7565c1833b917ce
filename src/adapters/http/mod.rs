//! HTTP/WebSocket adapters.

pub mod chat;
