//! Postsmith - Conversational Social-Post Drafting Backend
//!
//! Turns a user's chat message into either a direct answer or a structured
//! social-media post draft by routing the message through a graph of
//! generative-model stages, with streaming output and cooperative
//! per-session cancellation.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
