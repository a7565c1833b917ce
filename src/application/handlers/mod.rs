//! Application command handlers.
//!
//! One handler per inbound operation: submit a message, interrupt a
//! session, clear a session's memory, probe the gateway.

mod clear_memory;
mod gateway_health;
mod interrupt;
mod submit_message;

pub use clear_memory::ClearMemoryHandler;
pub use gateway_health::{GatewayHealth, GatewayHealthHandler};
pub use interrupt::{InterruptCommand, InterruptHandler, InterruptResult};
pub use submit_message::{
    MessageOutcome, SessionContext, SubmitMessageCommand, SubmitMessageHandler,
};
