//! Connection hub subsystem for client channels and message routing
//!
//! Owns the set of live WebSocket clients and the handler registry, and is
//! the single broadcast/dispatch point shared by every control loop.
//!
//! # Architecture
//!
//! ```text
//! Control Loops ──► broadcast ──► every registered client (isolated sends)
//! Client ──► receive loop ──► dispatch ──► HandlerService (by type key)
//! ```
//!
//! A delivery failure evicts only the offending client; a dispatch miss is
//! logged and dropped. Neither ever propagates to the caller.

pub mod connection_hub;
pub mod message;

pub use connection_hub::{ConnectionHub, ConnectionId};
pub use message::{message_type, MotorCommand, OutboundMessage};
