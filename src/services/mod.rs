//! Handler services for inbound client messages
//!
//! Each inbound message type is bound to exactly one [`HandlerService`] in
//! the hub's registry at startup. Handlers are stateful, live for the whole
//! process, and report failures through [`ServiceError`]; the hub logs those
//! and keeps the connection alive.

pub mod image_service;
pub mod manual_service;

pub use image_service::{GestureClassifier, ImageService, NullClassifier};
pub use manual_service::ManualControlService;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed message fields or undecodable payload data
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Payload decoded but did not contain a readable image
    #[error("Image error: {0}")]
    ImageError(String),
}

/// Capability bound to a message-type key in the hub registry.
#[async_trait]
pub trait HandlerService: Send {
    fn name(&self) -> &str;

    /// Consumes one inbound message. Errors are logged by the dispatcher
    /// and never terminate the sending connection.
    async fn handle(&mut self, message: Value) -> Result<(), ServiceError>;
}
