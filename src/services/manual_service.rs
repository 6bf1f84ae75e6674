//! Reserved handler for the `manual_control` message type
//!
//! The manual path is a proactive producer (the joystick loop pushes into
//! the hub); nothing is consumed from clients yet. The type key stays
//! registered so inbound `manual_control` messages are accepted instead of
//! warned about as unroutable.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::services::{HandlerService, ServiceError};

pub struct ManualControlService {
    name: String,
}

impl ManualControlService {
    pub fn new() -> Self {
        Self {
            name: "ManualControlService".to_string(),
        }
    }
}

impl Default for ManualControlService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HandlerService for ManualControlService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&mut self, message: Value) -> Result<(), ServiceError> {
        debug!("Ignoring inbound manual_control message: {}", message);
        Ok(())
    }
}
