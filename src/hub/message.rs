//! Wire message types for the client channel
//!
//! Inbound messages are JSON objects carrying a `type` field used as the
//! dispatch key. Outbound messages are the motor commands produced by the
//! control loops; the legacy `joystick` type name from the single-client
//! prototype has been converged onto the canonical `motor_cmd`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Differential-drive actuation pair, both sides clamped to [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorCommand {
    pub left_motor: f32,
    pub right_motor: f32,
}

impl MotorCommand {
    pub fn new(left_motor: f32, right_motor: f32) -> Self {
        Self {
            left_motor: left_motor.clamp(-1.0, 1.0),
            right_motor: right_motor.clamp(-1.0, 1.0),
        }
    }

    pub fn stop() -> Self {
        Self {
            left_motor: 0.0,
            right_motor: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.left_motor == 0.0 && self.right_motor == 0.0
    }
}

/// Messages broadcast to every connected client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    MotorCmd {
        left_motor: f32,
        right_motor: f32,
    },
}

impl From<MotorCommand> for OutboundMessage {
    fn from(cmd: MotorCommand) -> Self {
        OutboundMessage::MotorCmd {
            left_motor: cmd.left_motor,
            right_motor: cmd.right_motor,
        }
    }
}

/// Extracts the dispatch key from an inbound message envelope.
pub fn message_type(message: &Value) -> Option<&str> {
    message.get("type").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn motor_command_clamps_on_construction() {
        let cmd = MotorCommand::new(1.7, -2.3);
        assert_eq!(cmd.left_motor, 1.0);
        assert_eq!(cmd.right_motor, -1.0);
    }

    #[test]
    fn outbound_motor_cmd_uses_canonical_type_tag() {
        let message = OutboundMessage::from(MotorCommand::new(0.5, -0.5));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "motor_cmd");
        assert_eq!(value["left_motor"], 0.5);
        assert_eq!(value["right_motor"], -0.5);
    }

    #[test]
    fn message_type_reads_the_envelope_key() {
        let frame = json!({"type": "camera_frame", "seq": 3});
        assert_eq!(message_type(&frame), Some("camera_frame"));
        assert_eq!(message_type(&json!({"seq": 3})), None);
        assert_eq!(message_type(&json!({"type": 7})), None);
    }
}
