//! Manual control loop - joystick polling and differential-drive mixing
//!
//! Long-lived task that polls a gamepad through gilrs, feeds the mode-switch
//! button into the [`ModeArbiter`], and broadcasts rate-limited motor
//! commands while Manual mode is active. A missing gamepad is never fatal:
//! the loop retries on a fixed backoff and the rest of the process keeps
//! serving.

use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::arbiter::{ControlMode, ModeArbiter};
use crate::config::JoystickConfig;
use crate::control::{EdgeDebouncer, RateLimiter};
use crate::hub::{ConnectionHub, MotorCommand, OutboundMessage};

#[derive(Debug, thiserror::Error)]
pub enum ManualControlError {
    #[error("Failed to initialize gamepad backend: {0}")]
    InitializationError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum ManualState {
    Connecting,
    Driving,
}

/// Manual control loop with its lifecycle encoded in the type.
///
/// `Connecting` scans for a gamepad on a fixed retry interval; `Driving`
/// runs the poll/mix/broadcast tick until the device disappears, at which
/// point the loop falls back to `Connecting` and rescans.
#[machine]
pub struct ManualControl<S: ManualState> {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
    settings: JoystickConfig,
    arbiter: Arc<ModeArbiter>,
    hub: Arc<ConnectionHub>,
    sensitivity: f32,
    rate_limiter: RateLimiter,
    mode_switch: EdgeDebouncer,
}

impl ManualControl<Connecting> {
    pub fn create(
        settings: JoystickConfig,
        arbiter: Arc<ModeArbiter>,
        hub: Arc<ConnectionHub>,
    ) -> Result<Self, ManualControlError> {
        info!("Initializing gilrs gamepad interface");
        let gilrs = Gilrs::new().map_err(|e| {
            error!("Failed to initialize gilrs: {}", e);
            ManualControlError::InitializationError(e.to_string())
        })?;

        let sensitivity = settings.initial_sensitivity;
        let rate_limiter = RateLimiter::new(settings.command_interval_ms);
        let mode_switch = EdgeDebouncer::new(settings.mode_switch_dwell_ms);

        Ok(Self::new(
            gilrs,
            None,
            settings,
            arbiter,
            hub,
            sensitivity,
            rate_limiter,
            mode_switch,
        ))
    }

    /// Blocks (asynchronously) until a gamepad is present, retrying on the
    /// configured backoff, then transitions to `Driving`.
    pub async fn wait_for_gamepad(mut self) -> ManualControl<Driving> {
        loop {
            // Pump the event queue so hotplugged devices become visible
            while self.gilrs.next_event().is_some() {}

            let found = self
                .gilrs
                .gamepads()
                .next()
                .map(|(id, gamepad)| (id, gamepad.name().to_string()));
            if let Some((id, name)) = found {
                info!("Joystick connected: {} ({})", name, id);
                self.active_gamepad = Some(id);
                return self.transition();
            }

            warn!(
                "Joystick not found. Retrying in {}s...",
                self.settings.retry_interval_s
            );
            sleep(Duration::from_secs(self.settings.retry_interval_s)).await;
        }
    }
}

impl ManualControl<Driving> {
    /// Runs the poll loop until the active gamepad disconnects.
    pub async fn run(mut self) -> ManualControl<Connecting> {
        info!(
            "Monitoring joystick every {}ms (commands gated to {}ms)",
            self.settings.poll_interval_ms, self.settings.command_interval_ms
        );

        loop {
            sleep(Duration::from_millis(self.settings.poll_interval_ms)).await;

            if self.drain_events_detect_disconnect() {
                warn!("Joystick disconnected, rescanning");
                self.active_gamepad = None;
                return self.transition();
            }

            if let Some(command) = self.tick() {
                let message = OutboundMessage::from(command);
                self.hub.broadcast(&message).await;
                info!("[Sent] {:?}", message);
            }
        }
    }

    /// Drains pending gilrs events; returns true when the active gamepad
    /// reported a disconnect.
    fn drain_events_detect_disconnect(&mut self) -> bool {
        let mut disconnected = false;
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            if matches!(event, EventType::Disconnected) && Some(id) == self.active_gamepad {
                disconnected = true;
            }
        }
        disconnected
    }

    /// One control tick: mode switching, sensitivity adjust, deadzone and
    /// differential mixing. Returns a command only when one should be sent.
    fn tick(&mut self) -> Option<MotorCommand> {
        let Some(id) = self.active_gamepad else {
            return None;
        };

        let (switch_pressed, plus, minus, x, y) = {
            let gamepad = self.gilrs.gamepad(id);
            (
                gamepad.is_pressed(Button::LeftTrigger2),
                gamepad.is_pressed(Button::RightTrigger),
                gamepad.is_pressed(Button::LeftTrigger),
                gamepad.value(Axis::LeftStickX),
                // The mixer expects the raw convention where stick-forward
                // is negative; gilrs reports forward as positive.
                -gamepad.value(Axis::LeftStickY),
            )
        };

        // Mode switching works regardless of the current mode, otherwise
        // there would be no way back out of Gesture mode.
        if self.mode_switch.should_trigger(switch_pressed) {
            self.arbiter.advance();
        }

        if self.arbiter.current() != ControlMode::Manual {
            return None;
        }

        if !self.rate_limiter.should_process() {
            return None;
        }

        if plus || minus {
            self.sensitivity = adjust_sensitivity(self.sensitivity, plus, minus, &self.settings);
            debug!("Sensitivity adjusted to {:.2}", self.sensitivity);
        }

        let command = compute_motor_speeds(x, y, self.sensitivity, self.settings.deadzone);
        if command.is_zero() {
            // Do not flood idle clients with zero commands
            None
        } else {
            Some(command)
        }
    }
}

/// Public interface for spawning the manual control loop.
pub struct ManualControlHandle {}

impl ManualControlHandle {
    /// Spawns the connect/drive cycle as a tokio task for the process
    /// lifetime.
    pub fn spawn(
        settings: JoystickConfig,
        arbiter: Arc<ModeArbiter>,
        hub: Arc<ConnectionHub>,
    ) -> Result<Self, ManualControlError> {
        info!("Spawning manual control loop with settings: {:?}", settings);
        let control = ManualControl::create(settings, arbiter, hub)?;

        tokio::spawn(async move {
            let mut connecting = control;
            loop {
                let driving = connecting.wait_for_gamepad().await;
                connecting = driving.run().await;
            }
        });

        info!("Manual control loop started");
        Ok(Self {})
    }
}

/// Values at or below the threshold read as exactly zero; everything else
/// passes through unchanged.
fn apply_deadzone(value: f32, threshold: f32) -> f32 {
    if value.abs() > threshold {
        value
    } else {
        0.0
    }
}

/// Applies held adjust buttons to the gain, clamped to the configured range.
fn adjust_sensitivity(current: f32, plus: bool, minus: bool, settings: &JoystickConfig) -> f32 {
    let mut sensitivity = current;
    if plus {
        sensitivity += settings.sensitivity_step;
    }
    if minus {
        sensitivity -= settings.sensitivity_step;
    }
    sensitivity.clamp(settings.sensitivity_min, settings.sensitivity_max)
}

/// Differential-drive mix. `y` follows the raw convention where forward is
/// negative, so it is sign-inverted before mixing.
fn compute_motor_speeds(x: f32, y: f32, sensitivity: f32, deadzone: f32) -> MotorCommand {
    let y = -y;
    let x = apply_deadzone(x, deadzone);
    let y = apply_deadzone(y, deadzone);

    let left = (y - x) * sensitivity;
    let right = (y + x) * sensitivity;

    MotorCommand::new(left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadzone_zeroes_small_values_exactly() {
        assert_eq!(apply_deadzone(0.05, 0.1), 0.0);
        assert_eq!(apply_deadzone(-0.1, 0.1), 0.0);
        assert_eq!(apply_deadzone(0.1, 0.1), 0.0);
    }

    #[test]
    fn deadzone_passes_large_values_unchanged() {
        assert_eq!(apply_deadzone(0.11, 0.1), 0.11);
        assert_eq!(apply_deadzone(-0.73, 0.1), -0.73);
        assert_eq!(apply_deadzone(1.0, 0.1), 1.0);
    }

    #[test]
    fn sensitivity_never_leaves_the_clamped_range() {
        let settings = JoystickConfig::default();
        let mut sensitivity = settings.initial_sensitivity;
        for _ in 0..100 {
            sensitivity = adjust_sensitivity(sensitivity, true, false, &settings);
        }
        assert_eq!(sensitivity, settings.sensitivity_max);

        for _ in 0..100 {
            sensitivity = adjust_sensitivity(sensitivity, false, true, &settings);
        }
        assert_eq!(sensitivity, settings.sensitivity_min);
    }

    #[test]
    fn full_forward_drives_both_motors_at_sensitivity() {
        // Raw forward axis is negative; half sensitivity
        let command = compute_motor_speeds(0.0, -1.0, 0.5, 0.1);
        assert_eq!(command.left_motor, 0.5);
        assert_eq!(command.right_motor, 0.5);
    }

    #[test]
    fn idle_sticks_produce_a_zero_command() {
        let command = compute_motor_speeds(0.04, 0.08, 0.5, 0.1);
        assert!(command.is_zero());
    }

    #[test]
    fn mix_is_clamped_to_motor_range() {
        let command = compute_motor_speeds(1.0, -1.0, 1.0, 0.1);
        assert_eq!(command.left_motor, 0.0);
        assert_eq!(command.right_motor, 1.0);

        let command = compute_motor_speeds(-1.0, -1.0, 1.0, 0.1);
        assert_eq!(command.left_motor, 1.0);
        assert_eq!(command.right_motor, 0.0);
    }
}
