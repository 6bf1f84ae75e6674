//! Gesture control loop - stabilization and command mapping
//!
//! Turns the classifier's noisy per-frame (label, confidence) observations
//! into stable drive commands: a fixed-size sliding window of accepted
//! labels is majority-voted on every observation, and the winning label is
//! mapped through the configured label table onto one of six canonical
//! drive commands. Unlike the manual loop this path is driven by the
//! upstream frame rate, not a timer, and it emits on every processed
//! observation while Gesture mode is active.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

use crate::arbiter::{ControlMode, ModeArbiter};
use crate::config::GestureConfig;
use crate::hub::{ConnectionHub, MotorCommand, OutboundMessage};

/// One classifier observation. Absence of a detection is represented by
/// `None` at the call site, never by an error.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureDetection {
    pub label: String,
    pub confidence: f32,
}

/// The six canonical drive commands a stable gesture can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveCommand {
    Stop,
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Spin,
}

impl DriveCommand {
    /// Parses the command names used in the configuration table.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "STOP" => Some(Self::Stop),
            "FORWARD" => Some(Self::Forward),
            "BACKWARD" => Some(Self::Backward),
            "TURN_LEFT" => Some(Self::TurnLeft),
            "TURN_RIGHT" => Some(Self::TurnRight),
            "SPIN" => Some(Self::Spin),
            _ => None,
        }
    }

    /// Fixed motor pair for this command given the configured speeds.
    pub fn motor_command(&self, translational: f32, rotational: f32) -> MotorCommand {
        match self {
            Self::Stop => MotorCommand::stop(),
            Self::Forward => MotorCommand::new(translational, translational),
            Self::Backward => MotorCommand::new(-translational, -translational),
            Self::TurnLeft => MotorCommand::new(-rotational, rotational),
            Self::TurnRight => MotorCommand::new(rotational, -rotational),
            Self::Spin => MotorCommand::new(1.0, -1.0),
        }
    }
}

/// Stabilizes raw gesture observations and broadcasts the mapped command.
pub struct GestureController {
    window: VecDeque<String>,
    settings: GestureConfig,
    arbiter: Arc<ModeArbiter>,
    hub: Arc<ConnectionHub>,
}

impl GestureController {
    pub fn new(settings: GestureConfig, arbiter: Arc<ModeArbiter>, hub: Arc<ConnectionHub>) -> Self {
        info!(
            "Gesture controller ready (window {}, confidence threshold {})",
            settings.window_size, settings.confidence_threshold
        );
        Self {
            window: VecDeque::with_capacity(settings.window_size),
            settings,
            arbiter,
            hub,
        }
    }

    /// Processes one observation and broadcasts the stabilized command.
    ///
    /// The whole path is active only in Gesture mode: observations arriving
    /// in any other mode touch neither the window nor the output, so
    /// commands sent after a mode switch reflect only what was seen while
    /// Gesture mode was live. An absent detection is a valid "no gesture"
    /// observation and perturbs nothing.
    pub async fn observe(&mut self, detection: Option<GestureDetection>) {
        if self.arbiter.current() != ControlMode::Gesture {
            return;
        }

        let Some(detection) = detection else {
            debug!("No gesture detected in frame");
            return;
        };

        self.accept(&detection);
        let command = self.stable_command();

        let message = OutboundMessage::from(command);
        self.hub.broadcast(&message).await;
        info!("[Sent] {:?}", message);
    }

    /// Admits the label into the window when its confidence clears the
    /// threshold. Low-confidence observations leave the window untouched.
    fn accept(&mut self, detection: &GestureDetection) {
        if detection.confidence < self.settings.confidence_threshold {
            debug!(
                "Rejected '{}' at confidence {:.2}",
                detection.label, detection.confidence
            );
            return;
        }
        if self.window.len() == self.settings.window_size {
            self.window.pop_front();
        }
        self.window.push_back(detection.label.clone());
    }

    /// The most frequent label in the window; ties go to the most recently
    /// inserted of the tied set. An empty window stabilizes to no label.
    fn stable_label(&self) -> Option<&str> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for label in &self.window {
            *counts.entry(label.as_str()).or_insert(0) += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for label in self.window.iter().rev() {
            let count = counts[label.as_str()];
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((label.as_str(), count));
            }
        }
        best.map(|(label, _)| label)
    }

    /// Maps the current stable label through the configured tables. Unknown
    /// labels and unknown command names both resolve to STOP.
    fn stable_command(&self) -> MotorCommand {
        let command = self
            .stable_label()
            .and_then(|label| self.settings.commands.get(label))
            .and_then(|name| DriveCommand::from_name(name))
            .unwrap_or(DriveCommand::Stop);

        command.motor_command(
            self.settings.translational_speed,
            self.settings.rotational_speed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn controller(settings: GestureConfig) -> GestureController {
        GestureController::new(
            settings,
            Arc::new(ModeArbiter::new()),
            Arc::new(ConnectionHub::new()),
        )
    }

    fn detection(label: &str, confidence: f32) -> GestureDetection {
        GestureDetection {
            label: label.to_string(),
            confidence,
        }
    }

    #[test]
    fn majority_label_wins_the_vote() {
        let mut ctl = controller(GestureConfig::default());
        for label in ["A", "A", "A", "B", "B"] {
            ctl.accept(&detection(label, 0.9));
        }
        assert_eq!(ctl.stable_label(), Some("A"));
    }

    #[test]
    fn ties_break_toward_the_most_recent_label() {
        let mut ctl = controller(GestureConfig::default());
        for label in ["A", "B", "A", "B", "C"] {
            ctl.accept(&detection(label, 0.9));
        }
        // A and B are tied at two; B was inserted more recently
        assert_eq!(ctl.stable_label(), Some("B"));
    }

    #[test]
    fn low_confidence_observations_never_enter_the_window() {
        let mut ctl = controller(GestureConfig::default());
        ctl.accept(&detection("A", 0.9));
        ctl.accept(&detection("B", 0.49));
        ctl.accept(&detection("B", 0.3));
        assert_eq!(ctl.stable_label(), Some("A"));
    }

    #[test]
    fn window_never_grows_past_its_capacity() {
        let mut ctl = controller(GestureConfig::default());
        for _ in 0..20 {
            ctl.accept(&detection("A", 0.9));
        }
        ctl.accept(&detection("B", 0.9));
        assert_eq!(ctl.window.len(), 5);
        // majority is still A after a single B
        assert_eq!(ctl.stable_label(), Some("A"));
    }

    #[test]
    fn empty_window_stabilizes_to_stop() {
        let ctl = controller(GestureConfig::default());
        assert_eq!(ctl.stable_label(), None);
        assert_eq!(ctl.stable_command(), MotorCommand::stop());
    }

    #[test]
    fn unknown_label_maps_to_stop() {
        let mut ctl = controller(GestureConfig::default());
        for _ in 0..5 {
            ctl.accept(&detection("totally_unknown", 0.9));
        }
        assert_eq!(ctl.stable_command(), MotorCommand::stop());
    }

    #[test]
    fn spin_command_pins_full_opposing_motors() {
        let cmd = DriveCommand::Spin.motor_command(0.6, 0.6);
        assert_eq!(cmd, MotorCommand::new(1.0, -1.0));
    }

    #[tokio::test]
    async fn forward_window_broadcasts_translational_speed_in_gesture_mode() {
        let mut settings = GestureConfig::default();
        settings.translational_speed = 0.6;
        settings
            .commands
            .insert("FORWARD".to_string(), "FORWARD".to_string());

        let arbiter = Arc::new(ModeArbiter::new());
        arbiter.advance(); // Manual -> Gesture
        let hub = Arc::new(ConnectionHub::new());
        let (tx, mut rx) = mpsc::channel(16);
        hub.accept("client".into(), tx).await;

        let mut ctl = GestureController::new(settings, arbiter, hub);
        for _ in 0..5 {
            ctl.observe(Some(detection("FORWARD", 0.9))).await;
        }

        let mut last = None;
        while let Ok(payload) = rx.try_recv() {
            last = Some(payload);
        }
        let value: serde_json::Value = serde_json::from_str(&last.unwrap()).unwrap();
        assert_eq!(value["type"], "motor_cmd");
        assert!((value["left_motor"].as_f64().unwrap() - 0.6).abs() < 1e-6);
        assert!((value["right_motor"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn observations_outside_gesture_mode_touch_nothing() {
        let arbiter = Arc::new(ModeArbiter::new()); // stays Manual
        let hub = Arc::new(ConnectionHub::new());
        let (tx, mut rx) = mpsc::channel(16);
        hub.accept("client".into(), tx).await;

        let mut ctl = GestureController::new(GestureConfig::default(), arbiter, hub);
        ctl.observe(Some(detection("Thumb_Up", 0.9))).await;
        assert!(rx.try_recv().is_err());
        assert!(ctl.window.is_empty());
    }

    #[tokio::test]
    async fn mode_switch_starts_from_what_gesture_mode_saw() {
        let arbiter = Arc::new(ModeArbiter::new());
        let hub = Arc::new(ConnectionHub::new());
        let (tx, mut rx) = mpsc::channel(16);
        hub.accept("client".into(), tx).await;

        let mut ctl =
            GestureController::new(GestureConfig::default(), arbiter.clone(), hub.clone());

        // A burst of FORWARD gestures while Manual mode is active must not
        // pre-load the vote for later
        for _ in 0..5 {
            ctl.observe(Some(detection("Thumb_Up", 0.9))).await;
        }
        assert!(rx.try_recv().is_err());

        arbiter.advance(); // Manual -> Gesture
        ctl.observe(Some(detection("Open_Palm", 0.9))).await;

        let payload: serde_json::Value =
            serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(payload["type"], "motor_cmd");
        // Open_Palm is the only vote, so the command is STOP, not the
        // Manual-era FORWARD majority
        assert_eq!(payload["left_motor"].as_f64().unwrap(), 0.0);
        assert_eq!(payload["right_motor"].as_f64().unwrap(), 0.0);
        assert_eq!(ctl.window.len(), 1);
    }

    #[tokio::test]
    async fn absent_detection_neither_emits_nor_perturbs_the_window() {
        let arbiter = Arc::new(ModeArbiter::new());
        arbiter.advance();
        let hub = Arc::new(ConnectionHub::new());
        let (tx, mut rx) = mpsc::channel(16);
        hub.accept("client".into(), tx).await;

        let mut ctl = GestureController::new(GestureConfig::default(), arbiter, hub);
        ctl.observe(Some(detection("Thumb_Up", 0.9))).await;
        assert!(rx.try_recv().is_ok());

        ctl.observe(None).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(ctl.window.len(), 1);
    }
}
