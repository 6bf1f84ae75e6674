//! Control-producer loops that feed the connection hub
//!
//! Two independent producers compute motor commands and contend for the
//! current mode:
//!
//! ```text
//! Gamepad ──► ManualControl ──┐
//!                             ├──► ModeArbiter gate ──► ConnectionHub::broadcast
//! Classifier ──► GestureController ──┘
//! ```
//!
//! The manual loop runs as its own tokio task on a fixed poll cadence; the
//! gesture controller is driven synchronously by the inbound frame rate from
//! the image service.

pub mod gesture;
pub mod manual;

pub use gesture::{GestureController, GestureDetection};
pub use manual::ManualControlHandle;

/// Minimum-interval gate for command emission.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval_ms: u64,
    last_event_time: std::time::Instant,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            // Backdate so the first event always passes
            last_event_time: std::time::Instant::now()
                - std::time::Duration::from_millis(min_interval_ms),
        }
    }

    /// Returns true and rearms when at least the minimum interval has passed.
    pub fn should_process(&mut self) -> bool {
        let now = std::time::Instant::now();
        let elapsed = now.duration_since(self.last_event_time);

        if elapsed.as_millis() as u64 >= self.min_interval_ms {
            self.last_event_time = now;
            true
        } else {
            false
        }
    }
}

/// Rising-edge detector with a minimum dwell between accepted presses.
///
/// Used for the mode-switch button: a held button produces no repeat
/// triggers, and a bouncing contact inside the dwell window counts as one
/// press.
#[derive(Debug, Clone)]
pub struct EdgeDebouncer {
    dwell: std::time::Duration,
    last_accepted: std::time::Instant,
    was_pressed: bool,
}

impl EdgeDebouncer {
    pub fn new(dwell_ms: u64) -> Self {
        let dwell = std::time::Duration::from_millis(dwell_ms);
        Self {
            dwell,
            // Backdate so the first edge is always accepted
            last_accepted: std::time::Instant::now() - dwell,
            was_pressed: false,
        }
    }

    /// Feeds one sampled button level; returns true exactly when a rising
    /// edge arrives at least one dwell after the last accepted edge.
    pub fn should_trigger(&mut self, pressed: bool) -> bool {
        let edge = pressed && !self.was_pressed;
        self.was_pressed = pressed;

        if edge && self.last_accepted.elapsed() >= self.dwell {
            self.last_accepted = std::time::Instant::now();
            true
        } else {
            false
        }
    }
}
