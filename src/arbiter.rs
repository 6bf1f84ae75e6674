//! Mode Arbiter - single source of truth for the active control source
//!
//! Both control loops query the arbiter every tick; only the loop whose mode
//! is current may broadcast. Transitions happen exclusively through
//! [`ModeArbiter::advance`], driven by the debounced mode-switch button in
//! the manual loop, so two loops can never race a mode change.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Which control loop is authoritative right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Manual,
    Gesture,
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMode::Manual => write!(f, "Manual"),
            ControlMode::Gesture => write!(f, "Gesture"),
        }
    }
}

/// Fixed, ordered cycle of modes. `advance` walks this list modulo its length.
const MODES: [ControlMode; 2] = [ControlMode::Manual, ControlMode::Gesture];

/// Process-wide mode state with torn-read-free access.
///
/// The index is a single atomic, so readers always observe either the old or
/// the new mode, never an intermediate value. Mutation is serialized through
/// `fetch_update`.
#[derive(Debug)]
pub struct ModeArbiter {
    current: AtomicUsize,
}

impl ModeArbiter {
    pub fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
        }
    }

    /// Advances to the next mode in the cycle and returns it.
    ///
    /// Callers are responsible for debouncing the physical trigger; a single
    /// button press must reach this method exactly once.
    pub fn advance(&self) -> ControlMode {
        let previous = self
            .current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |index| {
                Some((index + 1) % MODES.len())
            })
            .unwrap_or(0);
        let mode = MODES[(previous + 1) % MODES.len()];
        info!("Control mode switched to {}", mode);
        mode
    }

    /// The mode as of the most recently completed `advance`.
    pub fn current(&self) -> ControlMode {
        MODES[self.current.load(Ordering::SeqCst) % MODES.len()]
    }
}

impl Default for ModeArbiter {
    fn default() -> Self {
        Self::new()
    }
}
