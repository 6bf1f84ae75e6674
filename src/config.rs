//! TOML configuration for the rover hub
//!
//! Follows a fail-safe approach: a missing configuration file is replaced by
//! a default one on startup, and a corrupted file degrades to defaults with a
//! warning rather than preventing the process from serving.

use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Network settings for the WebSocket/health server.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Settings for the joystick-driven manual control loop.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct JoystickConfig {
    /// Axis magnitude below which input reads as zero
    pub deadzone: f32,
    /// Device poll cadence in milliseconds
    pub poll_interval_ms: u64,
    /// Minimum interval between two broadcast commands in milliseconds
    pub command_interval_ms: u64,
    /// Starting gain applied to both motor outputs
    pub initial_sensitivity: f32,
    /// Gain change per tick while an adjust button is held
    pub sensitivity_step: f32,
    pub sensitivity_min: f32,
    pub sensitivity_max: f32,
    /// Seconds between reconnection attempts when no gamepad is present
    pub retry_interval_s: u64,
    /// Minimum dwell between two accepted mode-switch presses in milliseconds
    pub mode_switch_dwell_ms: u64,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            deadzone: 0.1,
            poll_interval_ms: 20,
            command_interval_ms: 100,
            initial_sensitivity: 0.5,
            sensitivity_step: 0.05,
            sensitivity_min: 0.1,
            sensitivity_max: 1.0,
            retry_interval_s: 10,
            mode_switch_dwell_ms: 500,
        }
    }
}

/// Settings for the gesture control loop and its command tables.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct GestureConfig {
    /// Classifier results below this confidence never enter the window
    pub confidence_threshold: f32,
    /// Capacity of the stabilization window
    pub window_size: usize,
    /// Motor magnitude for FORWARD/BACKWARD
    pub translational_speed: f32,
    /// Motor magnitude for TURN_LEFT/TURN_RIGHT
    pub rotational_speed: f32,
    /// Gesture label to canonical drive command name
    pub commands: HashMap<String, String>,
}

impl Default for GestureConfig {
    fn default() -> Self {
        let commands = [
            ("Thumb_Up", "FORWARD"),
            ("Thumb_Down", "BACKWARD"),
            ("Victory", "TURN_LEFT"),
            ("Pointing_Up", "TURN_RIGHT"),
            ("ILoveYou", "SPIN"),
            ("Open_Palm", "STOP"),
            ("Closed_Fist", "STOP"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            confidence_threshold: 0.5,
            window_size: 5,
            translational_speed: 0.6,
            rotational_speed: 0.6,
            commands,
        }
    }
}

/// Complete application configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct RoverConfig {
    pub server: ServerConfig,
    pub joystick: JoystickConfig,
    pub gesture: GestureConfig,
}

impl RoverConfig {
    /// Default path: `<config_dir>/roverhub/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| eyre!("No config directory available"))?;
        Ok(base.join("roverhub").join("config.toml"))
    }

    /// Writes a default configuration file if none exists yet.
    pub fn ensure_default_config() -> Result<PathBuf> {
        let path = Self::default_path()?;
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let serialized = toml::to_string_pretty(&Self::default())?;
            std::fs::write(&path, serialized)?;
            info!("Wrote default configuration to {}", path.display());
        }
        Ok(path)
    }

    /// Loads the configuration, falling back to defaults on a corrupt file.
    pub fn load() -> Result<Self> {
        let path = Self::ensure_default_config()?;
        let contents = std::fs::read_to_string(&path)?;
        match toml::from_str(&contents) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!(
                    "Failed to parse {} ({}), continuing with defaults",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = RoverConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: RoverConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.joystick.deadzone, config.joystick.deadzone);
        assert_eq!(parsed.gesture.window_size, config.gesture.window_size);
        assert_eq!(parsed.server.port, config.server.port);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: RoverConfig =
            toml::from_str("[server]\nhost = \"127.0.0.1\"\nport = 9001\n").unwrap();
        assert_eq!(parsed.server.port, 9001);
        assert_eq!(parsed.joystick.command_interval_ms, 100);
        assert_eq!(parsed.gesture.confidence_threshold, 0.5);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let parsed: RoverConfig = toml::from_str("[joystick]\ndeadzone = 0.25\n").unwrap();
        assert_eq!(parsed.joystick.deadzone, 0.25);
        assert_eq!(parsed.joystick.command_interval_ms, 100);
        assert_eq!(parsed.joystick.mode_switch_dwell_ms, 500);
        assert_eq!(parsed.server.port, 8000);
        assert_eq!(parsed.gesture.window_size, 5);
    }

    #[test]
    fn default_gesture_table_maps_known_labels() {
        let config = GestureConfig::default();
        assert_eq!(config.commands.get("Thumb_Up").unwrap(), "FORWARD");
        assert_eq!(config.commands.get("Closed_Fist").unwrap(), "STOP");
    }
}
