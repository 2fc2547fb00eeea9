//! Configuration loader and validator
//!
//! Loads controller settings from TOML files in the configs/ directory.

use crate::joystick::constants::{
    DEFAULT_DEVICE_PATH, DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_THREAD_NAME,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Controller settings
    #[serde(default)]
    pub controller: ControllerSettings,
}

/// Settings for one gamepad decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Display name used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Joystick device file to open
    #[serde(default = "default_device_path")]
    pub device_path: String,

    /// Name of the read loop thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Queue bound for each channel subscriber
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            device_path: default_device_path(),
            thread_name: default_thread_name(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_name() -> String { "Default Controller".to_string() }
fn default_device_path() -> String { DEFAULT_DEVICE_PATH.to_string() }
fn default_thread_name() -> String { DEFAULT_THREAD_NAME.to_string() }
fn default_event_channel_capacity() -> usize { DEFAULT_EVENT_CHANNEL_CAPACITY }

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!("Loading configuration from: {}", path_ref.display());

        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::from_toml(&content)?;

        info!("✓ Config loaded");
        Ok(config)
    }

    /// Load default configuration from configs/default.toml
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load("configs/default.toml")
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;

        debug!("  - Controller: '{}'", config.controller.name);
        debug!("  - Device: {}", config.controller.device_path);
        debug!("  - Channel capacity: {}", config.controller.event_channel_capacity);

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()
    }
}

impl ControllerSettings {
    /// Validate the controller settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_path.trim().is_empty() {
            return Err(ConfigError::Invalid("device_path must not be empty".into()));
        }

        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid("thread_name must not be empty".into()));
        }

        if self.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_channel_capacity must be at least 1".into()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ControllerSettings::default();
        assert_eq!(settings.name, "Default Controller");
        assert_eq!(settings.device_path, "/dev/input/js0");
        assert_eq!(settings.thread_name, "gamepad-read-loop");
        assert_eq!(settings.event_channel_capacity, 64);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.controller, ControllerSettings::default());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml(
            r#"
            [controller]
            name = "Dome Pad"
            device_path = "/dev/input/js1"
            "#,
        )
        .unwrap();

        assert_eq!(config.controller.name, "Dome Pad");
        assert_eq!(config.controller.device_path, "/dev/input/js1");
        assert_eq!(config.controller.thread_name, "gamepad-read-loop");
    }

    #[test]
    fn test_invalid_capacity() {
        let result = Config::from_toml(
            r#"
            [controller]
            event_channel_capacity = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_device_path() {
        let mut config = Config::default();
        config.controller.device_path = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let result = Config::from_toml("[controller\nname = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
