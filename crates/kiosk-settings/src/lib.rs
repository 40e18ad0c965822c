//! Kiosk Shell Settings
//!
//! This crate resolves the storage directory shared by the identity file and
//! the configuration document, and loads the optional shell settings file
//! that controls logging.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

pub mod location;

pub use location::{StorageLocation, StorageSource, PORTABLE_DIR_ENV};

/// Settings loading and parsing errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("No storage directory could be determined")]
    NoStorageLocation,
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Shell-level settings read from `settings.toml` in the storage directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ShellSettings {
    /// Logging output configuration
    pub logging: LoggingSettings,
}

/// Logging output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level ("trace", "debug", "info", "warn", "error"); `RUST_LOG` overrides
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Log to stderr
    pub console: bool,
    /// Log to `<storage>/logs/kiosk-shell.log`
    pub file: bool,
    /// Log file rotation
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Hourly,
    Daily,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            console: true,
            file: true,
            rotation: LogRotation::Daily,
        }
    }
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ShellSettings {
    /// Load settings from the storage location, falling back to defaults when absent
    pub async fn load(location: &StorageLocation) -> Result<Self, SettingsError> {
        Self::load_from_path(location.settings_file()).await
    }

    /// Load settings from specific path
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Settings file not found at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };

        // Try parsing as JSON first, then TOML
        let settings = if let Ok(settings) = serde_json::from_str::<Self>(&content) {
            settings
        } else {
            toml::from_str::<Self>(&content)?
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings for consistency
    pub fn validate(&self) -> Result<(), SettingsError> {
        let level = self.logging.level.to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(SettingsError::Invalid(format!(
                "logging.level must be one of {}, got '{}'",
                LEVELS.join(", "),
                self.logging.level
            )));
        }

        Ok(())
    }
}
