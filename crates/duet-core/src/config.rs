//! Configuration management for duet.
//!
//! This module provides core configuration that doesn't depend on
//! platform-specific UI libraries.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::APP_NAME;

/// Core configuration structure for the application.
///
/// This contains settings that are platform-agnostic. Platform-specific
/// settings like hotkeys are handled separately by the main application.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Endpoint that selected audio files are posted to. Nothing is uploaded
    /// until this is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,

    /// Name of the multipart field carrying the audio file
    #[serde(
        default = "default_upload_field",
        skip_serializing_if = "is_default_upload_field"
    )]
    pub upload_field: String,

    /// Value sent verbatim as the `Authorization` header on uploads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_auth: Option<String>,

    /// Time each countdown number stays on screen (in milliseconds)
    #[serde(
        default = "default_countdown_step_ms",
        skip_serializing_if = "is_default_countdown_step_ms"
    )]
    pub countdown_step_ms: u64,

    /// Time "GO!" stays on screen before recording starts (in milliseconds)
    #[serde(
        default = "default_countdown_final_ms",
        skip_serializing_if = "is_default_countdown_final_ms"
    )]
    pub countdown_final_ms: u64,

    /// How much captured media goes into each recorded chunk (in milliseconds)
    #[serde(
        default = "default_chunk_interval_ms",
        skip_serializing_if = "is_default_chunk_interval_ms"
    )]
    pub chunk_interval_ms: u64,

    /// Index of the camera to record from, as the OS enumerates them
    #[serde(default, skip_serializing_if = "is_default_camera")]
    pub camera: u32,

    /// Hotkey configuration (stored as string, parsed by app)
    /// Format: "modifier+modifier+key" e.g., "meta+shift+KeyR"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,
}

fn default_upload_field() -> String {
    "audio".to_string()
}

fn is_default_upload_field(v: &String) -> bool {
    v == "audio"
}

fn default_countdown_step_ms() -> u64 {
    1000
}

fn is_default_countdown_step_ms(v: &u64) -> bool {
    *v == 1000
}

fn default_countdown_final_ms() -> u64 {
    500
}

fn is_default_countdown_final_ms(v: &u64) -> bool {
    *v == 500
}

fn default_chunk_interval_ms() -> u64 {
    250
}

fn is_default_chunk_interval_ms(v: &u64) -> bool {
    *v == 250
}

fn is_default_camera(v: &u32) -> bool {
    *v == 0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_url: None,
            upload_field: default_upload_field(),
            upload_auth: None,
            countdown_step_ms: default_countdown_step_ms(),
            countdown_final_ms: default_countdown_final_ms(),
            chunk_interval_ms: default_chunk_interval_ms(),
            camera: 0,
            hotkey: None,
        }
    }
}

impl Config {
    /// Get the upload endpoint
    pub fn upload_url(&self) -> Option<&str> {
        self.upload_url.as_deref()
    }

    /// Get the upload authorization header value
    pub fn upload_auth(&self) -> Option<&str> {
        self.upload_auth.as_deref()
    }

    /// Get the countdown cadence as a Duration
    pub fn countdown_step(&self) -> Duration {
        Duration::from_millis(self.countdown_step_ms)
    }

    /// Get the "GO!" hold time as a Duration
    pub fn countdown_final(&self) -> Duration {
        Duration::from_millis(self.countdown_final_ms)
    }

    /// Get the capture chunk length as a Duration
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms.max(1))
    }
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration directory.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a new ConfigManager with a specified configuration directory.
    pub fn with_config_dir<P: AsRef<std::path::Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;

        if config.upload_url().is_none() {
            warn!(
                "Upload URL is not set. Uploads will not be sent without it. \
                 Copy the config path via the tray icon to set it."
            );
        }

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.upload_url.is_none());
        assert_eq!(config.upload_field, "audio");
        assert_eq!(config.countdown_step(), Duration::from_secs(1));
        assert_eq!(config.countdown_final(), Duration::from_millis(500));
        assert_eq!(config.chunk_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_defaults_are_not_serialized() {
        let serialized = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(serialized.trim().is_empty(), "got {serialized:?}");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            upload_url = "https://example.invalid/upload"
            countdown_step_ms = 10
            camera = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.upload_url(), Some("https://example.invalid/upload"));
        assert_eq!(config.countdown_step(), Duration::from_millis(10));
        assert_eq!(config.upload_field, "audio");
        assert_eq!(config.countdown_final_ms, 500);
        assert_eq!(config.camera, 1);
    }

    #[test]
    fn test_zero_chunk_interval_is_clamped() {
        let config = Config {
            chunk_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.chunk_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_config_manager_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path().join("nested"));

        let config = Config {
            upload_url: Some("http://localhost:8080/upload".to_string()),
            upload_field: "file".to_string(),
            ..Default::default()
        };

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(config, loaded);
        assert!(fs::metadata(manager.config_path()).is_ok());
    }

    #[test]
    fn test_missing_file_loads_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path());
        assert_eq!(manager.load().unwrap(), Config::default());
    }
}
