//! Configuration management for callroute
//!
//! This module provides:
//! - Routing, Bluetooth, capability and engine settings
//! - TOML serialization with async load/save
//! - A config manager that falls back to defaults on missing or corrupt files

use crate::domain::device::{Capabilities, CapabilityProbe, DeviceKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How the loudspeaker takes part in automatic selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerphoneBehavior {
    /// Earpiece by default; proximity hints may flip to the loudspeaker
    #[default]
    Auto,
    /// Loudspeaker by default
    Always,
    /// Earpiece by default; proximity hints are ignored
    Never,
}

impl SpeakerphoneBehavior {
    /// Handset chosen when neither Bluetooth nor a wired headset is present
    pub fn default_handset(&self) -> DeviceKind {
        match self {
            SpeakerphoneBehavior::Always => DeviceKind::Speakerphone,
            SpeakerphoneBehavior::Auto | SpeakerphoneBehavior::Never => DeviceKind::Earpiece,
        }
    }
}

/// Route selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub speakerphone: SpeakerphoneBehavior,

    /// Follow proximity sensor hints (only in `auto` mode)
    #[serde(default = "default_true")]
    pub proximity: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            speakerphone: SpeakerphoneBehavior::Auto,
            proximity: true,
        }
    }
}

impl RoutingConfig {
    /// Whether proximity hints are consulted at all
    pub fn follows_proximity(&self) -> bool {
        self.proximity && self.speakerphone == SpeakerphoneBehavior::Auto
    }
}

/// Bluetooth headset settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BluetoothConfig {
    /// Label used when the headset does not report a name
    #[serde(default = "default_bluetooth_label")]
    pub fallback_label: String,

    /// SCO start attempts allowed per headset connection
    #[serde(default = "default_sco_attempts")]
    pub sco_max_attempts: u32,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            fallback_label: default_bluetooth_label(),
            sco_max_attempts: default_sco_attempts(),
        }
    }
}

/// Optional overrides of the host capability probe
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CapabilityOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earpiece: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speakerphone: Option<bool>,
}

impl CapabilityOverrides {
    /// Probe the host, letting configured values win
    pub fn resolve(&self, probe: &dyn CapabilityProbe) -> Capabilities {
        let probed = Capabilities::probe(probe);
        Capabilities {
            has_earpiece: self.earpiece.unwrap_or(probed.has_earpiece),
            has_speakerphone: self.speakerphone.unwrap_or(probed.has_speakerphone),
        }
    }
}

/// Signal intake settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_queue_capacity")]
    pub signal_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signal_queue_capacity: default_queue_capacity(),
        }
    }
}

/// Complete callroute configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallRouteConfig {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub bluetooth: BluetoothConfig,
    #[serde(default)]
    pub capabilities: CapabilityOverrides,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_true() -> bool {
    true
}

fn default_bluetooth_label() -> String {
    DeviceKind::Bluetooth.default_label().to_string()
}

fn default_sco_attempts() -> u32 {
    2
}

fn default_queue_capacity() -> usize {
    64
}

impl CallRouteConfig {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.engine.signal_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "engine.signal_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.bluetooth.fallback_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "bluetooth.fallback_label must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_toml(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }
}

/// Manages the main configuration file at `~/.config/callroute/config.toml`
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self {
            config_dir,
            config_path,
        }
    }

    /// Returns `~/.config/callroute` on Linux, the platform equivalent elsewhere
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("callroute"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// A missing file is created with defaults. A corrupt file is backed up
    /// next to the original and defaults are returned.
    #[instrument(skip(self))]
    pub async fn load(&self) -> CallRouteConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, writing defaults"
            );

            let config = CallRouteConfig::default();
            if let Err(e) = self.save(&config).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save default config"
                );
            }
            return config;
        }

        match CallRouteConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                CallRouteConfig::default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &CallRouteConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }
}
