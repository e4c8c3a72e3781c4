//! Configuration file support for the blood-pressure journal.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/bp/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Measurement protocol timing configuration
///
/// The protocol itself is fixed at three readings per session; only the
/// countdown durations are tunable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Optional rest countdown before the first reading, in seconds
    #[serde(default = "default_prep_seconds")]
    pub prep_seconds: u32,

    /// Mandatory wait between successive readings, in seconds
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            prep_seconds: default_prep_seconds(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("bp")
}

fn default_prep_seconds() -> u32 {
    300
}

fn default_cooldown_seconds() -> u32 {
    90
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Check that the configured durations are usable
    pub fn validate(&self) -> Result<()> {
        if self.protocol.prep_seconds == 0 {
            return Err(Error::Config("prep_seconds must be greater than zero".into()));
        }
        if self.protocol.cooldown_seconds == 0 {
            return Err(Error::Config(
                "cooldown_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("bp").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
