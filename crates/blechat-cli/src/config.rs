//! BLE chat CLI configuration management
//!
//! Configuration is layered with the priority order
//! CLI flags > environment > configuration file > defaults:
//! - a TOML file given with `--config`, else `~/.blechat/config.toml` if present
//! - `BLECHAT_TRANSPORT` selects the transport (`ble`, `simulated` or `mock`)
//! - `--simulate`, `--data-dir` and `--verbose` override both

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use blechat_ble::BleTransportConfig;
use blechat_core::{SimulatorConfig, TransportKind};

use crate::cli::Cli;

/// Environment variable that selects the transport
pub const TRANSPORT_ENV: &str = "BLECHAT_TRANSPORT";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the BLE chat CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transport: TransportConfig,
    pub ble: BleTransportConfig,
    pub simulator: SimulatorConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Which transport the session is built on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
}

/// Conversation history persistence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to `~/.blechat/history`
    pub history_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable verbose logging output
    pub verbose: bool,
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration for a command line invocation
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let config = match &cli.config {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Self::default(),
            },
        };

        let env_transport = std::env::var(TRANSPORT_ENV).ok();
        let config = config
            .with_transport_override(env_transport.as_deref())?
            .with_cli_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileSystem(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
            .map_err(|e| ConfigError::Loading(format!("Failed to load from {}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Loading(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply a transport name from the environment, if any
    pub fn with_transport_override(mut self, value: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.transport.kind = value.parse().map_err(ConfigError::Environment)?;
        }
        Ok(self)
    }

    /// Apply command line flags
    pub fn with_cli_overrides(mut self, cli: &Cli) -> Self {
        if cli.simulate {
            self.transport.kind = TransportKind::Simulated;
        }
        if let Some(dir) = &cli.data_dir {
            self.storage.history_dir = Some(dir.clone());
        }
        if cli.verbose {
            self.logging.verbose = true;
        }
        self
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".blechat").join("config.toml"))
    }

    /// Directory holding one history file per device
    pub fn history_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.storage.history_dir {
            return Ok(dir.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(".blechat").join("history"))
            .ok_or_else(|| {
                ConfigError::Environment("No home directory for history storage".to_string())
            })
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ble.scan_duration_ms == 0 {
            return Err(ConfigError::Validation(
                "BLE scan duration must be greater than 0".to_string(),
            ));
        }
        if self.ble.connection_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "BLE connection timeout must be greater than 0".to_string(),
            ));
        }
        if self.ble.max_write_size == 0 {
            return Err(ConfigError::Validation(
                "BLE max write size must be greater than 0".to_string(),
            ));
        }
        if self.ble.write_characteristic == self.ble.notify_characteristic {
            return Err(ConfigError::Validation(
                "BLE write and notify characteristics must differ".to_string(),
            ));
        }

        if self.simulator.scan_duration_ms == 0 || self.simulator.connect_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "Simulator timeouts must be greater than 0".to_string(),
            ));
        }
        if self.simulator.ping_interval_ms == Some(0) {
            return Err(ConfigError::Validation(
                "Simulator ping interval must be greater than 0".to_string(),
            ));
        }
        if self.transport.kind == TransportKind::Simulated && self.simulator.devices.is_empty() {
            return Err(ConfigError::Validation(
                "At least one simulated device must be configured".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialization(format!("Failed to serialize config: {}", e)))
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
