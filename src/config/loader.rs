use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/acmeter/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("acmeter").join("config.toml")
    }

    /// Loads configuration from the default config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from an explicit path.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - If the file exists, parses it as TOML and validates.
    /// - Returns an error if reading, parsing, or validation fails.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The tariff is non-degenerate (tick cost and duration above zero)
    /// - Both base URLs are set
    /// - The dashboard bind address and feed address parse as socket addresses
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.appliance.tick_cost == 0 {
            return Err(validation("appliance.tick_cost must be greater than zero"));
        }
        if self.appliance.tick_duration_ms == 0 {
            return Err(validation(
                "appliance.tick_duration_ms must be greater than zero",
            ));
        }
        if self.probe.interval_secs == 0 {
            return Err(validation("probe.interval_secs must be greater than zero"));
        }
        if self.appliance.base_url.trim().is_empty() {
            return Err(validation("appliance.base_url must not be empty"));
        }
        if self.ledger.node_url.trim().is_empty() {
            return Err(validation("ledger.node_url must not be empty"));
        }

        let bind = &self.dashboard.bind_addr;
        if bind.parse::<SocketAddr>().is_err() {
            return Err(validation(&format!(
                "dashboard.bind_addr '{}' is not a valid socket address",
                bind
            )));
        }

        // The feed may name a host, so only the host:port shape is checked.
        let feed = &self.ledger.feed_addr;
        let port_ok = feed
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !port_ok {
            return Err(validation(&format!(
                "ledger.feed_addr '{}' must be host:port",
                feed
            )));
        }

        Ok(())
    }
}

fn validation(message: &str) -> ConfigError {
    ConfigError::ValidationError {
        message: message.to_string(),
    }
}
