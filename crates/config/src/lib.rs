//! Vigil Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! A config with no sections is valid: nothing is observed and logging
//! goes to stdout at `info`.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use vigil_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[scheduler]\ndefault_interval_secs = 10").unwrap();
//! assert_eq!(config.scheduler.default_interval_secs, 10);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [[connectors]]
//! type = "jenkins"
//! name = "core main"
//!
//! [connectors.items]
//! server = "https://ci.example.com"
//! project = "core/main"
//! interval = 30
//! ```

mod connectors;
mod error;
mod logging;
mod scheduler;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use connectors::{ConfigurationItem, ConnectorConfiguration, RawConnectorConfig};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use scheduler::SchedulerConfig;

use serde::Deserialize;

/// Raw document as written on disk, before connector entries are resolved
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    log: LogConfig,
    scheduler: SchedulerConfig,
    connectors: Vec<RawConnectorConfig>,
}

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Observation scheduler settings
    pub scheduler: SchedulerConfig,

    /// Observed targets, in document order
    pub connectors: Vec<ConnectorConfiguration>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(s).map_err(ConfigError::ParseError)?;

        let connectors = raw
            .connectors
            .into_iter()
            .map(ConnectorConfiguration::try_from)
            .collect::<Result<Vec<_>>>()?;

        let config = Config {
            log: raw.log,
            scheduler: raw.scheduler,
            connectors,
        };
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Connectors that should be scheduled
    pub fn enabled_connectors(&self) -> impl Iterator<Item = &ConnectorConfiguration> {
        self.connectors.iter().filter(|c| c.enabled)
    }

    /// Find a connector by name or identifier string
    pub fn find_connector(&self, key: &str) -> Option<&ConnectorConfiguration> {
        self.connectors
            .iter()
            .find(|c| c.name == key || c.identifier.to_string() == key)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
