//! Connector-specific settings
//!
//! Each connector type reads its settings from the ordered configuration
//! items of its [`ConnectorConfiguration`]. Missing or malformed required
//! items fail here, at creation time, before anything is scheduled.

use crate::error::ConnectorError;
use crate::resilience::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS, ResilienceConfig};
use std::str::FromStr;
use vigil_config::ConnectorConfiguration;

/// Required item: returns its trimmed value or a MissingItem error
fn required<'a>(
    config: &'a ConnectorConfiguration,
    item: &'static str,
) -> Result<&'a str, ConnectorError> {
    config
        .item(item)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConnectorError::missing_item(&config.name, item))
}

/// Optional item parsed into `T`, falling back to `default`
fn parsed<T>(
    config: &ConnectorConfiguration,
    item: &'static str,
    default: T,
) -> Result<T, ConnectorError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match config.item(item).map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConnectorError::invalid_item(&config.name, item, e.to_string())),
    }
}

/// Jenkins connector settings
///
/// ```toml
/// [[connectors]]
/// type = "jenkins"
/// name = "core main"
///
/// [connectors.items]
/// server = "https://ci.example.com"
/// project = "core/main"      # folders separated by '/'
/// username = "ci-bot"        # optional
/// api_token = "11abc..."     # optional
/// timeout_secs = 30          # optional, per request
/// max_retries = 2            # optional
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JenkinsConnectorConfig {
    /// Server base URL without trailing slash
    pub server: String,
    /// Job path, folders separated by '/'
    pub project: String,
    pub username: Option<String>,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl JenkinsConnectorConfig {
    pub fn from_configuration(config: &ConnectorConfiguration) -> Result<Self, ConnectorError> {
        let server = required(config, "server")?.trim_end_matches('/').to_string();
        if !server.starts_with("http://") && !server.starts_with("https://") {
            return Err(ConnectorError::invalid_item(
                &config.name,
                "server",
                format!("expected an http(s) URL, got '{}'", server),
            ));
        }

        let project = required(config, "project")?.trim_matches('/').to_string();
        let username = config.item("username").map(str::to_string);
        let api_token = config.item("api_token").map(str::to_string);

        if api_token.is_some() && username.is_none() {
            return Err(ConnectorError::missing_item(&config.name, "username"));
        }

        // A zero per-request timeout would fail every request
        let timeout_secs = parsed(config, "timeout_secs", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConnectorError::invalid_item(
                &config.name,
                "timeout_secs",
                "must be greater than zero",
            ));
        }

        Ok(Self {
            server,
            project,
            username,
            api_token,
            timeout_secs,
            max_retries: parsed(config, "max_retries", DEFAULT_MAX_RETRIES)?,
        })
    }

    /// Build resilience config from these settings
    pub fn resilience_config(&self) -> ResilienceConfig {
        ResilienceConfig {
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            ..Default::default()
        }
    }
}

/// Default port probed by the ping connector
pub const DEFAULT_PING_PORT: u16 = 80;

/// Default connect timeout of the ping connector
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 2000;

/// Ping (host health check) connector settings
///
/// ```toml
/// [[connectors]]
/// type = "ping"
/// name = "gateway"
///
/// [connectors.items]
/// host = "10.0.0.1"
/// port = 22            # optional, default 80
/// timeout_ms = 1500    # optional, default 2000
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingConnectorConfig {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl PingConnectorConfig {
    pub fn from_configuration(config: &ConnectorConfiguration) -> Result<Self, ConnectorError> {
        let timeout_ms = parsed(config, "timeout_ms", DEFAULT_PING_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(ConnectorError::invalid_item(
                &config.name,
                "timeout_ms",
                "must be greater than zero",
            ));
        }

        Ok(Self {
            host: required(config, "host")?.to_string(),
            port: parsed(config, "port", DEFAULT_PING_PORT)?,
            timeout_ms,
        })
    }

    /// `host:port` as accepted by `TcpStream::connect`
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
