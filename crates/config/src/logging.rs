//! Logging settings
//!
//! `[log]` sets the base level, the line format and the destination.
//! `[log.targets]` overrides the level of single crates or modules, so one
//! connector can be traced without flooding the rest:
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "json"
//! output = "/var/log/vigil.log"
//!
//! [log.targets]
//! "vigil_connectors::jenkins" = "debug"
//! reqwest = "off"
//! ```

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::str::FromStr;

/// Severity threshold, most verbose first
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every fetched build and every snapshot decision
    Trace,
    /// One line per poll
    Debug,
    /// Lifecycle and registrations
    #[default]
    Info,
    /// Failed polls and skipped builds
    Warn,
    Error,
    /// Silence a target entirely
    Off,
}

impl LogLevel {
    /// Name as understood by an `EnvFilter` directive
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "off" => Ok(Self::Off),
            other => Err(format!(
                "unknown log level '{}' (expected trace, debug, info, warn, error or off)",
                other
            )),
        }
    }
}

/// Line format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    /// One JSON object per line
    Json,
}

/// Where log lines go
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Any other value is a file path, opened for appending
    #[serde(untagged)]
    File(PathBuf),
}

impl LogOutput {
    /// Whether console lines should carry ANSI colours
    ///
    /// Only an interactive terminal gets them; files and pipes stay plain.
    pub fn supports_ansi(&self) -> bool {
        match self {
            Self::Stdout => std::io::stdout().is_terminal(),
            Self::Stderr => std::io::stderr().is_terminal(),
            Self::File(_) => false,
        }
    }
}

/// Logging section of the configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base level for every target without an override
    pub level: LogLevel,

    pub format: LogFormat,

    pub output: LogOutput,

    /// Per crate or module level overrides, keyed by target path
    pub targets: BTreeMap<String, LogLevel>,
}

impl LogConfig {
    /// Build the filter directive for the subscriber
    ///
    /// `base_override` (the command line flag) replaces the base level only.
    /// Target overrides always apply, in path order.
    pub fn filter_directive(&self, base_override: Option<LogLevel>) -> String {
        let base = base_override.unwrap_or(self.level);
        let mut directive = base.as_str().to_string();
        for (target, level) in &self.targets {
            directive.push(',');
            directive.push_str(target);
            directive.push('=');
            directive.push_str(level.as_str());
        }
        directive
    }

    /// Reject target keys that cannot appear in a filter directive
    pub(crate) fn validate(&self) -> Result<()> {
        for target in self.targets.keys() {
            let valid = !target.is_empty()
                && !target.starts_with(':')
                && !target.ends_with(':')
                && target
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
            if !valid {
                return Err(ConfigError::invalid_value(
                    "log",
                    target.as_str(),
                    "targets",
                    "expected a crate or module path such as 'vigil_connectors::jenkins'",
                ));
            }
        }
        Ok(())
    }
}
