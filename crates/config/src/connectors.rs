//! Connector configuration entries
//!
//! Each `[[connectors]]` entry names a connector type and carries an ordered
//! list of configuration items. Connector-specific parsing of those items is
//! handled by the connector implementation.
//!
//! ```toml
//! [[connectors]]
//! identifier = "6a1f3c52-5d0e-4a55-9a9e-0b1b8f0f6c11"
//! type = "jenkins"
//! name = "core main"
//!
//! [connectors.items]
//! server = "https://ci.example.com"
//! project = "core/main"
//! interval = 30
//! ```

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use uuid::Uuid;

/// Name of the item holding a per-connector poll interval in seconds
pub const INTERVAL_ITEM: &str = "interval";

/// Connector entry as written in the document
#[derive(Debug, Clone, Deserialize)]
pub struct RawConnectorConfig {
    /// Stable identifier; derived from type and name when absent
    pub identifier: Option<Uuid>,

    /// Connector type (e.g., "jenkins", "ping")
    #[serde(rename = "type")]
    pub connector_type: Option<String>,

    /// Display name
    pub name: Option<String>,

    /// Whether this connector is scheduled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Connector-specific settings, in document order
    #[serde(default)]
    pub items: toml::Table,
}

fn default_enabled() -> bool {
    true
}

/// A single key/value configuration item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationItem {
    pub key: String,
    pub value: String,
}

/// Identity and settings of one observed target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfiguration {
    /// Stable across restarts; never changes once created
    pub identifier: Uuid,

    /// Plugin key selecting the connector implementation
    pub connector_type: String,

    /// Display name
    pub name: String,

    /// Whether this connector is scheduled
    pub enabled: bool,

    /// Ordered configuration items
    pub items: Vec<ConfigurationItem>,
}

impl ConnectorConfiguration {
    /// Create a configuration with a derived identifier and no items
    pub fn new(connector_type: impl Into<String>, name: impl Into<String>) -> Self {
        let connector_type = connector_type.into();
        let name = name.into();
        Self {
            identifier: derive_identifier(&connector_type, &name),
            connector_type,
            name,
            enabled: true,
            items: Vec::new(),
        }
    }

    /// Append an item, replacing any existing value for the key in place
    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.items.iter_mut().find(|item| item.key == key) {
            Some(item) => item.value = value,
            None => self.items.push(ConfigurationItem { key, value }),
        }
        self
    }

    /// Override the identifier
    pub fn with_identifier(mut self, identifier: Uuid) -> Self {
        self.identifier = identifier;
        self
    }

    /// Look up an item value
    pub fn item(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.key == key)
            .map(|item| item.value.as_str())
    }

    /// Poll interval in seconds: the `interval` item when present, else `default`
    ///
    /// # Errors
    ///
    /// Returns error if the item is not a non-negative integer.
    pub fn poll_interval_secs(&self, default: u64) -> Result<u64> {
        match self.item(INTERVAL_ITEM) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::invalid_value(
                    "connector",
                    &self.name,
                    "interval",
                    format!("expected non-negative whole seconds, got '{}'", raw),
                )
            }),
        }
    }
}

impl TryFrom<RawConnectorConfig> for ConnectorConfiguration {
    type Error = ConfigError;

    fn try_from(raw: RawConnectorConfig) -> Result<Self> {
        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ConfigError::missing_field("connector", "<unnamed>", "name"))?;

        let connector_type = raw
            .connector_type
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::missing_field("connector", &name, "type"))?;

        let mut items = Vec::with_capacity(raw.items.len());
        for (key, value) in raw.items {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(d) => d.to_string(),
                toml::Value::Array(_) | toml::Value::Table(_) => {
                    return Err(ConfigError::invalid_value(
                        "connector",
                        &name,
                        "items",
                        format!("item '{}' must be a scalar value", key),
                    ));
                }
            };
            items.push(ConfigurationItem { key, value });
        }

        let identifier = raw
            .identifier
            .unwrap_or_else(|| derive_identifier(&connector_type, &name));

        Ok(Self {
            identifier,
            connector_type,
            name,
            enabled: raw.enabled,
            items,
        })
    }
}

/// Stable identifier for entries that do not declare one
fn derive_identifier(connector_type: &str, name: &str) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("vigil:{}:{}", connector_type, name).as_bytes(),
    )
}
