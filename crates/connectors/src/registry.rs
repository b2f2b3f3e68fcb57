//! Connector Registry - Configuration-driven connector creation
//!
//! The registry maps connector type keys (the `type` of a configuration
//! entry) to plugin metadata and a factory. It is built once at startup and
//! only read afterwards.
//!
//! # Example
//!
//! ```ignore
//! let registry = ConnectorRegistry::with_builtin();
//! let connector = registry.create_connector(&configuration)?;
//! scheduler.observe(connector, interval_secs)?;
//! ```

use crate::connector::Connector;
use crate::error::ConnectorError;
use std::collections::HashMap;
use vigil_config::ConnectorConfiguration;

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

/// Descriptive metadata of a connector type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Key matched against `ConnectorConfiguration::connector_type`
    pub type_key: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

/// Creates connectors of one type from their configuration
///
/// Implemented for any matching closure.
pub trait ConnectorFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns error if required configuration items are missing or invalid
    fn create(
        &self,
        configuration: &ConnectorConfiguration,
    ) -> Result<Box<dyn Connector>, ConnectorError>;
}

impl<F> ConnectorFactory for F
where
    F: Fn(&ConnectorConfiguration) -> Result<Box<dyn Connector>, ConnectorError> + Send + Sync,
{
    fn create(
        &self,
        configuration: &ConnectorConfiguration,
    ) -> Result<Box<dyn Connector>, ConnectorError> {
        self(configuration)
    }
}

struct Plugin {
    info: PluginInfo,
    factory: Box<dyn ConnectorFactory>,
}

/// Registry of connector plugins
#[derive(Default)]
pub struct ConnectorRegistry {
    plugins: HashMap<&'static str, Plugin>,
}

impl ConnectorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every compiled-in connector registered
    pub fn with_builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "jenkins")]
        registry.register(
            PluginInfo {
                type_key: crate::jenkins::JENKINS_TYPE,
                display_name: "Jenkins",
                description: "Build results of a Jenkins job, with gap-free history",
            },
            |configuration: &ConnectorConfiguration| {
                let connector = crate::jenkins::JenkinsConnector::from_configuration(
                    configuration.clone(),
                )?;
                Ok(Box::new(connector) as Box<dyn Connector>)
            },
        );

        #[cfg(feature = "ping")]
        registry.register(
            PluginInfo {
                type_key: crate::ping::PING_TYPE,
                display_name: "Ping",
                description: "Reachability of a host over TCP",
            },
            |configuration: &ConnectorConfiguration| {
                let connector =
                    crate::ping::PingConnector::from_configuration(configuration.clone())?;
                Ok(Box::new(connector) as Box<dyn Connector>)
            },
        );

        registry
    }

    /// Register a connector plugin
    ///
    /// # Panics
    /// Panics if a plugin is already registered with this type key.
    /// Use `try_register` for fallible registration.
    pub fn register<F: ConnectorFactory + 'static>(&mut self, info: PluginInfo, factory: F) {
        if self.plugins.contains_key(info.type_key) {
            panic!("Connector plugin '{}' already registered", info.type_key);
        }
        self.insert(info, factory);
    }

    /// Try to register a connector plugin
    ///
    /// Returns `false` if a plugin is already registered with this type key.
    pub fn try_register<F: ConnectorFactory + 'static>(
        &mut self,
        info: PluginInfo,
        factory: F,
    ) -> bool {
        if self.plugins.contains_key(info.type_key) {
            return false;
        }
        self.insert(info, factory);
        true
    }

    fn insert<F: ConnectorFactory + 'static>(&mut self, info: PluginInfo, factory: F) {
        self.plugins.insert(
            info.type_key,
            Plugin {
                info,
                factory: Box::new(factory),
            },
        );
    }

    /// Create the connector for a configuration entry
    ///
    /// # Errors
    /// - `ConnectorError::UnknownConnector` if the type is not registered
    /// - Item errors from the plugin's factory
    pub fn create_connector(
        &self,
        configuration: &ConnectorConfiguration,
    ) -> Result<Box<dyn Connector>, ConnectorError> {
        let plugin = self
            .plugins
            .get(configuration.connector_type.as_str())
            .ok_or_else(|| {
                ConnectorError::UnknownConnector(format!(
                    "'{}' (available: {})",
                    configuration.connector_type,
                    self.available().join(", ")
                ))
            })?;

        plugin.factory.create(configuration)
    }

    /// Metadata for a type key
    pub fn plugin(&self, type_key: &str) -> Option<&PluginInfo> {
        self.plugins.get(type_key).map(|p| &p.info)
    }

    /// Metadata of the plugin that handles this connector
    pub fn plugin_for(&self, connector: &dyn Connector) -> Option<&PluginInfo> {
        self.plugin(connector.connector_type())
    }

    /// Registered type keys, sorted
    pub fn available(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.plugins.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
