//! Configuration validation
//!
//! Validates config consistency:
//! - Connector identifiers are unique
//! - Poll intervals parse
//! - Scheduler settings are usable
//! - Log target overrides form a valid filter

use crate::Config;
use crate::error::{ConfigError, Result};
use std::collections::HashMap;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    config.log.validate()?;
    validate_scheduler(config)?;
    validate_connectors(config)?;
    Ok(())
}

fn validate_scheduler(config: &Config) -> Result<()> {
    if config.scheduler.tick_interval_ms == 0 {
        return Err(ConfigError::invalid_value(
            "scheduler",
            "scheduler",
            "tick_interval_ms",
            "must be greater than zero",
        ));
    }

    if config.scheduler.event_buffer == 0 {
        return Err(ConfigError::invalid_value(
            "scheduler",
            "scheduler",
            "event_buffer",
            "must be greater than zero",
        ));
    }

    Ok(())
}

fn validate_connectors(config: &Config) -> Result<()> {
    let mut identifiers: HashMap<_, Vec<&str>> = HashMap::new();

    for connector in &config.connectors {
        connector.poll_interval_secs(config.scheduler.default_interval_secs)?;
        identifiers
            .entry(connector.identifier)
            .or_default()
            .push(connector.name.as_str());
    }

    if let Some((identifier, names)) = identifiers.iter().find(|(_, names)| names.len() > 1) {
        return Err(ConfigError::duplicate_identifier(identifier, names.join(", ")));
    }

    Ok(())
}
