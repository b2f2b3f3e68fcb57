//! Observation scheduler settings

use serde::Deserialize;
use std::time::Duration;

/// Default tick period of the scheduler loop
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Poll interval for connectors without an `interval` item
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Capacity of the status-queried event channel
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Scheduler configuration
///
/// ```toml
/// [scheduler]
/// tick_interval_ms = 1000
/// default_interval_secs = 5
/// event_buffer = 256
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often the loop checks which connectors are due
    pub tick_interval_ms: u64,

    /// Poll interval used when a connector does not set one
    pub default_interval_secs: u64,

    /// Buffered events before poll tasks wait on the consumer
    pub event_buffer: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            default_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl SchedulerConfig {
    /// Tick period as a Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
