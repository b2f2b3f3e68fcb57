//! Vigil - Connectors
//!
//! Pull-based connectors that ask remote systems (build servers, hosts) for
//! their status, keep a short history of notable results, and an
//! observation scheduler that polls them on their own intervals.
//!
//! # Available Connectors
//!
//! - **Jenkins** - Build results of one job, with gap-free history
//! - **Ping** - Host reachability over TCP
//!
//! # Design Principles
//!
//! - **Single writer**: a connector's state is only mutated by its own poll
//! - **Bounded history**: at most [`MAX_SNAPSHOTS`] snapshots per connector
//! - **Channel out**: every finished poll is published as a [`StatusQueried`] event
//! - **Explicit registry**: connector types are registered, not discovered
//!
//! # Feature Flags
//!
//! ```toml
//! [dependencies]
//! vigil-connectors = { version = "0.1", default-features = false, features = ["ping"] }
//! ```
//!
//! Available features:
//! - `jenkins` (default) - Jenkins job connector
//! - `ping` (default) - TCP reachability connector
//!
//! # Example
//!
//! ```ignore
//! use vigil_connectors::{ConnectorRegistry, ObservationScheduler};
//!
//! let registry = ConnectorRegistry::with_builtin();
//! let (tx, mut rx) = tokio::sync::mpsc::channel(256);
//! let scheduler = ObservationScheduler::new(tx);
//!
//! for configuration in &config.connectors {
//!     scheduler.observe(registry.create_connector(configuration)?, 30)?;
//! }
//! scheduler.start()?;
//!
//! while let Some(event) = rx.recv().await {
//!     println!("{} -> {:?}", event.name, event.outcome);
//! }
//! ```

pub mod config;
mod connector;
mod error;
mod registry;
pub mod resilience;
mod scheduler;
mod status;

// Conditionally compiled connectors
#[cfg(feature = "jenkins")]
pub mod jenkins;
#[cfg(feature = "ping")]
pub mod ping;

// Re-exports
pub use connector::{Connector, ConnectorState};
pub use error::ConnectorError;
pub use registry::{ConnectorFactory, ConnectorRegistry, PluginInfo};
pub use scheduler::{
    DEFAULT_TICK_INTERVAL, MIN_TICK_INTERVAL, ObservationScheduler, PollOutcome, StatusQueried,
};
pub use status::{MAX_SNAPSHOTS, ObservationState, Snapshot, Status};

#[cfg(feature = "jenkins")]
pub use config::JenkinsConnectorConfig;
#[cfg(feature = "jenkins")]
pub use jenkins::JenkinsConnector;

#[cfg(feature = "ping")]
pub use config::PingConnectorConfig;
#[cfg(feature = "ping")]
pub use ping::PingConnector;

/// List of available connector types (compiled in)
pub fn available_connectors() -> &'static [&'static str] {
    &[
        #[cfg(feature = "jenkins")]
        "jenkins",
        #[cfg(feature = "ping")]
        "ping",
    ]
}
