//! Ping connector
//!
//! Host health check. Reachability is probed with a TCP connect to the
//! configured port, which needs no raw-socket privileges.

use crate::config::PingConnectorConfig;
use crate::connector::{Connector, ConnectorState};
use crate::error::ConnectorError;
use crate::status::{ObservationState, Status};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use vigil_config::ConnectorConfiguration;

/// Plugin key of this connector
pub const PING_TYPE: &str = "ping";

/// Connector reporting whether a host accepts connections
pub struct PingConnector {
    state: ConnectorState,
    settings: PingConnectorConfig,
}

impl PingConnector {
    pub fn from_configuration(configuration: ConnectorConfiguration) -> Result<Self, ConnectorError> {
        let settings = PingConnectorConfig::from_configuration(&configuration)?;
        Ok(Self {
            state: ConnectorState::new(configuration),
            settings,
        })
    }

    pub fn settings(&self) -> &PingConnectorConfig {
        &self.settings
    }

    async fn probe(&self) -> Result<Duration, String> {
        let address = self.settings.address();
        let limit = Duration::from_millis(self.settings.timeout_ms);
        let started = Instant::now();

        trace!(address = %address, "probing");
        match tokio::time::timeout(limit, TcpStream::connect(&address)).await {
            Ok(Ok(_stream)) => Ok(started.elapsed()),
            Ok(Err(e)) => Err(format!("{} unreachable: {}", address, e)),
            Err(_) => Err(format!(
                "{} did not answer within {}ms",
                address, self.settings.timeout_ms
            )),
        }
    }
}

#[async_trait]
impl Connector for PingConnector {
    fn connector_type(&self) -> &'static str {
        PING_TYPE
    }

    fn state(&self) -> &ConnectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ConnectorState {
        &mut self.state
    }

    /// An unreachable host is a valid observation, not a query error
    async fn execute_query(&mut self, cancel: &CancellationToken) -> Result<(), ConnectorError> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ConnectorError::Cancelled),
            outcome = self.probe() => outcome,
        };

        let name = self.state.name().to_string();
        let status = match outcome {
            Ok(latency) => {
                let millis = latency.as_millis();
                Status::new(name, ObservationState::Success)
                    .with_detail(format!("reachable in {}ms", millis))
                    .with_property("latency_ms", millis.to_string())
            }
            Err(detail) => Status::new(name, ObservationState::Failure).with_detail(detail),
        };
        self.state.set_current_status(status);
        Ok(())
    }
}
