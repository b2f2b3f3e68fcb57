//! Connector abstraction
//!
//! A connector knows how to ask one kind of remote system for its status
//! and decides which results are worth keeping in its bounded history.
//!
//! # Single writer
//!
//! A connector's state is only ever mutated by its own poll. The scheduler
//! never runs two polls of the same connector at once, so none of the state
//! here needs internal locking. Connector-specific reconciliation fields
//! (e.g. the Jenkins "previous check") follow the same rule.

use crate::error::ConnectorError;
use crate::status::{MAX_SNAPSHOTS, Snapshot, Status};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;
use vigil_config::ConnectorConfiguration;

#[cfg(test)]
#[path = "connector_test.rs"]
mod tests;

/// Runtime state shared by every connector type
#[derive(Debug, Clone)]
pub struct ConnectorState {
    configuration: ConnectorConfiguration,
    current_status: Option<Status>,
    /// Newest first; index equals age
    snapshots: VecDeque<Snapshot>,
    last_error: Option<String>,
}

impl ConnectorState {
    pub fn new(configuration: ConnectorConfiguration) -> Self {
        Self {
            configuration,
            current_status: None,
            snapshots: VecDeque::with_capacity(MAX_SNAPSHOTS),
            last_error: None,
        }
    }

    pub fn configuration(&self) -> &ConnectorConfiguration {
        &self.configuration
    }

    pub fn identifier(&self) -> Uuid {
        self.configuration.identifier
    }

    pub fn name(&self) -> &str {
        &self.configuration.name
    }

    pub fn current_status(&self) -> Option<&Status> {
        self.current_status.as_ref()
    }

    pub fn set_current_status(&mut self, status: Status) {
        self.current_status = Some(status);
    }

    /// Retained history, sorted by age ascending (newest first)
    pub fn snapshots(&self) -> &VecDeque<Snapshot> {
        &self.snapshots
    }

    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.front()
    }

    /// Error from the most recent poll, cleared by the next successful one
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a snapshot already exists for this build number
    pub fn is_recorded(&self, build_number: u64) -> bool {
        self.snapshots
            .iter()
            .any(|s| s.status.build_number == Some(build_number))
    }

    /// Retain a status in history
    ///
    /// Evicts the oldest entry when the history is full, then inserts the new
    /// entry as age 0 and renumbers the rest.
    pub fn add_snapshot(&mut self, status: Status) {
        while self.snapshots.len() >= MAX_SNAPSHOTS {
            if let Some(evicted) = self.snapshots.pop_back() {
                debug!(
                    connector = %self.configuration.name,
                    build = ?evicted.status.build_number,
                    "evicted oldest snapshot"
                );
            }
        }

        self.snapshots.push_front(Snapshot { status, age: 0 });
        for (age, snapshot) in self.snapshots.iter_mut().enumerate() {
            snapshot.age = age;
        }
    }

    /// Default retention policy
    ///
    /// Keeps completed, valid statuses. Numbered builds are kept once per
    /// build number; targets without builds are kept whenever their state
    /// differs from the newest snapshot.
    pub fn default_should_take_snapshot(&self, status: &Status) -> bool {
        if status.invalid_build || !status.is_completed() {
            return false;
        }

        match status.build_number {
            Some(number) => !self.is_recorded(number),
            None => self
                .latest_snapshot()
                .is_none_or(|latest| latest.status.state != status.state),
        }
    }

    fn record_success(&mut self) {
        self.last_error = None;
    }

    fn record_failure(&mut self, detail: String) {
        if self.current_status.is_none() {
            self.current_status = Some(Status::unknown(self.configuration.name.clone(), &detail));
        }
        self.last_error = Some(detail);
    }
}

/// A pollable unit representing one monitored target
#[async_trait]
pub trait Connector: Send + Sync {
    /// Plugin key this connector was created for (e.g., "jenkins")
    fn connector_type(&self) -> &'static str;

    fn state(&self) -> &ConnectorState;

    fn state_mut(&mut self) -> &mut ConnectorState;

    /// Perform the remote calls and set the current status
    ///
    /// May also add backfilled snapshots directly.
    async fn execute_query(&mut self, cancel: &CancellationToken) -> Result<(), ConnectorError>;

    /// Whether the status should be retained in history
    fn should_take_snapshot(&mut self, status: &Status) -> bool {
        self.state().default_should_take_snapshot(status)
    }

    /// Run one poll
    ///
    /// Returns `Err` only for cancellation. Other failures are logged and kept
    /// as [`ConnectorState::last_error`]; the current status keeps its last
    /// value, or becomes `Unknown` if the connector never produced one.
    async fn query_status(&mut self, cancel: &CancellationToken) -> Result<(), ConnectorError> {
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }

        match self.execute_query(cancel).await {
            Ok(()) => self.state_mut().record_success(),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!(
                    connector = %self.state().name(),
                    connector_type = self.connector_type(),
                    error = %e,
                    "query failed"
                );
                self.state_mut().record_failure(e.to_string());
                return Ok(());
            }
        }

        if let Some(status) = self.state().current_status().cloned()
            && self.should_take_snapshot(&status)
        {
            debug!(
                connector = %self.state().name(),
                build = ?status.build_number,
                state = %status.state,
                "taking snapshot"
            );
            self.state_mut().add_snapshot(status);
        }

        Ok(())
    }
}
