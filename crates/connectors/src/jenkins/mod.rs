//! Jenkins connector
//!
//! Observes one Jenkins job and keeps a contiguous build history even when
//! several builds start and finish between two polls.
//!
//! # Reconciliation
//!
//! Each poll fetches the job summary and the job's last build, which becomes
//! the current status. Then:
//!
//! - **Cold start**: with no history yet, the completed builds that fit in
//!   the snapshot window are fetched oldest first and snapshotted.
//! - **Gap fill**: when the last build is more than one ahead of the
//!   previous check, the build numbers in between are fetched and
//!   snapshotted. Only the ones that still fit in the snapshot window are
//!   fetched, so a long outage costs at most a window's worth of requests.
//!
//! Both paths cover build numbers strictly older than the last build; the
//! last build itself is always judged by the regular snapshot rule once the
//! query returns. A fetch error other than "not found" aborts the poll and
//! leaves history partially filled. The previous check only advances over
//! builds that were recorded, so the next successful poll resumes the fill.

mod client;


pub use client::{BuildInfo, ChangeItem, HttpJenkinsClient, JenkinsApi, JobSummary};

use crate::config::JenkinsConnectorConfig;
use crate::connector::{Connector, ConnectorState};
use crate::error::ConnectorError;
use crate::status::{MAX_SNAPSHOTS, ObservationState, Status};
use async_trait::async_trait;
use chrono::DateTime;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vigil_config::ConnectorConfiguration;

/// Plugin key of this connector
pub const JENKINS_TYPE: &str = "jenkins";

/// Build recorded by the most recent snapshot-worthy transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PreviousCheck {
    build_number: u64,
    state: ObservationState,
}

/// Connector for a single Jenkins job
pub struct JenkinsConnector {
    state: ConnectorState,
    api: Arc<dyn JenkinsApi>,
    /// Only read and written by this connector's own poll
    previous_check: Option<PreviousCheck>,
}

impl JenkinsConnector {
    /// Create a connector talking to the configured server
    ///
    /// # Errors
    ///
    /// Returns error if required items are missing or the HTTP client cannot be built.
    pub fn from_configuration(configuration: ConnectorConfiguration) -> Result<Self, ConnectorError> {
        let settings = JenkinsConnectorConfig::from_configuration(&configuration)?;
        let client = HttpJenkinsClient::new(settings)?;
        Ok(Self::with_api(configuration, Arc::new(client)))
    }

    /// Create a connector over any [`JenkinsApi`] implementation
    pub fn with_api(configuration: ConnectorConfiguration, api: Arc<dyn JenkinsApi>) -> Self {
        Self {
            state: ConnectorState::new(configuration),
            api,
            previous_check: None,
        }
    }

    /// Build number of the previous check, if any
    pub fn previous_build_number(&self) -> Option<u64> {
        self.previous_check.map(|p| p.build_number)
    }

    fn to_status(&self, build: &BuildInfo) -> Status {
        build_status(self.state.name(), build)
    }

    /// Snapshot completed builds `from..to` (exclusive), oldest first
    async fn fill(
        &mut self,
        from: u64,
        to: u64,
        cancel: &CancellationToken,
    ) -> Result<(), ConnectorError> {
        for number in from..to {
            if self.state.is_recorded(number) {
                continue;
            }

            let build = match self.api.get_build(number, cancel).await {
                Ok(build) => build,
                Err(ConnectorError::NotFound(_)) => {
                    warn!(
                        connector = %self.state.name(),
                        build = number,
                        "build no longer available, skipping"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            let status = self.to_status(&build);
            if self.should_take_snapshot(&status) {
                debug!(
                    connector = %self.state.name(),
                    build = number,
                    state = %status.state,
                    "recorded intermediate build"
                );
                self.state.add_snapshot(status);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for JenkinsConnector {
    fn connector_type(&self) -> &'static str {
        JENKINS_TYPE
    }

    fn state(&self) -> &ConnectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ConnectorState {
        &mut self.state
    }

    async fn execute_query(&mut self, cancel: &CancellationToken) -> Result<(), ConnectorError> {
        let job = self.api.get_job(cancel).await?;

        let Some(last) = job.last_build_number else {
            self.state
                .set_current_status(Status::unknown(self.state.name(), "job has no builds"));
            return Ok(());
        };

        let build = self.api.get_build(last, cancel).await?;
        let current = self.to_status(&build);
        let completed = current.is_completed();
        self.state.set_current_status(current);

        // The window holds MAX_SNAPSHOTS completed builds, the last one
        // included when it has finished. Older builds would be evicted.
        let window = if completed {
            MAX_SNAPSHOTS - 1
        } else {
            MAX_SNAPSHOTS
        };
        let oldest_kept = last.saturating_sub(window as u64);

        let previous_check = self.previous_check;
        match previous_check {
            None if self.state.snapshots().is_empty() => {
                let first = job.first_build_number.unwrap_or(1).max(1);
                if last > first {
                    let start = first.max(oldest_kept);
                    debug!(
                        connector = %self.state.name(),
                        from = start,
                        to = last - 1,
                        "backfilling history"
                    );
                    self.fill(start, last, cancel).await?;
                }
            }
            Some(previous) if last > previous.build_number + 1 => {
                let start = (previous.build_number + 1).max(oldest_kept);
                debug!(
                    connector = %self.state.name(),
                    previous = previous.build_number,
                    current = last,
                    from = start,
                    "filling build gap"
                );
                self.fill(start, last, cancel).await?;
            }
            _ => {}
        }

        Ok(())
    }

    /// A completed build is recorded when it differs from the previous
    /// check in state or build number. A build number past the previous one
    /// always differs, so a gap is recorded too. In-progress builds are left
    /// for the poll that sees them finish.
    fn should_take_snapshot(&mut self, status: &Status) -> bool {
        if status.invalid_build || !status.is_completed() {
            return false;
        }
        let Some(number) = status.build_number else {
            return false;
        };

        let changed = match self.previous_check {
            None => true,
            Some(previous) => previous.state != status.state || previous.build_number != number,
        };
        if !changed || self.state.is_recorded(number) {
            return false;
        }

        if self
            .previous_check
            .is_none_or(|previous| number >= previous.build_number)
        {
            self.previous_check = Some(PreviousCheck {
                build_number: number,
                state: status.state,
            });
        }
        true
    }
}

/// Map a Jenkins result to an observation state
pub fn observation_state(result: Option<&str>, building: bool) -> ObservationState {
    if building {
        return ObservationState::Running;
    }
    match result.map(str::trim) {
        Some(r) if r.eq_ignore_ascii_case("SUCCESS") => ObservationState::Success,
        Some(r) if r.eq_ignore_ascii_case("UNSTABLE") => ObservationState::Unstable,
        Some(r) if r.eq_ignore_ascii_case("FAILURE") => ObservationState::Failure,
        _ => ObservationState::Unknown,
    }
}

/// Convert a remote build to a status
pub fn build_status(name: &str, build: &BuildInfo) -> Status {
    let state = observation_state(build.result.as_deref(), build.building);

    let detail = build
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .or(build.display_name.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", build.number));

    let mut status = Status::new(name, state)
        .with_detail(detail)
        .with_build(build.number, build.building)
        .with_property("duration_ms", build.duration_ms.to_string())
        .with_property("changes", build.change_sets.len().to_string());

    if let Some(display_name) = &build.display_name {
        status = status.with_property("display_name", display_name);
    }
    if let Some(estimate) = build.estimated_duration_ms {
        status = status.with_property("estimated_duration_ms", estimate.to_string());
    }
    if let Some(started) = build.timestamp_ms.and_then(DateTime::from_timestamp_millis) {
        status = status.with_property("started_at", started.to_rfc3339());
    }
    if let Some(url) = &build.url {
        status = status.with_property("url", url);
    }
    if !build.culprits.is_empty() {
        status = status.with_property("culprits", build.culprits.join(", "));
    }
    if build.number == 0 {
        status = status.invalid();
    }

    status
}
