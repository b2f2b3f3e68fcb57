//! Serve command - Observe configured connectors
//!
//! Creates every enabled connector, polls them until a shutdown signal
//! arrives, and logs each finished poll.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vigil_config::Config;
use vigil_connectors::{
    ConnectorRegistry, ObservationScheduler, PollOutcome, StatusQueried,
};

use super::shutdown_signal;

/// Serve command arguments
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Seconds to let in-flight polls finish before cancelling them
    #[arg(long, default_value_t = 30)]
    pub drain_timeout_secs: u64,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}

/// Run the serve command
pub async fn run(args: ServeArgs, config: Config) -> Result<()> {
    let registry = ConnectorRegistry::with_builtin();
    let (events_tx, events_rx) = mpsc::channel(config.scheduler.event_buffer);
    let scheduler =
        ObservationScheduler::new(events_tx).with_tick_interval(config.scheduler.tick_interval());

    // Creation errors fail here, before anything is scheduled
    for configuration in config.enabled_connectors() {
        let interval_secs = configuration
            .poll_interval_secs(config.scheduler.default_interval_secs)
            .with_context(|| format!("connector '{}'", configuration.name))?;
        let connector = registry
            .create_connector(configuration)
            .with_context(|| format!("failed to create connector '{}'", configuration.name))?;
        scheduler.observe(connector, interval_secs)?;
    }

    if scheduler.is_empty() {
        warn!("no enabled connectors configured, nothing to observe");
    }

    let reporter = tokio::spawn(report_events(events_rx));
    scheduler.start()?;

    shutdown_signal().await;
    info!("shutdown signal received");

    let drain = Duration::from_secs(args.drain_timeout_secs);
    if tokio::time::timeout(drain, scheduler.stop(true)).await.is_err() {
        warn!(
            timeout_secs = args.drain_timeout_secs,
            "polls still running after drain timeout, cancelling"
        );
        scheduler.abort().await;
    }

    // Dropping the scheduler closes the event channel and ends the reporter
    drop(scheduler);
    reporter.await.context("event reporter failed")?;

    info!("vigil shutdown complete");
    Ok(())
}

/// Log every finished poll
async fn report_events(mut events: mpsc::Receiver<StatusQueried>) {
    while let Some(event) = events.recv().await {
        let elapsed_ms = event.elapsed.as_millis() as u64;
        let state = event
            .current_status
            .as_ref()
            .map(|s| s.state.as_str())
            .unwrap_or("none");
        let build = event.current_status.as_ref().and_then(|s| s.build_number);

        match &event.outcome {
            PollOutcome::Completed => info!(
                connector = %event.name,
                connector_type = event.connector_type,
                state,
                build = ?build,
                snapshots = event.snapshots.len(),
                elapsed_ms,
                "status queried"
            ),
            PollOutcome::Failed(error) => warn!(
                connector = %event.name,
                connector_type = event.connector_type,
                state,
                error = %error,
                elapsed_ms,
                "status query failed"
            ),
            PollOutcome::Cancelled => debug!(connector = %event.name, "status query cancelled"),
        }
    }
}
