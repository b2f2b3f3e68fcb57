//! Poll command - Query one configured connector
//!
//! Runs one or more polls of a connector outside the scheduler and prints
//! its current status and history as JSON.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use vigil_config::Config;
use vigil_connectors::{Connector, ConnectorRegistry};

use super::shutdown_signal;

/// Poll command arguments
#[derive(Args, Debug)]
pub struct PollArgs {
    /// Connector name or identifier from the configuration
    #[arg(value_name = "CONNECTOR")]
    connector: String,

    /// Number of polls to run, spaced by the connector's interval
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u32,

    /// Output format: json (default), compact
    #[arg(short, long, default_value = "json")]
    output: String,
}

/// Run the poll command
pub async fn run(args: PollArgs, config: Config) -> Result<()> {
    let Some(configuration) = config.find_connector(&args.connector) else {
        let names: Vec<_> = config.connectors.iter().map(|c| c.name.as_str()).collect();
        anyhow::bail!(
            "Unknown connector: {}. Configured: {:?}",
            args.connector,
            names
        );
    };

    let registry = ConnectorRegistry::with_builtin();
    let mut connector = registry
        .create_connector(configuration)
        .with_context(|| format!("failed to create connector '{}'", configuration.name))?;
    let interval = Duration::from_secs(
        configuration.poll_interval_secs(config.scheduler.default_interval_secs)?,
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    for poll in 0..args.count.max(1) {
        if poll > 0 {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!(connector = %configuration.name, poll = poll + 1, "polling");
        if let Err(e) = connector.query_status(&cancel).await {
            tracing::warn!(error = %e, "poll interrupted");
            break;
        }
    }

    let report = report(connector.as_ref(), &registry);
    match args.output.as_str() {
        "compact" => println!("{}", serde_json::to_string(&report)?),
        _ => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn report(connector: &dyn Connector, registry: &ConnectorRegistry) -> serde_json::Value {
    let state = connector.state();
    json!({
        "identifier": state.identifier(),
        "name": state.name(),
        "type": connector.connector_type(),
        "plugin": registry.plugin_for(connector).map(|p| p.display_name),
        "current_status": state.current_status(),
        "snapshots": state.snapshots(),
        "last_error": state.last_error(),
    })
}
