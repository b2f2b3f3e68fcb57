//! End-to-end checks: configuration document -> registry -> scheduler

use std::path::Path;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use vigil_config::Config;
use vigil_connectors::{
    ConnectorRegistry, ObservationScheduler, ObservationState, PollOutcome, StatusQueried,
};

#[test]
fn test_example_config_creates_every_connector() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/vigil.toml");
    let config = Config::from_file(&path).unwrap();
    let registry = ConnectorRegistry::with_builtin();

    let (tx, _rx) = mpsc::channel::<StatusQueried>(8);
    let scheduler = ObservationScheduler::new(tx);
    for configuration in config.enabled_connectors() {
        let interval = configuration
            .poll_interval_secs(config.scheduler.default_interval_secs)
            .unwrap();
        let connector = registry.create_connector(configuration).unwrap();
        assert_eq!(connector.state().identifier(), configuration.identifier);
        scheduler.observe(connector, interval).unwrap();
    }

    assert_eq!(scheduler.len(), 2);
    assert!(config.find_connector("staging db").is_some_and(|c| !c.enabled));
}

#[tokio::test]
async fn test_ping_connector_through_scheduler() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let document = format!(
        r#"
[scheduler]
tick_interval_ms = 10

[[connectors]]
type = "ping"
name = "local"

[connectors.items]
host = "127.0.0.1"
port = {port}
interval = 0
"#
    );
    let config: Config = document.parse().unwrap();
    let registry = ConnectorRegistry::with_builtin();

    let (tx, mut rx) = mpsc::channel(64);
    let scheduler =
        ObservationScheduler::new(tx).with_tick_interval(config.scheduler.tick_interval());
    let configuration = &config.connectors[0];
    scheduler
        .observe(registry.create_connector(configuration).unwrap(), 0)
        .unwrap();
    scheduler.start().unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    scheduler.stop(true).await;

    assert_eq!(event.identifier, configuration.identifier);
    assert_eq!(event.outcome, PollOutcome::Completed);
    assert_eq!(
        event.current_status.unwrap().state,
        ObservationState::Success
    );
    assert_eq!(event.snapshots.len(), 1);
}
