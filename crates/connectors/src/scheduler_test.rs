//! Tests for the observation scheduler

use super::*;
use crate::connector::ConnectorState;
use crate::status::ObservationState;
use async_trait::async_trait;
use std::sync::atomic::AtomicUsize;
use tokio::sync::Notify;
use vigil_config::ConnectorConfiguration;

/// Connector whose query blocks until released or cancelled
struct GatedConnector {
    state: ConnectorState,
    gate: Arc<Notify>,
    calls: Arc<AtomicUsize>,
}

impl GatedConnector {
    fn new(name: &str, gate: &Arc<Notify>, calls: &Arc<AtomicUsize>) -> Self {
        Self {
            state: ConnectorState::new(ConnectorConfiguration::new("gated", name)),
            gate: Arc::clone(gate),
            calls: Arc::clone(calls),
        }
    }
}

#[async_trait]
impl Connector for GatedConnector {
    fn connector_type(&self) -> &'static str {
        "gated"
    }

    fn state(&self) -> &ConnectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ConnectorState {
        &mut self.state
    }

    async fn execute_query(&mut self, cancel: &CancellationToken) -> Result<(), ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = cancel.cancelled() => return Err(ConnectorError::Cancelled),
            _ = self.gate.notified() => {}
        }
        let status = Status::new(self.state.name(), ObservationState::Success);
        self.state.set_current_status(status);
        Ok(())
    }
}

/// Connector with a fixed query behaviour
struct FixedConnector {
    state: ConnectorState,
    behaviour: Behaviour,
}

#[derive(Clone, Copy)]
enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

impl FixedConnector {
    fn boxed(name: &str, behaviour: Behaviour) -> Box<dyn Connector> {
        Box::new(Self {
            state: ConnectorState::new(ConnectorConfiguration::new("fixed", name)),
            behaviour,
        })
    }
}

#[async_trait]
impl Connector for FixedConnector {
    fn connector_type(&self) -> &'static str {
        "fixed"
    }

    fn state(&self) -> &ConnectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ConnectorState {
        &mut self.state
    }

    async fn execute_query(&mut self, _cancel: &CancellationToken) -> Result<(), ConnectorError> {
        match self.behaviour {
            Behaviour::Succeed => {
                let status = Status::new(self.state.name(), ObservationState::Success);
                self.state.set_current_status(status);
                Ok(())
            }
            Behaviour::Fail => Err(ConnectorError::Unavailable("server down".into())),
            Behaviour::Panic => panic!("connector bug"),
        }
    }
}

fn scheduler() -> (ObservationScheduler, mpsc::Receiver<StatusQueried>) {
    let (tx, rx) = mpsc::channel(16);
    (ObservationScheduler::new(tx), rx)
}

async fn next_event(rx: &mut mpsc::Receiver<StatusQueried>) -> StatusQueried {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event within 5s")
        .expect("event channel closed")
}

/// Tick until a poll is dispatched
///
/// A poll releases its slot right after its event is delivered, so the
/// receiver can see the event a moment before the connector is free again.
async fn tick_until_dispatched(scheduler: &ObservationScheduler) -> usize {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let dispatched = scheduler.tick();
            if dispatched > 0 {
                return dispatched;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("no poll dispatched within 5s")
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn test_at_most_one_poll_in_flight() {
    let (scheduler, mut rx) = scheduler();
    let gate = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    scheduler
        .observe(Box::new(GatedConnector::new("slow", &gate, &calls)), 0)
        .unwrap();

    assert_eq!(scheduler.tick(), 1);
    assert_eq!(scheduler.tick(), 0);

    gate.notify_one();
    let event = next_event(&mut rx).await;

    assert_eq!(event.outcome, PollOutcome::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_zero_interval_polls_every_tick() {
    let (scheduler, mut rx) = scheduler();
    scheduler
        .observe(FixedConnector::boxed("eager", Behaviour::Succeed), 0)
        .unwrap();

    assert_eq!(scheduler.tick(), 1);
    let event = next_event(&mut rx).await;
    assert_eq!(event.name, "eager");
    assert_eq!(event.connector_type, "fixed");
    assert_eq!(
        event.current_status.unwrap().state,
        ObservationState::Success
    );
    assert_eq!(event.snapshots.len(), 1);

    assert_eq!(tick_until_dispatched(&scheduler).await, 1);
    next_event(&mut rx).await;
}

#[tokio::test]
async fn test_connector_not_due_before_interval() {
    let (scheduler, mut rx) = scheduler();
    scheduler
        .observe(FixedConnector::boxed("lazy", Behaviour::Succeed), 60)
        .unwrap();

    assert_eq!(scheduler.tick(), 1);
    next_event(&mut rx).await;
    assert_eq!(scheduler.tick(), 0);
}

#[tokio::test]
async fn test_due_connectors_dispatched_together() {
    let (scheduler, mut rx) = scheduler();
    scheduler
        .observe(FixedConnector::boxed("one", Behaviour::Succeed), 5)
        .unwrap();
    scheduler
        .observe(FixedConnector::boxed("two", Behaviour::Succeed), 5)
        .unwrap();

    assert_eq!(scheduler.tick(), 2);

    let mut names = vec![next_event(&mut rx).await.name, next_event(&mut rx).await.name];
    names.sort();
    assert_eq!(names, vec!["one", "two"]);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_query_reports_failure() {
    let (scheduler, mut rx) = scheduler();
    scheduler
        .observe(FixedConnector::boxed("broken", Behaviour::Fail), 0)
        .unwrap();
    scheduler
        .observe(FixedConnector::boxed("healthy", Behaviour::Succeed), 0)
        .unwrap();

    assert_eq!(scheduler.tick(), 2);

    for _ in 0..2 {
        let event = next_event(&mut rx).await;
        match event.name.as_str() {
            "broken" => {
                assert!(matches!(&event.outcome, PollOutcome::Failed(e) if e.contains("server down")));
                let status = event.current_status.unwrap();
                assert_eq!(status.state, ObservationState::Unknown);
                assert!(event.snapshots.is_empty());
            }
            "healthy" => assert_eq!(event.outcome, PollOutcome::Completed),
            other => panic!("unexpected connector {}", other),
        }
    }
}

#[tokio::test]
async fn test_panicking_query_is_contained() {
    let (scheduler, mut rx) = scheduler();
    scheduler
        .observe(FixedConnector::boxed("buggy", Behaviour::Panic), 0)
        .unwrap();

    assert_eq!(scheduler.tick(), 1);
    let event = next_event(&mut rx).await;
    assert_eq!(
        event.outcome,
        PollOutcome::Failed("poll task panicked".to_string())
    );

    // The slot was released, so the next tick polls again
    assert_eq!(tick_until_dispatched(&scheduler).await, 1);
    next_event(&mut rx).await;
}

#[tokio::test]
async fn test_stalled_consumer_holds_connector_in_flight() {
    let (tx, mut rx) = mpsc::channel(1);
    let scheduler = ObservationScheduler::new(tx);
    scheduler
        .observe(FixedConnector::boxed("chatty", Behaviour::Succeed), 0)
        .unwrap();

    // The first event fills the channel
    assert_eq!(scheduler.tick(), 1);
    assert_eq!(tick_until_dispatched(&scheduler).await, 1);

    // The second poll waits for room, so nothing else is dispatched
    tokio::time::sleep(Duration::from_millis(20)).await;
    for _ in 0..10 {
        assert_eq!(scheduler.tick(), 0);
    }
    assert_eq!(scheduler.inner.tasks.len(), 1);

    next_event(&mut rx).await;
    assert_eq!(tick_until_dispatched(&scheduler).await, 1);
    next_event(&mut rx).await;
    next_event(&mut rx).await;
    scheduler.stop(true).await;
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_observe_rejects_duplicates() {
    let (scheduler, _rx) = scheduler();
    scheduler
        .observe(FixedConnector::boxed("core", Behaviour::Succeed), 5)
        .unwrap();

    let duplicate = FixedConnector::boxed("core", Behaviour::Succeed);
    let identifier = duplicate.state().identifier();
    let err = scheduler.observe(duplicate, 5).unwrap_err();

    assert!(matches!(err, ConnectorError::AlreadyObserved(id) if id == identifier));
    assert_eq!(scheduler.len(), 1);
    assert_eq!(scheduler.observed(), vec![identifier]);
}

#[tokio::test]
async fn test_remove_during_in_flight_poll() {
    let (scheduler, mut rx) = scheduler();
    let gate = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let connector = GatedConnector::new("leaving", &gate, &calls);
    let identifier = connector.state().identifier();
    scheduler.observe(Box::new(connector), 0).unwrap();

    assert_eq!(scheduler.tick(), 1);
    assert!(scheduler.remove(identifier));
    assert!(scheduler.is_empty());
    assert!(!scheduler.remove(identifier));

    gate.notify_one();
    let event = next_event(&mut rx).await;
    assert_eq!(event.identifier, identifier);
    assert_eq!(event.outcome, PollOutcome::Completed);
    assert_eq!(scheduler.tick(), 0);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let (scheduler, _rx) = scheduler();

    scheduler.start().unwrap();
    assert!(scheduler.is_running());
    assert!(matches!(scheduler.start(), Err(ConnectorError::AlreadyRunning)));

    scheduler.stop(true).await;
    assert!(!scheduler.is_running());

    scheduler.start().unwrap();
    scheduler.stop(true).await;
}

#[tokio::test]
async fn test_tick_loop_polls_connectors() {
    let (tx, mut rx) = mpsc::channel(64);
    let scheduler = ObservationScheduler::new(tx).with_tick_interval(Duration::from_millis(10));
    scheduler
        .observe(FixedConnector::boxed("looped", Behaviour::Succeed), 0)
        .unwrap();

    scheduler.start().unwrap();
    next_event(&mut rx).await;
    next_event(&mut rx).await;
    scheduler.stop(true).await;
}

#[tokio::test]
async fn test_zero_tick_interval_is_clamped() {
    let (tx, mut rx) = mpsc::channel(16);
    let scheduler = ObservationScheduler::new(tx).with_tick_interval(Duration::ZERO);
    assert_eq!(scheduler.tick_interval(), MIN_TICK_INTERVAL);
    scheduler
        .observe(FixedConnector::boxed("busy", Behaviour::Succeed), 0)
        .unwrap();

    scheduler.start().unwrap();
    next_event(&mut rx).await;

    // A closed channel fails pending sends, so stop never waits on one
    drop(rx);
    scheduler.stop(true).await;
}

#[tokio::test]
async fn test_stop_waits_for_in_flight_poll() {
    let (scheduler, mut rx) = scheduler();
    let gate = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    scheduler
        .observe(Box::new(GatedConnector::new("draining", &gate, &calls)), 0)
        .unwrap();

    assert_eq!(scheduler.tick(), 1);

    let release = Arc::clone(&gate);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        release.notify_one();
    });
    scheduler.stop(true).await;

    let event = rx.try_recv().expect("event published before stop returned");
    assert_eq!(event.outcome, PollOutcome::Completed);
}

#[tokio::test]
async fn test_abort_cancels_in_flight_poll() {
    let (scheduler, mut rx) = scheduler();
    let gate = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    scheduler
        .observe(Box::new(GatedConnector::new("stuck", &gate, &calls)), 60)
        .unwrap();

    assert_eq!(scheduler.tick(), 1);
    scheduler.abort().await;

    let event = rx.try_recv().expect("event published before abort returned");
    assert_eq!(event.outcome, PollOutcome::Cancelled);
    assert!(event.current_status.is_none());

    // A cancelled poll does not count as a poll, so the connector is due
    // again as soon as the scheduler restarts.
    gate.notify_one();
    scheduler.start().unwrap();
    let event = next_event(&mut rx).await;
    assert_eq!(event.outcome, PollOutcome::Completed);
    scheduler.stop(true).await;
}
