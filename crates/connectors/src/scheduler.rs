//! Observation scheduler
//!
//! Polls every observed connector on its own interval. A tick loop decides
//! which connectors are due and spawns one task per due connector; each
//! task runs the connector's query and publishes a [`StatusQueried`] event.
//!
//! # Guarantees
//!
//! - At most one poll per connector is in flight. A connector whose poll
//!   outlives its interval is skipped until the poll finishes, never queued.
//!   A poll counts as in flight until its event is accepted by the channel,
//!   so a slow consumer holds back at most one pending event per connector.
//! - The observed list is locked only while scanning it, never across a
//!   remote call.
//! - A failing or panicking query never affects the loop or other
//!   connectors.
//!
//! # Shutdown
//!
//! [`ObservationScheduler::stop`] ends the loop and lets in-flight polls
//! finish. [`ObservationScheduler::abort`] also cancels them through the
//! poll token; every remote call honors it, so waiting never hangs.

use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::status::{Snapshot, Status};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;

/// Default period of the tick loop
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest accepted tick period
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// How a poll ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The query ran and the connector state is up to date
    Completed,
    /// The query failed; the connector kept its last status
    Failed(String),
    /// The poll observed cancellation
    Cancelled,
}

/// Published once per finished poll, after the connector state was updated
#[derive(Debug, Clone)]
pub struct StatusQueried {
    pub identifier: Uuid,
    pub name: String,
    pub connector_type: &'static str,
    pub outcome: PollOutcome,
    pub current_status: Option<Status>,
    /// Newest first
    pub snapshots: Vec<Snapshot>,
    pub elapsed: Duration,
}

/// Poll bookkeeping shared between the tick loop and a poll task
#[derive(Debug, Default)]
struct PollSlot {
    in_flight: AtomicBool,
    /// `None` until the first non-cancelled poll completes
    last_poll: Mutex<Option<Instant>>,
}

impl PollSlot {
    /// Try to claim the slot (returns false if a poll is in flight)
    fn try_start(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
    }

    fn is_due(&self, now: Instant, interval: Duration) -> bool {
        match *self.last_poll.lock() {
            Some(last) => now.saturating_duration_since(last) >= interval,
            None => true,
        }
    }

    fn finish(&self, completed_at: Option<Instant>) {
        if let Some(at) = completed_at {
            *self.last_poll.lock() = Some(at);
        }
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

/// A connector registered for recurring polling
struct ObservedConnector {
    identifier: Uuid,
    name: String,
    connector_type: &'static str,
    connector: Arc<tokio::sync::Mutex<Box<dyn Connector>>>,
    poll_interval: Duration,
    slot: Arc<PollSlot>,
}

/// Everything a spawned poll needs
struct PollJob {
    identifier: Uuid,
    name: String,
    connector_type: &'static str,
    connector: Arc<tokio::sync::Mutex<Box<dyn Connector>>>,
    slot: Arc<PollSlot>,
}

struct TickLoop {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    connectors: Mutex<Vec<ObservedConnector>>,
    events: mpsc::Sender<StatusQueried>,
    tasks: TaskTracker,
    /// Cancels in-flight polls; replaced on every start
    poll_cancel: Mutex<CancellationToken>,
    running: AtomicBool,
    tick_loop: Mutex<Option<TickLoop>>,
}

impl Inner {
    fn tick(&self) -> usize {
        let now = Instant::now();
        let cancel = self.poll_cancel.lock().clone();

        let due: Vec<PollJob> = {
            let connectors = self.connectors.lock();
            connectors
                .iter()
                .filter(|c| c.slot.is_due(now, c.poll_interval))
                .filter(|c| {
                    let claimed = c.slot.try_start();
                    if !claimed {
                        debug!(
                            connector = %c.name,
                            "skipping poll - previous poll still in progress"
                        );
                    }
                    claimed
                })
                .map(|c| PollJob {
                    identifier: c.identifier,
                    name: c.name.clone(),
                    connector_type: c.connector_type,
                    connector: Arc::clone(&c.connector),
                    slot: Arc::clone(&c.slot),
                })
                .collect()
        };

        let dispatched = due.len();
        for job in due {
            debug!(connector = %job.name, "dispatching poll");
            let events = self.events.clone();
            self.tasks.spawn(run_poll(job, events, cancel.clone()));
        }
        dispatched
    }
}

/// Scheduler driving every observed connector
pub struct ObservationScheduler {
    inner: Arc<Inner>,
    tick_interval: Duration,
}

impl ObservationScheduler {
    /// Create a scheduler publishing poll results to `events`
    pub fn new(events: mpsc::Sender<StatusQueried>) -> Self {
        Self {
            inner: Arc::new(Inner {
                connectors: Mutex::new(Vec::new()),
                events,
                tasks: TaskTracker::new(),
                poll_cancel: Mutex::new(CancellationToken::new()),
                running: AtomicBool::new(false),
                tick_loop: Mutex::new(None),
            }),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Set the period of the tick loop (at least [`MIN_TICK_INTERVAL`])
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    /// Period of the tick loop
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Register a connector for polling every `interval_secs` (0 = every tick)
    ///
    /// # Errors
    ///
    /// Returns `AlreadyObserved` if a connector with the same identifier is registered.
    pub fn observe(
        &self,
        connector: Box<dyn Connector>,
        interval_secs: u64,
    ) -> Result<(), ConnectorError> {
        let identifier = connector.state().identifier();
        let mut connectors = self.inner.connectors.lock();
        if connectors.iter().any(|c| c.identifier == identifier) {
            return Err(ConnectorError::AlreadyObserved(identifier));
        }

        let name = connector.state().name().to_string();
        let connector_type = connector.connector_type();
        info!(
            connector = %name,
            connector_type,
            %identifier,
            interval_secs,
            "observing connector"
        );

        connectors.push(ObservedConnector {
            identifier,
            name,
            connector_type,
            connector: Arc::new(tokio::sync::Mutex::new(connector)),
            poll_interval: Duration::from_secs(interval_secs),
            slot: Arc::new(PollSlot::default()),
        });
        Ok(())
    }

    /// Stop observing a connector
    ///
    /// An in-flight poll still completes and publishes its event.
    pub fn remove(&self, identifier: Uuid) -> bool {
        let mut connectors = self.inner.connectors.lock();
        let Some(index) = connectors.iter().position(|c| c.identifier == identifier) else {
            return false;
        };
        let removed = connectors.remove(index);
        info!(connector = %removed.name, %identifier, "stopped observing connector");
        true
    }

    /// Run one scheduling pass and return the number of polls dispatched
    pub fn tick(&self) -> usize {
        self.inner.tick()
    }

    /// Start the tick loop
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if the loop is running.
    pub fn start(&self) -> Result<(), ConnectorError> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return Err(ConnectorError::AlreadyRunning);
        }

        {
            let mut poll_cancel = self.inner.poll_cancel.lock();
            if poll_cancel.is_cancelled() {
                *poll_cancel = CancellationToken::new();
            }
        }
        self.inner.tasks.reopen();

        let stop = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let tick_interval = self.tick_interval;
        let loop_stop = stop.clone();

        info!(
            connectors = self.len(),
            tick_interval = ?tick_interval,
            "starting observation scheduler"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = loop_stop.cancelled() => break,
                    _ = ticker.tick() => {
                        inner.tick();
                    }
                }
            }
            debug!("tick loop exited");
        });

        *self.inner.tick_loop.lock() = Some(TickLoop { stop, handle });
        Ok(())
    }

    /// Stop the tick loop
    ///
    /// In-flight polls are not cancelled. With `wait_for_completion`, returns
    /// once the loop has exited and no poll is in flight.
    pub async fn stop(&self, wait_for_completion: bool) {
        let tick_loop = self.inner.tick_loop.lock().take();
        self.inner.running.store(false, Ordering::SeqCst);

        if let Some(tick_loop) = &tick_loop {
            tick_loop.stop.cancel();
        }
        if !wait_for_completion {
            return;
        }

        if let Some(tick_loop) = tick_loop
            && let Err(e) = tick_loop.handle.await
        {
            error!(error = %e, "tick loop terminated abnormally");
        }

        self.inner.tasks.close();
        let in_flight = self.inner.tasks.len();
        if in_flight > 0 {
            info!(in_flight, "waiting for in-flight polls");
        }
        self.inner.tasks.wait().await;
        info!("observation scheduler stopped");
    }

    /// Cancel in-flight polls and stop, waiting for everything to exit
    pub async fn abort(&self) {
        warn!("aborting in-flight polls");
        self.inner.poll_cancel.lock().cancel();
        self.stop(true).await;
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Number of observed connectors
    pub fn len(&self) -> usize {
        self.inner.connectors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers of observed connectors, in registration order
    pub fn observed(&self) -> Vec<Uuid> {
        self.inner
            .connectors
            .lock()
            .iter()
            .map(|c| c.identifier)
            .collect()
    }
}

/// Execute one poll (runs inside a spawned task)
async fn run_poll(job: PollJob, events: mpsc::Sender<StatusQueried>, cancel: CancellationToken) {
    let started = Instant::now();

    // Inner task contains panics raised by the connector
    let connector = Arc::clone(&job.connector);
    let token = cancel.clone();
    let query = tokio::spawn(async move { connector.lock().await.query_status(&token).await });

    let mut outcome = match query.await {
        Ok(Ok(())) => PollOutcome::Completed,
        Ok(Err(e)) if e.is_cancelled() => PollOutcome::Cancelled,
        Ok(Err(e)) => PollOutcome::Failed(e.to_string()),
        Err(e) if !e.is_panic() => PollOutcome::Cancelled,
        Err(e) => {
            error!(connector = %job.name, error = %e, "poll task panicked");
            PollOutcome::Failed("poll task panicked".to_string())
        }
    };

    let (current_status, snapshots) = {
        let connector = job.connector.lock().await;
        let state = connector.state();
        if outcome == PollOutcome::Completed
            && let Some(detail) = state.last_error()
        {
            outcome = PollOutcome::Failed(detail.to_string());
        }
        (
            state.current_status().cloned(),
            state.snapshots().iter().cloned().collect(),
        )
    };

    let elapsed = started.elapsed();
    let completed_at = (outcome != PollOutcome::Cancelled).then(Instant::now);

    debug!(
        connector = %job.name,
        outcome = ?outcome,
        elapsed_ms = elapsed.as_millis() as u64,
        "poll complete"
    );

    let event = StatusQueried {
        identifier: job.identifier,
        name: job.name,
        connector_type: job.connector_type,
        outcome,
        current_status,
        snapshots,
        elapsed,
    };

    tokio::select! {
        biased;
        sent = events.send(event) => {
            if sent.is_err() {
                debug!(identifier = %job.identifier, "event receiver dropped");
            }
        }
        _ = cancel.cancelled() => {
            warn!(identifier = %job.identifier, "dropping event - scheduler aborted");
        }
    }

    // Released only once the event is handed off
    job.slot.finish(completed_at);
}
