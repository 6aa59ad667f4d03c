use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{ensure, Result};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{error, info, warn};
use crate::core::SensorIdentity;
use crate::error::SessionError;
use crate::hal::DeviceTransport;
use crate::observability::{AcquisitionMonitor, MetricsCollector, SessionMetrics};
use crate::resilience::RetryPolicy;
use crate::telemetry::TelemetryForwarder;
use super::{
    CloseReason, SensorRegistry, SensorSession, SessionContext, SessionSettings, SessionState,
    StreamEnd,
};

/// Slack on top of the computed start budget for scheduling jitter.
const START_SLACK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Connected,
    Failed { kind: &'static str, message: String },
    /// No outcome was reported within the start budget
    TimedOut,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub entries: Vec<(SensorIdentity, StartOutcome)>,
}

impl ConnectionSummary {
    pub fn connected_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, outcome)| *outcome == StartOutcome::Connected)
            .count()
    }

    /// Everything that did not connect, timed-out starts included.
    pub fn failed_count(&self) -> usize {
        self.entries.len() - self.connected_count()
    }

    pub fn timed_out_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, outcome)| *outcome == StartOutcome::TimedOut)
            .count()
    }

    pub fn meets_quorum(&self, min_connected: usize) -> bool {
        self.connected_count() >= min_connected
    }

    pub fn outcome(&self, index: u32) -> Option<&StartOutcome> {
        self.entries
            .iter()
            .find(|(identity, _)| identity.index() == index)
            .map(|(_, outcome)| outcome)
    }
}

impl fmt::Display for ConnectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} connected / {} failed",
            self.connected_count(),
            self.failed_count()
        )?;
        for (identity, outcome) in &self.entries {
            match outcome {
                StartOutcome::Connected => writeln!(f, "  {}: connected", identity)?,
                StartOutcome::Failed { kind, message } => {
                    writeln!(f, "  {}: failed ({}): {}", identity, kind, message)?
                }
                StartOutcome::TimedOut => writeln!(f, "  {}: timed out", identity)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Stopped and released its link after the signal
    Clean,
    /// Missed the grace deadline and was aborted
    Forced,
    /// Had already ended (failed start, lost link) before the signal took effect
    AlreadyStopped(SessionState),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    pub entries: Vec<(SensorIdentity, ShutdownOutcome)>,
}

impl ShutdownSummary {
    pub fn clean_count(&self) -> usize {
        self.count(|o| *o == ShutdownOutcome::Clean)
    }

    pub fn forced_count(&self) -> usize {
        self.count(|o| *o == ShutdownOutcome::Forced)
    }

    pub fn outcome(&self, index: u32) -> Option<&ShutdownOutcome> {
        self.entries
            .iter()
            .find(|(identity, _)| identity.index() == index)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, predicate: impl Fn(&ShutdownOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| predicate(o)).count()
    }
}

impl fmt::Display for ShutdownSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} clean / {} forced",
            self.clean_count(),
            self.forced_count()
        )?;
        for (identity, outcome) in &self.entries {
            match outcome {
                ShutdownOutcome::Clean => writeln!(f, "  {}: clean", identity)?,
                ShutdownOutcome::Forced => writeln!(f, "  {}: forced", identity)?,
                ShutdownOutcome::AlreadyStopped(state) => {
                    writeln!(f, "  {}: already stopped ({})", identity, state)?
                }
            }
        }
        Ok(())
    }
}

/// Requests shutdown without borrowing the manager, e.g. while `start_all`
/// is still waiting on slow sensors.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Starts, supervises and stops one session task per configured sensor.
///
/// Sessions share nothing but the registry and the telemetry queue, so a
/// failing sensor never takes its siblings down.
pub struct SensorConnectionManager {
    sensors: Vec<SensorIdentity>,
    settings: SessionSettings,
    retry: RetryPolicy,
    transport: Arc<dyn DeviceTransport>,
    forwarder: TelemetryForwarder,
    registry: SensorRegistry,
    collector: MetricsCollector,
    shutdown_tx: Arc<watch::Sender<bool>>,
    tasks: Vec<(SensorIdentity, JoinHandle<SessionState>)>,
}

impl SensorConnectionManager {
    pub fn new(
        sensors: Vec<SensorIdentity>,
        settings: SessionSettings,
        retry: RetryPolicy,
        transport: Arc<dyn DeviceTransport>,
        forwarder: TelemetryForwarder,
    ) -> Self {
        let registry = SensorRegistry::new();
        for identity in &sensors {
            registry.register(identity.clone());
        }
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            sensors,
            settings,
            retry,
            transport,
            forwarder,
            registry,
            collector: MetricsCollector::new(),
            shutdown_tx: Arc::new(shutdown_tx),
            tasks: Vec::new(),
        }
    }

    pub fn registry(&self) -> SensorRegistry {
        self.registry.clone()
    }

    pub fn forwarder(&self) -> TelemetryForwarder {
        self.forwarder.clone()
    }

    /// Receiver that flips to `true` when `shutdown` begins.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn monitor(&self) -> AcquisitionMonitor {
        AcquisitionMonitor::new(self.collector.clone())
    }

    /// Worst case for one sensor to report its start outcome.
    fn start_budget(&self) -> Duration {
        // discover, connect, subscribe, activate, release on failure
        let attempt = self.settings.discovery_timeout + self.settings.command_timeout * 4;
        let attempts = self.retry.max_retries() as u32 + 1;
        attempt * attempts + self.retry.total_delay() + START_SLACK
    }

    /// Starts every configured sensor concurrently and waits for each outcome.
    pub async fn start_all(&mut self) -> Result<ConnectionSummary> {
        ensure!(self.tasks.is_empty(), "sensors already started");
        ensure!(!*self.shutdown_tx.borrow(), "manager has been shut down");

        info!(sensors = self.sensors.len(), transport = self.transport.transport_id(), "starting sensors");

        let mut pending = Vec::with_capacity(self.sensors.len());
        for identity in &self.sensors {
            let metrics = Arc::new(SessionMetrics::new(identity.index()));
            self.collector.register(metrics.clone());

            let ctx = SessionContext {
                transport: self.transport.clone(),
                forwarder: self.forwarder.clone(),
                registry: self.registry.clone(),
                metrics,
            };
            let (started_tx, started_rx) = oneshot::channel();
            let handle = tokio::spawn(supervise(
                identity.clone(),
                self.settings.clone(),
                self.retry.clone(),
                ctx,
                self.shutdown_tx.subscribe(),
                started_tx,
            ));
            self.tasks.push((identity.clone(), handle));
            pending.push((identity.clone(), started_rx));
        }

        let deadline = Instant::now() + self.start_budget();
        let mut summary = ConnectionSummary::default();
        for (identity, started_rx) in pending {
            let outcome = match timeout_at(deadline, started_rx).await {
                Ok(Ok(Ok(()))) => StartOutcome::Connected,
                Ok(Ok(Err(error))) => StartOutcome::Failed {
                    kind: error.kind(),
                    message: error.to_string(),
                },
                Ok(Err(_)) => StartOutcome::Failed {
                    kind: "aborted",
                    message: "session task ended without reporting".to_string(),
                },
                Err(_) => {
                    warn!(sensor = identity.index(), "no start outcome within budget");
                    StartOutcome::TimedOut
                }
            };
            summary.entries.push((identity, outcome));
        }

        info!(
            connected = summary.connected_count(),
            failed = summary.failed_count(),
            "sensor start complete"
        );
        Ok(summary)
    }

    /// Signals every session to stop and waits up to `grace` for all of them.
    ///
    /// Sessions still running at the deadline are aborted and reported as
    /// forced.
    pub async fn shutdown(&mut self, grace: Duration) -> ShutdownSummary {
        self.shutdown_tx.send_replace(true);
        info!(grace_ms = grace.as_millis() as u64, "shutting down sensors");

        let deadline = Instant::now() + grace;
        let mut summary = ShutdownSummary::default();
        for (identity, mut handle) in self.tasks.drain(..) {
            let index = identity.index();
            let outcome = match timeout_at(deadline, &mut handle).await {
                Ok(Ok(SessionState::Closed {
                    reason: CloseReason::Requested,
                })) => ShutdownOutcome::Clean,
                Ok(Ok(state)) => ShutdownOutcome::AlreadyStopped(state),
                Ok(Err(join_error)) => {
                    error!(sensor = index, error = %join_error, "session task panicked");
                    let state = SessionState::Failed {
                        error: join_error.to_string(),
                    };
                    self.registry.detach(index);
                    self.registry.set_state(index, state.clone());
                    ShutdownOutcome::AlreadyStopped(state)
                }
                Err(_) => {
                    handle.abort();
                    self.registry.detach(index);
                    self.registry.set_state(
                        index,
                        SessionState::Closed {
                            reason: CloseReason::Forced,
                        },
                    );
                    warn!(sensor = index, "session missed shutdown deadline, forced");
                    ShutdownOutcome::Forced
                }
            };
            summary.entries.push((identity, outcome));
        }

        info!("{}", self.monitor().generate_report());
        summary
    }
}

/// Owns one sensor for its whole life: start with retries, stream, stop.
async fn supervise(
    identity: SensorIdentity,
    settings: SessionSettings,
    retry: RetryPolicy,
    ctx: SessionContext,
    mut shutdown: watch::Receiver<bool>,
    started: oneshot::Sender<Result<(), SessionError>>,
) -> SessionState {
    let sensor = identity.index();
    let mut retries = 0;

    let mut session = loop {
        let mut session = SensorSession::new(identity.clone(), settings.clone(), ctx.clone());
        let result = tokio::select! {
            result = session.start() => Some(result),
            _ = shutdown.wait_for(|stop| *stop) => None,
        };

        match result {
            Some(Ok(())) => {
                let _ = started.send(Ok(()));
                break session;
            }
            Some(Err(error)) => {
                retries += 1;
                let Some(delay) = retry.delay_for(retries) else {
                    let _ = started.send(Err(error));
                    return session.state().clone();
                };
                info!(sensor, retry = retries, delay_ms = delay.as_millis() as u64, %error, "retrying sensor start");
                let cancelled = tokio::select! {
                    _ = sleep(delay) => false,
                    _ = shutdown.wait_for(|stop| *stop) => true,
                };
                if cancelled {
                    let _ = started.send(Err(error));
                    return session.state().clone();
                }
            }
            None => {
                if let Err(error) = session.stop().await {
                    warn!(sensor, %error, "stop after cancelled start failed");
                }
                let _ = started.send(Err(SessionError::Cancelled));
                return session.state().clone();
            }
        }
    };

    if session.run(&mut shutdown).await == StreamEnd::ShutdownRequested {
        if let Err(error) = session.stop().await {
            warn!(sensor, %error, "stop failed");
        }
    }
    session.state().clone()
}
