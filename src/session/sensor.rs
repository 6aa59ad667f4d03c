use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use crate::analysis::WindowedVarianceAnalyzer;
use crate::core::{decode, LayoutKind, MeasurementMode, SensorIdentity};
use crate::error::{ConnectionError, SessionError};
use crate::hal::{Characteristic, DeviceConnection, DeviceTransport, Notification};
use crate::observability::SessionMetrics;
use crate::telemetry::TelemetryForwarder;
use super::{CloseReason, SensorRegistry, SessionState};

/// Everything a session needs to know before it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub mode: MeasurementMode,
    pub layout: LayoutKind,
    pub window_size: usize,
    pub discovery_timeout: Duration,
    /// Bound for every other transport call (connect, subscribe, writes, disconnect)
    pub command_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: MeasurementMode::FreeAcceleration,
            layout: LayoutKind::Short,
            window_size: 10,
            discovery_timeout: Duration::from_secs(20),
            command_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared collaborators handed to every session.
#[derive(Clone)]
pub struct SessionContext {
    pub transport: Arc<dyn DeviceTransport>,
    pub forwarder: TelemetryForwarder,
    pub registry: SensorRegistry,
    pub metrics: Arc<SessionMetrics>,
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    ShutdownRequested,
    LinkLost,
    /// `run` was called on a session that is not streaming
    NotStreaming,
}

async fn bounded<T, E, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, E>>,
    SessionError: From<E>,
{
    match timeout(limit, fut).await {
        Ok(result) => result.map_err(SessionError::from),
        Err(_) => Err(SessionError::Timeout {
            operation,
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// One logical attachment to one sensor.
///
/// Owns the link, the notification queue and the variance window. Frames are
/// handled strictly in the order the transport queued them.
pub struct SensorSession {
    identity: SensorIdentity,
    settings: SessionSettings,
    ctx: SessionContext,
    state: SessionState,
    analyzer: WindowedVarianceAnalyzer,
    connection: Option<Arc<dyn DeviceConnection>>,
    notifications: Option<mpsc::Receiver<Notification>>,
}

impl SensorSession {
    pub fn new(identity: SensorIdentity, settings: SessionSettings, ctx: SessionContext) -> Self {
        ctx.registry.register(identity.clone());
        let analyzer = WindowedVarianceAnalyzer::new(settings.window_size);
        Self {
            identity,
            settings,
            ctx,
            state: SessionState::Disconnected,
            analyzer,
            connection: None,
            notifications: None,
        }
    }

    pub fn identity(&self) -> &SensorIdentity {
        &self.identity
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn analyzer(&self) -> &WindowedVarianceAnalyzer {
        &self.analyzer
    }

    fn transition(&mut self, target: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(&target) {
            return Err(SessionError::InvalidTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        debug!(sensor = self.identity.index(), from = %self.state, to = %target, "session transition");
        self.state = target;
        self.ctx.registry.set_state(self.identity.index(), self.state.clone());
        Ok(())
    }

    /// Discover, connect, subscribe and activate streaming.
    ///
    /// Any failure leaves the session `Failed` with the link released. The
    /// session never retries on its own.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Connecting)?;
        info!(
            sensor = self.identity.index(),
            address = self.identity.address(),
            mode = ?self.settings.mode,
            layout = ?self.settings.layout,
            "connecting"
        );

        if let Err(error) = self.establish().await {
            self.fail(&error).await;
            return Err(error);
        }
        Ok(())
    }

    async fn establish(&mut self) -> Result<(), SessionError> {
        let discovery = self.settings.discovery_timeout;
        let command = self.settings.command_timeout;

        let handle = match timeout(
            discovery,
            self.ctx.transport.discover(&self.identity, discovery),
        )
        .await
        {
            Ok(found) => found?,
            Err(_) => {
                return Err(ConnectionError::DiscoveryTimeout {
                    address: self.identity.address().to_string(),
                    timeout_ms: discovery.as_millis() as u64,
                }
                .into())
            }
        };

        let connection = bounded(command, "connect", self.ctx.transport.connect(&handle)).await?;
        self.connection = Some(connection.clone());
        self.ctx.registry.attach(self.identity.index(), connection.clone());
        self.transition(SessionState::Connected)?;

        let payload = Characteristic::for_layout(self.settings.layout);
        let notifications = bounded(command, "subscribe", connection.subscribe(payload)).await?;
        self.notifications = Some(notifications);

        bounded(
            command,
            "activate",
            connection.write_command(
                Characteristic::Measurement,
                &self.settings.mode.start_command(),
                true,
            ),
        )
        .await?;

        self.transition(SessionState::Streaming)?;
        info!(sensor = self.identity.index(), "streaming started");
        Ok(())
    }

    async fn fail(&mut self, error: &SessionError) {
        self.notifications = None;
        if let Some(connection) = self.connection.take() {
            let _ = bounded(self.settings.command_timeout, "disconnect", connection.disconnect()).await;
        }
        self.ctx.registry.detach(self.identity.index());
        let _ = self.transition(SessionState::Failed {
            error: error.to_string(),
        });
        warn!(sensor = self.identity.index(), kind = error.kind(), %error, "session failed");
    }

    /// Streams until shutdown is signalled or the link drops.
    pub async fn run(&mut self, shutdown: &mut watch::Receiver<bool>) -> StreamEnd {
        if self.state != SessionState::Streaming {
            return StreamEnd::NotStreaming;
        }
        let Some(mut notifications) = self.notifications.take() else {
            return StreamEnd::NotStreaming;
        };

        let end = loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => break StreamEnd::ShutdownRequested,
                frame = notifications.recv() => match frame {
                    Some(bytes) => self.handle_frame(&bytes),
                    None => break StreamEnd::LinkLost,
                },
            }
        };

        match end {
            StreamEnd::LinkLost => self.on_link_lost(),
            _ => self.notifications = Some(notifications),
        }
        end
    }

    /// Decode, analyze and forward one notification.
    pub fn handle_frame(&mut self, bytes: &[u8]) {
        let metrics = &self.ctx.metrics;
        let started = metrics.record_notification();
        let sensor = self.identity.index();

        let measurement = match decode(bytes, self.settings.layout) {
            Ok(m) => m,
            Err(error) => {
                metrics.record_decode_error();
                warn!(sensor, %error, "dropping malformed notification");
                return;
            }
        };
        metrics.record_decoded();

        if let Err(error) = self.ctx.forwarder.forward_measurement(sensor, &measurement) {
            metrics.record_forward_error();
            if metrics.forward_errors() % 100 == 1 {
                warn!(sensor, %error, "measurement not forwarded");
            }
        }

        if let Some(classification) = self.analyzer.observe(measurement.primary_triple()) {
            metrics.record_classification();
            debug!(sensor, axis = %classification.axis, variances = ?classification.variances, "window classified");
            if let Err(error) = self.ctx.forwarder.forward_classification(sensor, &classification) {
                metrics.record_forward_error();
                warn!(sensor, %error, "classification not forwarded");
            }
        }

        metrics.finish_handling(started);
    }

    fn on_link_lost(&mut self) {
        self.connection = None;
        self.notifications = None;
        self.ctx.registry.detach(self.identity.index());
        let _ = self.transition(SessionState::Closed {
            reason: CloseReason::LinkLost,
        });
        warn!(sensor = self.identity.index(), "link lost while streaming");
    }

    /// Stops streaming and releases the link. Idempotent.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        if self.state.is_terminal() || self.state == SessionState::Disconnected {
            return Ok(());
        }

        let was_streaming = self.state == SessionState::Streaming;
        if self.state != SessionState::Disconnecting {
            self.transition(SessionState::Disconnecting)?;
        }

        let limit = self.settings.command_timeout;
        let sensor = self.identity.index();

        if let Some(connection) = self.connection.take() {
            if was_streaming {
                let stop = self.settings.mode.stop_command();
                if let Err(error) = bounded(
                    limit,
                    "stop-measurement",
                    connection.write_command(Characteristic::Measurement, &stop, true),
                )
                .await
                {
                    debug!(sensor, %error, "stop command not acknowledged");
                }
            }

            let payload = Characteristic::for_layout(self.settings.layout);
            if let Err(error) = bounded(limit, "unsubscribe", connection.unsubscribe(payload)).await {
                debug!(sensor, %error, "unsubscribe failed");
            }
            if let Err(error) = bounded(limit, "disconnect", connection.disconnect()).await {
                warn!(sensor, %error, "disconnect did not complete cleanly");
            }
        }

        self.notifications = None;
        self.ctx.registry.detach(sensor);
        self.transition(SessionState::Closed {
            reason: CloseReason::Requested,
        })?;
        info!(sensor, "disconnected");
        Ok(())
    }
}
