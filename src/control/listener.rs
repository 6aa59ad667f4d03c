use std::collections::HashMap;
use std::sync::Arc;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use crate::session::SensorRegistry;
use crate::telemetry::{ControlMessage, TelemetryForwarder};
use super::BatteryMonitor;

pub const BATTERY_STATUS_ADDRESS: &str = "/batterystatus";
pub const SENSOR_STATUS_ADDRESS: &str = "/sensorstatus";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    QueryBattery,
    QuerySensorStatus,
}

/// Routes inbound control messages by exact address.
///
/// Both actions take an optional integer argument selecting one sensor; without
/// it every registered sensor is addressed.
#[derive(Clone)]
pub struct ControlListener {
    routes: Arc<HashMap<String, ControlAction>>,
    battery: BatteryMonitor,
    registry: SensorRegistry,
    forwarder: TelemetryForwarder,
}

impl ControlListener {
    pub fn new(battery: BatteryMonitor, registry: SensorRegistry, forwarder: TelemetryForwarder) -> Self {
        let mut routes = HashMap::new();
        routes.insert(BATTERY_STATUS_ADDRESS.to_string(), ControlAction::QueryBattery);
        routes.insert(SENSOR_STATUS_ADDRESS.to_string(), ControlAction::QuerySensorStatus);
        Self {
            routes: Arc::new(routes),
            battery,
            registry,
            forwarder,
        }
    }

    /// Adds or replaces the action bound to `address`.
    pub fn register(&mut self, address: impl Into<String>, action: ControlAction) {
        Arc::make_mut(&mut self.routes).insert(address.into(), action);
    }

    pub fn route(&self, address: &str) -> Option<ControlAction> {
        self.routes.get(address).copied()
    }

    /// Performs the action for one message. Returns `None` when the address is
    /// unknown or the argument is unusable.
    pub async fn dispatch(&self, message: &ControlMessage) -> Option<ControlAction> {
        let Some(action) = self.route(&message.address) else {
            warn!(address = %message.address, "unknown control address");
            return None;
        };

        let target = match message.args.first() {
            None => None,
            Some(Value::Number(n)) if n.is_f64() => {
                warn!(address = %message.address, arg = %n, "sensor index is not an integer");
                return None;
            }
            Some(Value::Number(n)) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(index) => Some(index),
                None => {
                    warn!(address = %message.address, arg = %n, "sensor index out of range");
                    return None;
                }
            },
            Some(other) => {
                warn!(address = %message.address, arg = %other, "expected an integer sensor index");
                return None;
            }
        };

        debug!(address = %message.address, ?action, ?target, "dispatching control message");
        match action {
            ControlAction::QueryBattery => match target {
                Some(index) => {
                    let _ = self.battery.query(index).await;
                }
                None => {
                    let _ = self.battery.query_all().await;
                }
            },
            ControlAction::QuerySensorStatus => {
                let indices = match target {
                    Some(index) => vec![index],
                    None => self.registry.indices(),
                };
                for index in indices {
                    match self.registry.state(index) {
                        Some(state) => {
                            if let Err(e) = self.forwarder.forward_state(index, &state) {
                                warn!(sensor = index, error = %e, "status not forwarded");
                            }
                        }
                        None => warn!(sensor = index, "status requested for unknown sensor"),
                    }
                }
            }
        }
        Some(action)
    }

    /// Handles messages from `inbox` until shutdown or until the inbox closes.
    /// Each message is handled on its own task so a slow read never delays the
    /// next request.
    pub async fn run(self, mut inbox: mpsc::Receiver<ControlMessage>, mut shutdown: watch::Receiver<bool>) {
        let mut inflight = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                received = inbox.recv() => match received {
                    Some(message) => {
                        let listener = self.clone();
                        inflight.spawn(async move {
                            listener.dispatch(&message).await;
                        });
                    }
                    None => break,
                },
                Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
            }
        }
        while inflight.join_next().await.is_some() {}
        debug!("control listener stopped");
    }
}
