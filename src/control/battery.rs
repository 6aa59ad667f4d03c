use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use crate::error::BatteryReadError;
use crate::hal::Characteristic;
use crate::session::SensorRegistry;
use crate::telemetry::TelemetryForwarder;

/// Battery state as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryReading {
    pub level: u8,
    pub charging: bool,
}

impl BatteryReading {
    /// Byte 0 is the level in percent, byte 1 the charging flag.
    pub fn parse(bytes: &[u8]) -> Result<Self, BatteryReadError> {
        let [level, charging, ..] = bytes else {
            return Err(BatteryReadError::Malformed(format!(
                "expected at least 2 bytes, got {}",
                bytes.len()
            )));
        };
        if *level > 100 {
            return Err(BatteryReadError::Malformed(format!("level {} out of range", level)));
        }
        Ok(Self {
            level: *level,
            charging: *charging != 0,
        })
    }
}

pub type BatteryReport = Result<BatteryReading, BatteryReadError>;

/// Reads the battery characteristic of linked sensors and forwards the result.
#[derive(Clone)]
pub struct BatteryMonitor {
    registry: SensorRegistry,
    forwarder: TelemetryForwarder,
    read_timeout: Duration,
}

impl BatteryMonitor {
    pub fn new(registry: SensorRegistry, forwarder: TelemetryForwarder, read_timeout: Duration) -> Self {
        Self {
            registry,
            forwarder,
            read_timeout,
        }
    }

    /// Reads without forwarding. Sensors that are not linked short-circuit.
    pub async fn read(&self, index: u32) -> BatteryReport {
        let Some(connection) = self.registry.linked_connection(index) else {
            return Err(BatteryReadError::NotConnected);
        };
        match timeout(self.read_timeout, connection.read_characteristic(Characteristic::Battery)).await {
            Ok(Ok(bytes)) => BatteryReading::parse(&bytes),
            Ok(Err(e)) => Err(BatteryReadError::Transport(e.to_string())),
            Err(_) => Err(BatteryReadError::Timeout {
                timeout_ms: self.read_timeout.as_millis() as u64,
            }),
        }
    }

    pub async fn query(&self, index: u32) -> BatteryReport {
        let report = self.read(index).await;
        self.forward(index, &report);
        report
    }

    /// Queries every registered sensor concurrently, ordered by index.
    pub async fn query_all(&self) -> Vec<(u32, BatteryReport)> {
        let mut reports = Vec::new();
        let mut reads = JoinSet::new();

        for index in self.registry.indices() {
            if self.registry.linked_connection(index).is_none() {
                let report = Err(BatteryReadError::NotConnected);
                self.forward(index, &report);
                reports.push((index, report));
                continue;
            }
            let monitor = self.clone();
            reads.spawn(async move { (index, monitor.query(index).await) });
        }

        while let Some(joined) = reads.join_next().await {
            match joined {
                Ok(entry) => reports.push(entry),
                Err(e) => warn!(error = %e, "battery read task failed"),
            }
        }
        reports.sort_by_key(|(index, _)| *index);
        reports
    }

    /// Queries all sensors every `period` until shutdown. The first query
    /// happens one period after start.
    pub async fn run_periodic(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        if period.is_zero() {
            warn!("battery period is zero, periodic monitoring disabled");
            return;
        }
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = period.as_secs(), "battery monitor started");

        loop {
            // The watch guard must not live across the query below
            let stopping = tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => true,
                _ = ticker.tick() => false,
            };
            if stopping {
                break;
            }
            let reports = self.query_all().await;
            let ok = reports.iter().filter(|(_, r)| r.is_ok()).count();
            debug!(queried = reports.len(), ok, "periodic battery query");
        }
        debug!("battery monitor stopped");
    }

    fn forward(&self, index: u32, report: &BatteryReport) {
        match report {
            Ok(reading) => debug!(sensor = index, level = reading.level, charging = reading.charging, "battery"),
            Err(e) => debug!(sensor = index, error = %e, "battery unavailable"),
        }
        if let Err(e) = self.forwarder.forward_battery(index, report) {
            warn!(sensor = index, error = %e, "battery report not forwarded");
        }
    }
}
