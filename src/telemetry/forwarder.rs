use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use crate::analysis::AxisClassification;
use crate::control::BatteryReport;
use crate::core::Measurement;
use crate::error::ForwardError;
use crate::session::SessionState;
use super::{OutboundMessage, TelemetrySink, TelemetryValue};

/// Messages derived from one source item; written to the sink back to back.
pub type Batch = Vec<OutboundMessage>;

fn topic(sensor: u32, suffix: &str) -> String {
    format!("/sensor_{}/{}", sensor, suffix)
}

/// One message per float field in layout order, then the timestamp.
/// `acc_x` is published as `acc/x`.
pub fn measurement_messages(sensor: u32, measurement: &Measurement) -> Batch {
    let mut batch: Batch = measurement
        .fields()
        .map(|(name, value)| {
            OutboundMessage::new(topic(sensor, &name.replace('_', "/")), TelemetryValue::Float(value))
        })
        .collect();
    batch.push(OutboundMessage::new(
        topic(sensor, "timestamp"),
        TelemetryValue::Int(measurement.timestamp as i64),
    ));
    batch
}

pub fn classification_message(sensor: u32, classification: &AxisClassification) -> OutboundMessage {
    OutboundMessage::new(
        topic(sensor, "max_variance_axis"),
        TelemetryValue::Text(classification.axis.name().to_string()),
    )
}

pub fn battery_messages(sensor: u32, report: &BatteryReport) -> Batch {
    match report {
        Ok(reading) => vec![
            OutboundMessage::new(
                topic(sensor, "battery/level"),
                TelemetryValue::Int(reading.level as i64),
            ),
            OutboundMessage::new(
                topic(sensor, "battery/charging"),
                TelemetryValue::Int(reading.charging as i64),
            ),
        ],
        Err(error) => vec![OutboundMessage::new(
            topic(sensor, "battery/error"),
            TelemetryValue::Text(error.to_string()),
        )],
    }
}

pub fn state_message(sensor: u32, state: &SessionState) -> OutboundMessage {
    OutboundMessage::new(topic(sensor, "state"), TelemetryValue::Text(state.name().to_string()))
}

/// Cheap, cloneable handle onto the single telemetry writer.
///
/// Enqueueing never waits: when the writer falls behind the batch is dropped
/// and reported, so acquisition is never stalled by the telemetry path.
#[derive(Clone)]
pub struct TelemetryForwarder {
    tx: mpsc::Sender<Batch>,
}

impl TelemetryForwarder {
    /// Creates the forwarder and the writer that must be run against a sink.
    pub fn channel(capacity: usize) -> (Self, TelemetryWriter) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, TelemetryWriter { rx })
    }

    pub fn forward_measurement(&self, sensor: u32, measurement: &Measurement) -> Result<(), ForwardError> {
        self.enqueue(measurement_messages(sensor, measurement))
    }

    pub fn forward_classification(
        &self,
        sensor: u32,
        classification: &AxisClassification,
    ) -> Result<(), ForwardError> {
        self.enqueue(vec![classification_message(sensor, classification)])
    }

    pub fn forward_battery(&self, sensor: u32, report: &BatteryReport) -> Result<(), ForwardError> {
        self.enqueue(battery_messages(sensor, report))
    }

    pub fn forward_state(&self, sensor: u32, state: &SessionState) -> Result<(), ForwardError> {
        self.enqueue(vec![state_message(sensor, state)])
    }

    pub fn enqueue(&self, batch: Batch) -> Result<(), ForwardError> {
        self.tx.try_send(batch).map_err(|e| match e {
            TrySendError::Full(batch) => ForwardError::QueueFull { dropped: batch.len() },
            TrySendError::Closed(_) => ForwardError::Closed,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub batches: u64,
    pub messages: u64,
    pub failures: u64,
}

/// Owns the sink; drains batches in the order they were enqueued.
pub struct TelemetryWriter {
    rx: mpsc::Receiver<Batch>,
}

impl TelemetryWriter {
    /// Runs until every `TelemetryForwarder` clone has been dropped.
    pub async fn run(mut self, sink: Box<dyn TelemetrySink>) -> WriterStats {
        let mut stats = WriterStats::default();
        while let Some(batch) = self.rx.recv().await {
            stats.batches += 1;
            for message in &batch {
                match sink.send(message).await {
                    Ok(()) => stats.messages += 1,
                    Err(e) => {
                        stats.failures += 1;
                        // First failure and then every 100th to keep the log readable
                        if stats.failures % 100 == 1 {
                            warn!(topic = %message.topic, error = %e, failures = stats.failures, "telemetry send failed");
                        }
                    }
                }
            }
        }
        debug!(?stats, "telemetry writer stopped");
        stats
    }
}
