use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::error::ForwardError;

/// Payload of one outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Int(i64),
    Float(f32),
    Text(String),
    List(Vec<f32>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub topic: String,
    pub value: TelemetryValue,
}

impl OutboundMessage {
    pub fn new(topic: impl Into<String>, value: TelemetryValue) -> Self {
        Self {
            topic: topic.into(),
            value,
        }
    }
}

/// Inbound request on the telemetry channel's reverse direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub address: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ControlMessage {
    pub fn new(address: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }
}

/// Fire-and-forget outbound transport.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ForwardError>;
}
