pub mod forwarder;
pub mod memory;
pub mod sink;
pub mod udp;

pub use forwarder::{Batch, TelemetryForwarder, TelemetryWriter, WriterStats};
pub use memory::MemorySink;
pub use sink::{ControlMessage, OutboundMessage, TelemetrySink, TelemetryValue};
pub use udp::{UdpControlSource, UdpSink};
