use thiserror::Error;

/// Failures reaching or keeping a device link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("device {address} not discovered within {timeout_ms}ms")]
    DiscoveryTimeout { address: String, timeout_ms: u64 },

    #[error("device {address} not found")]
    NotFound { address: String },

    #[error("connect to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("link to {address} failed: {reason}")]
    Link { address: String, reason: String },
}

/// A notification record that could not be turned into a measurement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{layout} record must be {expected} bytes, got {actual}")]
    SizeMismatch {
        layout: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{layout} record field {field} is not a finite value")]
    SchemaMismatch {
        layout: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("write to characteristic {characteristic} failed: {reason}")]
pub struct WriteCommandError {
    pub characteristic: &'static str,
    pub reason: String,
}

/// The outbound telemetry path refused a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("telemetry queue is full, batch of {dropped} messages dropped")]
    QueueFull { dropped: usize },

    #[error("telemetry writer has shut down")]
    Closed,

    #[error("telemetry sink unreachable: {0}")]
    Sink(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatteryReadError {
    #[error("sensor is not connected")]
    NotConnected,

    #[error("battery read timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("battery read failed: {0}")]
    Transport(String),

    #[error("malformed battery payload: {0}")]
    Malformed(String),
}

/// Everything that ends a session attempt before or during streaming.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    WriteCommand(#[from] WriteCommandError),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("shutdown requested before streaming started")]
    Cancelled,
}

impl SessionError {
    /// Short label used in connection summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Connection(ConnectionError::DiscoveryTimeout { .. }) => "discovery-timeout",
            SessionError::Connection(ConnectionError::NotFound { .. }) => "not-found",
            SessionError::Connection(ConnectionError::Connect { .. }) => "connect",
            SessionError::Connection(ConnectionError::Link { .. }) => "link",
            SessionError::WriteCommand(_) => "write-command",
            SessionError::Timeout { .. } => "timeout",
            SessionError::InvalidTransition { .. } => "invalid-transition",
            SessionError::Cancelled => "cancelled",
        }
    }
}
