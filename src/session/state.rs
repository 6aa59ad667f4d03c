use std::fmt;
use serde::{Deserialize, Serialize};

/// Why a session reached its terminal disconnected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// `stop()` completed
    Requested,
    /// The transport dropped the link while streaming
    LinkLost,
    /// The supervisor aborted the session after the grace period
    Forced,
}

/// Per-sensor lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Streaming,
    Disconnecting,
    /// Terminal disconnected state
    Closed { reason: CloseReason },
    /// Absorbing failure state
    Failed { error: String },
}

impl SessionState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;

        if let Failed { .. } = target {
            return !self.is_terminal();
        }

        matches!(
            (self, target),
            (Disconnected, Connecting) |

            (Connecting, Connected) |
            (Connecting, Disconnecting) |

            (Connected, Streaming) |
            (Connected, Disconnecting) |

            (Streaming, Disconnecting) |
            (Streaming, Closed { reason: CloseReason::LinkLost }) |

            (Disconnecting, Closed { .. }) |

            // Supervisor override for sessions that never confirmed shutdown
            (Connecting | Connected | Streaming, Closed { reason: CloseReason::Forced })
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed { .. } | SessionState::Failed { .. })
    }

    /// Connected or streaming: the link can serve characteristic reads.
    pub fn is_linked(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Streaming)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Streaming => "streaming",
            Self::Disconnecting => "disconnecting",
            Self::Closed { .. } => "closed",
            Self::Failed { .. } => "failed",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed { reason } => write!(f, "closed ({:?})", reason),
            Self::Failed { error } => write!(f, "failed ({})", error),
            other => f.write_str(other.name()),
        }
    }
}
