pub mod manager;
pub mod registry;
pub mod sensor;
pub mod state;

pub use manager::{
    ConnectionSummary, SensorConnectionManager, ShutdownOutcome, ShutdownSummary, ShutdownTrigger,
    StartOutcome,
};
pub use registry::SensorRegistry;
pub use sensor::{SensorSession, SessionContext, SessionSettings, StreamEnd};
pub use state::{CloseReason, SessionState};
