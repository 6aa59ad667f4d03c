pub mod analysis;
pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod hal;
pub mod logging;
pub mod observability;
pub mod resilience;
pub mod session;
pub mod telemetry;

pub use config::AcquisitionConfig;
pub use error::{BatteryReadError, ConnectionError, DecodeError, ForwardError, SessionError, WriteCommandError};
