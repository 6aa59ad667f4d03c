pub mod battery;
pub mod listener;

pub use battery::{BatteryMonitor, BatteryReading, BatteryReport};
pub use listener::{ControlAction, ControlListener, BATTERY_STATUS_ADDRESS, SENSOR_STATUS_ADDRESS};
