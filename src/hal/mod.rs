pub mod mock;
pub mod traits;
pub mod types;

pub use traits::{DeviceConnection, DeviceTransport};
pub use types::{Characteristic, DeviceHandle, Notification};
