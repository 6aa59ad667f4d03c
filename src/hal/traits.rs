use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::mpsc;
use crate::core::SensorIdentity;
use crate::error::{ConnectionError, WriteCommandError};
use super::types::{Characteristic, DeviceHandle, Notification};

/// Locates devices and opens links to them.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Unique transport identifier (e.g., "simulated", "bluez")
    fn transport_id(&self) -> &str;

    /// Scan for the device with the identity's address, giving up after `timeout`.
    async fn discover(
        &self,
        identity: &SensorIdentity,
        timeout: Duration,
    ) -> Result<DeviceHandle, ConnectionError>;

    async fn connect(
        &self,
        device: &DeviceHandle,
    ) -> Result<Arc<dyn DeviceConnection>, ConnectionError>;
}

/// An open link to one device.
///
/// Shared between the owning session and the battery monitor, so every
/// method takes `&self`.
#[async_trait]
pub trait DeviceConnection: Send + Sync {
    /// Enable notifications. Frames arrive on the returned queue in device
    /// order; the queue closes when the link goes down.
    async fn subscribe(
        &self,
        characteristic: Characteristic,
    ) -> Result<mpsc::Receiver<Notification>, ConnectionError>;

    async fn unsubscribe(&self, characteristic: Characteristic) -> Result<(), ConnectionError>;

    async fn write_command(
        &self,
        characteristic: Characteristic,
        bytes: &[u8],
        require_ack: bool,
    ) -> Result<(), WriteCommandError>;

    async fn read_characteristic(
        &self,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, ConnectionError>;

    async fn disconnect(&self) -> Result<(), ConnectionError>;

    fn is_connected(&self) -> bool;
}
