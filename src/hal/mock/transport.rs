use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use crate::core::{LayoutKind, SensorIdentity};
use crate::error::{ConnectionError, WriteCommandError};
use crate::hal::{Characteristic, DeviceConnection, DeviceHandle, DeviceTransport, Notification};
use super::{MotionGenerator, SimulatedDevice};

/// How long a scan for an unknown address runs before giving up.
const ABSENT_SCAN: Duration = Duration::from_millis(20);

const NOTIFICATION_CAPACITY: usize = 256;

/// In-process stand-in for a BLE adapter.
pub struct SimulatedTransport {
    devices: Mutex<HashMap<String, SimulatedDevice>>,
    links: Mutex<HashMap<String, Arc<SimulatedConnection>>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            links: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_device(&self, address: impl Into<String>, device: SimulatedDevice) {
        self.devices.lock().unwrap().insert(address.into(), device);
    }

    /// Most recent link opened to `address`.
    pub fn connection(&self, address: &str) -> Option<Arc<SimulatedConnection>> {
        self.links.lock().unwrap().get(address).cloned()
    }

    fn device(&self, address: &str) -> Option<SimulatedDevice> {
        self.devices.lock().unwrap().get(address).cloned()
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceTransport for SimulatedTransport {
    fn transport_id(&self) -> &str {
        "simulated"
    }

    async fn discover(
        &self,
        identity: &SensorIdentity,
        timeout: Duration,
    ) -> Result<DeviceHandle, ConnectionError> {
        let address = identity.address().to_string();
        match self.device(&address) {
            Some(device) if device.discovery_delay <= timeout => {
                sleep(device.discovery_delay).await;
                Ok(DeviceHandle {
                    address,
                    name: Some(device.name),
                    transport_id: self.transport_id().to_string(),
                })
            }
            Some(_) => {
                sleep(timeout).await;
                Err(ConnectionError::DiscoveryTimeout {
                    address,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            None => {
                // Finishes well inside the discovery window so the caller sees NotFound
                sleep(ABSENT_SCAN.min(timeout / 4)).await;
                Err(ConnectionError::NotFound { address })
            }
        }
    }

    async fn connect(
        &self,
        handle: &DeviceHandle,
    ) -> Result<Arc<dyn DeviceConnection>, ConnectionError> {
        let device = self.device(&handle.address).ok_or_else(|| ConnectionError::NotFound {
            address: handle.address.clone(),
        })?;

        if let Some(reason) = &device.connect_error {
            return Err(ConnectionError::Connect {
                address: handle.address.clone(),
                reason: reason.clone(),
            });
        }

        let link = Arc::new(SimulatedConnection::new(handle.address.clone(), device));
        self.links
            .lock()
            .unwrap()
            .insert(handle.address.clone(), link.clone());
        Ok(link)
    }
}

#[derive(Default)]
struct LinkState {
    subscribers: HashMap<Characteristic, mpsc::Sender<Notification>>,
    generator: Option<JoinHandle<()>>,
    writes: Vec<(Characteristic, Vec<u8>)>,
}

/// Simulated open link. Tests use it to inject frames and drop the link.
pub struct SimulatedConnection {
    address: String,
    device: SimulatedDevice,
    connected: AtomicBool,
    state: Mutex<LinkState>,
}

impl SimulatedConnection {
    fn new(address: String, device: SimulatedDevice) -> Self {
        Self {
            address,
            device,
            connected: AtomicBool::new(true),
            state: Mutex::new(LinkState::default()),
        }
    }

    /// Pushes raw bytes to whichever payload characteristic is subscribed.
    pub async fn inject_frame(&self, bytes: Vec<u8>) -> bool {
        let sender = {
            let state = self.state.lock().unwrap();
            state
                .subscribers
                .iter()
                .find(|(c, _)| **c != Characteristic::Battery)
                .map(|(_, tx)| tx.clone())
        };
        match sender {
            Some(tx) => tx.send(bytes).await.is_ok(),
            None => false,
        }
    }

    /// Simulates the device going out of range.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.teardown();
    }

    /// Every command written so far, oldest first.
    pub fn writes(&self) -> Vec<(Characteristic, Vec<u8>)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn is_subscribed(&self, characteristic: Characteristic) -> bool {
        self.state.lock().unwrap().subscribers.contains_key(&characteristic)
    }

    fn teardown(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(generator) = state.generator.take() {
            generator.abort();
        }
        state.subscribers.clear();
    }

    fn link_error(&self, reason: &str) -> ConnectionError {
        ConnectionError::Link {
            address: self.address.clone(),
            reason: reason.to_string(),
        }
    }

    fn start_generator(&self) {
        let mut state = self.state.lock().unwrap();
        let target = [Characteristic::ShortPayload, Characteristic::MediumPayload]
            .into_iter()
            .find_map(|c| state.subscribers.get(&c).map(|tx| (c, tx.clone())));

        let Some((characteristic, tx)) = target else {
            return;
        };
        let layout = match characteristic {
            Characteristic::MediumPayload => LayoutKind::Medium,
            _ => LayoutKind::Short,
        };

        let period = self.device.frame_period;
        let mut generator = MotionGenerator::new(layout, self.device.dominant_axis, period);

        if let Some(previous) = state.generator.take() {
            previous.abort();
        }
        state.generator = Some(tokio::spawn(async move {
            loop {
                sleep(period).await;
                if tx.send(generator.next_frame()).await.is_err() {
                    break;
                }
            }
        }));
    }
}

#[async_trait]
impl DeviceConnection for SimulatedConnection {
    async fn subscribe(
        &self,
        characteristic: Characteristic,
    ) -> Result<mpsc::Receiver<Notification>, ConnectionError> {
        if !self.is_connected() {
            return Err(self.link_error("subscribe on closed link"));
        }
        let (tx, rx) = mpsc::channel(NOTIFICATION_CAPACITY);
        self.state.lock().unwrap().subscribers.insert(characteristic, tx);
        Ok(rx)
    }

    async fn unsubscribe(&self, characteristic: Characteristic) -> Result<(), ConnectionError> {
        self.state.lock().unwrap().subscribers.remove(&characteristic);
        Ok(())
    }

    async fn write_command(
        &self,
        characteristic: Characteristic,
        bytes: &[u8],
        _require_ack: bool,
    ) -> Result<(), WriteCommandError> {
        if !self.is_connected() {
            return Err(WriteCommandError {
                characteristic: characteristic.name(),
                reason: "link closed".to_string(),
            });
        }

        self.state
            .lock()
            .unwrap()
            .writes
            .push((characteristic, bytes.to_vec()));

        if characteristic != Characteristic::Measurement {
            return Ok(());
        }

        match bytes {
            [0x01, 0x01, _] => {
                if self.device.reject_activation {
                    return Err(WriteCommandError {
                        characteristic: characteristic.name(),
                        reason: "activation rejected by device".to_string(),
                    });
                }
                if self.device.generate_frames {
                    self.start_generator();
                }
            }
            [0x01, 0x00, _] => {
                if let Some(generator) = self.state.lock().unwrap().generator.take() {
                    generator.abort();
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn read_characteristic(
        &self,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, ConnectionError> {
        if !self.is_connected() {
            return Err(self.link_error("read on closed link"));
        }
        match characteristic {
            Characteristic::Battery => {
                sleep(self.device.battery_delay).await;
                if !self.is_connected() {
                    return Err(self.link_error("link lost during read"));
                }
                Ok(self.device.battery.clone())
            }
            other => Err(self.link_error(&format!("{} is not readable", other.name()))),
        }
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        if self.device.hang_on_disconnect {
            std::future::pending::<()>().await;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.teardown();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
