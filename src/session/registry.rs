use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use crate::core::SensorIdentity;
use crate::hal::DeviceConnection;
use super::SessionState;

#[derive(Clone)]
struct RegistryEntry {
    identity: SensorIdentity,
    state: SessionState,
    connection: Option<Arc<dyn DeviceConnection>>,
}

/// Sensor index → identity, current state and open link.
///
/// Sessions write their own entry; the battery monitor and control listener
/// read it. The lock is never held across an await.
#[derive(Clone, Default)]
pub struct SensorRegistry {
    entries: Arc<Mutex<HashMap<u32, RegistryEntry>>>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, identity: SensorIdentity) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            identity.index(),
            RegistryEntry {
                identity,
                state: SessionState::Disconnected,
                connection: None,
            },
        );
    }

    pub fn set_state(&self, index: u32, state: SessionState) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&index) {
            entry.state = state;
        }
    }

    pub fn attach(&self, index: u32, connection: Arc<dyn DeviceConnection>) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&index) {
            entry.connection = Some(connection);
        }
    }

    pub fn detach(&self, index: u32) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&index) {
            entry.connection = None;
        }
    }

    pub fn state(&self, index: u32) -> Option<SessionState> {
        self.entries
            .lock()
            .unwrap()
            .get(&index)
            .map(|entry| entry.state.clone())
    }

    pub fn identity(&self, index: u32) -> Option<SensorIdentity> {
        self.entries
            .lock()
            .unwrap()
            .get(&index)
            .map(|entry| entry.identity.clone())
    }

    /// The open link for `index`, only while the session is connected or streaming.
    pub fn linked_connection(&self, index: u32) -> Option<Arc<dyn DeviceConnection>> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&index)
            .filter(|entry| entry.state.is_linked())
            .and_then(|entry| entry.connection.clone())
    }

    /// All sensors ordered by index.
    pub fn snapshot(&self) -> Vec<(SensorIdentity, SessionState)> {
        let entries = self.entries.lock().unwrap();
        let mut all: Vec<_> = entries
            .values()
            .map(|entry| (entry.identity.clone(), entry.state.clone()))
            .collect();
        all.sort_by_key(|(identity, _)| identity.index());
        all
    }

    pub fn indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.entries.lock().unwrap().keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    pub fn count_where(&self, predicate: impl Fn(&SessionState) -> bool) -> usize {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|entry| predicate(&entry.state))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
