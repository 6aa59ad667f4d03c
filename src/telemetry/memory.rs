use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use crate::error::ForwardError;
use super::{OutboundMessage, TelemetrySink};

/// Sink that keeps every message in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
    unreachable: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Messages whose topic starts with `prefix`, in arrival order.
    pub fn with_prefix(&self, prefix: &str) -> Vec<OutboundMessage> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }

    /// While set, every send fails as if the receiver were gone.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl TelemetrySink for MemorySink {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ForwardError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ForwardError::Sink("memory sink marked unreachable".to_string()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}
