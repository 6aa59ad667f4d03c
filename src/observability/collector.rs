use std::collections::HashMap;
use std::sync::Arc;
use super::SessionMetrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sensor: u32,
    pub notifications: u64,
    pub decoded: u64,
    pub decode_errors: u64,
    pub classifications: u64,
    pub forward_errors: u64,
    pub avg_handling_us: u64,
}

#[derive(Clone, Default)]
pub struct MetricsCollector {
    metrics: HashMap<u32, Arc<SessionMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metrics: Arc<SessionMetrics>) {
        self.metrics.insert(metrics.sensor(), metrics);
    }

    pub fn get(&self, sensor: u32) -> Option<Arc<SessionMetrics>> {
        self.metrics.get(&sensor).cloned()
    }

    /// Current counters, ordered by sensor index.
    pub fn snapshot(&self) -> Vec<MetricsSnapshot> {
        let mut all: Vec<MetricsSnapshot> = self
            .metrics
            .values()
            .map(|m| MetricsSnapshot {
                sensor: m.sensor(),
                notifications: m.notifications(),
                decoded: m.decoded(),
                decode_errors: m.decode_errors(),
                classifications: m.classifications(),
                forward_errors: m.forward_errors(),
                avg_handling_us: m.avg_handling_us(),
            })
            .collect();
        all.sort_by_key(|s| s.sensor);
        all
    }
}
