use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Lock-free counters for one sensor session.
pub struct SessionMetrics {
    sensor: u32,
    notifications: AtomicU64,
    decoded: AtomicU64,
    decode_errors: AtomicU64,
    classifications: AtomicU64,
    forward_errors: AtomicU64,
    total_handling_us: AtomicU64,
    handling_samples: AtomicU64,
}

impl SessionMetrics {
    pub fn new(sensor: u32) -> Self {
        Self {
            sensor,
            notifications: AtomicU64::new(0),
            decoded: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            classifications: AtomicU64::new(0),
            forward_errors: AtomicU64::new(0),
            total_handling_us: AtomicU64::new(0),
            handling_samples: AtomicU64::new(0),
        }
    }

    pub fn sensor(&self) -> u32 {
        self.sensor
    }

    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    pub fn decoded(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    pub fn classifications(&self) -> u64 {
        self.classifications.load(Ordering::Relaxed)
    }

    pub fn forward_errors(&self) -> u64 {
        self.forward_errors.load(Ordering::Relaxed)
    }

    pub fn record_notification(&self) -> Instant {
        self.notifications.fetch_add(1, Ordering::Relaxed);
        Instant::now()
    }

    pub fn record_decoded(&self) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classification(&self) {
        self.classifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward_error(&self) {
        self.forward_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish_handling(&self, start: Instant) {
        let elapsed_us = start.elapsed().as_micros() as u64;
        self.total_handling_us.fetch_add(elapsed_us, Ordering::Relaxed);
        self.handling_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_handling_us(&self) -> u64 {
        let samples = self.handling_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_handling_us.load(Ordering::Relaxed) / samples
    }
}
