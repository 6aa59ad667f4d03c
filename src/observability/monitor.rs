use super::MetricsCollector;

pub struct AcquisitionMonitor {
    collector: MetricsCollector,
}

impl AcquisitionMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self) -> String {
        let snapshot = self.collector.snapshot();

        if snapshot.is_empty() {
            return "No sensors registered".to_string();
        }

        let mut report = String::from("=== Acquisition Metrics ===\n");

        for s in snapshot.iter() {
            report.push_str(&format!(
                "\n[sensor {}]\n  Notifications: {} ({} decoded, {} dropped)\n  Classifications: {}\n  Forward errors: {}\n  Avg handling: {}μs\n",
                s.sensor,
                s.notifications,
                s.decoded,
                s.decode_errors,
                s.classifications,
                s.forward_errors,
                s.avg_handling_us
            ));
        }

        report
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
