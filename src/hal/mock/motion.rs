use std::f32::consts::PI;
use std::time::Duration;
use crate::analysis::Axis;
use crate::core::{encode, LayoutKind, Measurement};

/// Behaviour of one simulated sensor.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub name: String,
    /// How long discovery takes to see the device
    pub discovery_delay: Duration,
    pub connect_error: Option<String>,
    pub reject_activation: bool,
    /// Emit synthetic frames once streaming is activated
    pub generate_frames: bool,
    pub frame_period: Duration,
    /// Axis that carries most of the synthetic motion
    pub dominant_axis: Axis,
    pub battery: Vec<u8>,
    pub battery_delay: Duration,
    /// `disconnect` never completes
    pub hang_on_disconnect: bool,
}

impl SimulatedDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            discovery_delay: Duration::from_millis(5),
            connect_error: None,
            reject_activation: false,
            generate_frames: true,
            frame_period: Duration::from_millis(20),
            dominant_axis: Axis::Y,
            battery: vec![87, 0],
            battery_delay: Duration::from_millis(2),
            hang_on_disconnect: false,
        }
    }

    pub fn with_discovery_delay(mut self, delay: Duration) -> Self {
        self.discovery_delay = delay;
        self
    }

    pub fn with_connect_error(mut self, reason: impl Into<String>) -> Self {
        self.connect_error = Some(reason.into());
        self
    }

    pub fn rejecting_activation(mut self) -> Self {
        self.reject_activation = true;
        self
    }

    /// Only frames pushed with `inject_frame` are delivered.
    pub fn silent(mut self) -> Self {
        self.generate_frames = false;
        self
    }

    pub fn with_frame_period(mut self, period: Duration) -> Self {
        self.frame_period = period;
        self
    }

    pub fn with_dominant_axis(mut self, axis: Axis) -> Self {
        self.dominant_axis = axis;
        self
    }

    pub fn with_battery(mut self, payload: Vec<u8>) -> Self {
        self.battery = payload;
        self
    }

    pub fn with_battery_delay(mut self, delay: Duration) -> Self {
        self.battery_delay = delay;
        self
    }

    pub fn hanging_on_disconnect(mut self) -> Self {
        self.hang_on_disconnect = true;
        self
    }
}

/// Deterministic motion generator producing wire records.
#[derive(Debug)]
pub struct MotionGenerator {
    layout: LayoutKind,
    dominant_axis: Axis,
    period_us: u32,
    phase: f32,
    frame_counter: u32,
}

impl MotionGenerator {
    pub fn new(layout: LayoutKind, dominant_axis: Axis, period: Duration) -> Self {
        Self {
            layout,
            dominant_axis,
            period_us: period.as_micros() as u32,
            phase: 0.0,
            frame_counter: 0,
        }
    }

    fn amplitude(&self, axis: usize) -> f32 {
        if Axis::ALL[axis] == self.dominant_axis {
            2.0
        } else {
            0.1 * (axis + 1) as f32
        }
    }

    /// Next record as the device would send it.
    pub fn next_frame(&mut self) -> Vec<u8> {
        let count = self.layout.spec().float_count();
        let values = (0..count)
            .map(|i| {
                let axis = i % 3;
                let group = (i / 3) as f32;
                self.amplitude(axis) * (self.phase + axis as f32 + group).sin()
            })
            .collect();

        let timestamp = self.frame_counter.wrapping_mul(self.period_us);
        self.frame_counter = self.frame_counter.wrapping_add(1);
        self.phase += 0.7;
        if self.phase > 2.0 * PI {
            self.phase -= 2.0 * PI;
        }

        match Measurement::try_new(self.layout, timestamp, values) {
            Some(m) => encode(&m),
            None => Vec::new(),
        }
    }
}
