use serde::Serialize;
use super::LayoutKind;

/// One decoded notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// Device-local clock, wraps at 2^32
    pub timestamp: u32,
    pub layout: LayoutKind,
    values: Vec<f32>,
}

impl Measurement {
    /// Builds a measurement from already-validated parts. Returns `None` when
    /// the value count does not match the layout's float fields.
    pub fn try_new(layout: LayoutKind, timestamp: u32, values: Vec<f32>) -> Option<Self> {
        if values.len() != layout.spec().float_count() {
            return None;
        }
        Some(Self {
            timestamp,
            layout,
            values,
        })
    }

    pub(crate) fn from_record(layout: LayoutKind, timestamp: u32, values: Vec<f32>) -> Self {
        Self {
            timestamp,
            layout,
            values,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// First three float fields: the acceleration or rate triple the variance
    /// analyzer looks at.
    pub fn primary_triple(&self) -> [f32; 3] {
        [self.values[0], self.values[1], self.values[2]]
    }

    /// `(field name, value)` pairs in wire order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.layout
            .spec()
            .float_fields()
            .zip(self.values.iter().copied())
            .map(|(field, value)| (field.name, value))
    }
}
