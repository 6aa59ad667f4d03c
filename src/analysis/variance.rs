use std::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Canonical order, also the tie-break order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Axis with the greatest population variance over one full window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisClassification {
    pub axis: Axis,
    /// Variances in x, y, z order
    pub variances: [f64; 3],
}

/// Population variance (denominator = sample count).
pub fn population_variance(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    samples
        .iter()
        .map(|&s| {
            let d = s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// Tumbling-window classifier over one sensor's primary axis triple.
///
/// Samples are buffered per axis until every axis holds `window_size` of
/// them, then the window is classified and emptied. Nothing carries over
/// between windows.
#[derive(Debug)]
pub struct WindowedVarianceAnalyzer {
    window_size: usize,
    buffers: [Vec<f32>; 3],
}

impl WindowedVarianceAnalyzer {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            buffers: [
                Vec::with_capacity(window_size),
                Vec::with_capacity(window_size),
                Vec::with_capacity(window_size),
            ],
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Samples currently buffered (equal for every axis).
    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn observe(&mut self, triple: [f32; 3]) -> Option<AxisClassification> {
        for (buffer, value) in self.buffers.iter_mut().zip(triple) {
            buffer.push(value);
        }

        if self.buffers.iter().any(|b| b.len() < self.window_size) {
            return None;
        }

        let variances = [
            population_variance(&self.buffers[0]),
            population_variance(&self.buffers[1]),
            population_variance(&self.buffers[2]),
        ];

        // Strictly greater wins, so equal variances keep the earlier axis.
        let best = (1..3).fold(0, |best, i| {
            if variances[i] > variances[best] { i } else { best }
        });

        for buffer in self.buffers.iter_mut() {
            buffer.clear();
        }

        Some(AxisClassification {
            axis: Axis::ALL[best],
            variances,
        })
    }

    /// Drops any partial window.
    pub fn reset(&mut self) {
        for buffer in self.buffers.iter_mut() {
            buffer.clear();
        }
    }
}
