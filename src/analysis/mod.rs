pub mod variance;

pub use variance::{population_variance, Axis, AxisClassification, WindowedVarianceAnalyzer};
