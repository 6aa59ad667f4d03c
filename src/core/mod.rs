pub mod decoder;
pub mod identity;
pub mod layout;
pub mod measurement;
pub mod mode;

pub use decoder::{decode, encode};
pub use identity::SensorIdentity;
pub use layout::{FieldKind, FieldSpec, LayoutKind, PayloadLayout};
pub use measurement::Measurement;
pub use mode::MeasurementMode;
