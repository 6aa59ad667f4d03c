pub mod motion;
pub mod transport;

pub use motion::{MotionGenerator, SimulatedDevice};
pub use transport::{SimulatedConnection, SimulatedTransport};
