use std::fmt;
use serde::{Deserialize, Serialize};

/// Stable device address plus the small index used in outbound topics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorIdentity {
    address: String,
    index: u32,
}

impl SensorIdentity {
    pub fn new(address: impl Into<String>, index: u32) -> Self {
        Self {
            address: address.into(),
            index,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for SensorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sensor {} ({})", self.index, self.address)
    }
}
