use serde::{Deserialize, Serialize};
use super::LayoutKind;

/// Device-side measurement mode, sent as the last byte of the activation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementMode {
    HighFidelityWithMag,
    ExtendedQuaternion,
    CompleteQuaternion,
    OrientationEuler,
    OrientationQuaternion,
    FreeAcceleration,
    ExtendedEuler,
    CompleteEuler,
    HighFidelity,
    DeltaQuantitiesWithMag,
    DeltaQuantities,
    RateQuantitiesWithMag,
    RateQuantities,
    CustomMode1,
    CustomMode2,
    CustomMode3,
    CustomMode4,
    CustomMode5,
}

impl MeasurementMode {
    pub fn code(self) -> u8 {
        use MeasurementMode::*;
        match self {
            HighFidelityWithMag => 0x01,
            ExtendedQuaternion => 0x02,
            CompleteQuaternion => 0x03,
            OrientationEuler => 0x04,
            OrientationQuaternion => 0x05,
            FreeAcceleration => 0x06,
            ExtendedEuler => 0x07,
            CompleteEuler => 0x10,
            HighFidelity => 0x11,
            DeltaQuantitiesWithMag => 0x12,
            DeltaQuantities => 0x13,
            RateQuantitiesWithMag => 0x14,
            RateQuantities => 0x15,
            CustomMode1 => 0x16,
            CustomMode2 => 0x17,
            CustomMode3 => 0x18,
            CustomMode4 => 0x19,
            CustomMode5 => 0x1A,
        }
    }

    /// Layout the device emits in this mode, if this crate knows how to decode it.
    pub fn default_layout(self) -> Option<LayoutKind> {
        match self {
            MeasurementMode::FreeAcceleration | MeasurementMode::RateQuantities => {
                Some(LayoutKind::Short)
            }
            MeasurementMode::HighFidelity => Some(LayoutKind::Medium),
            _ => None,
        }
    }

    /// `[enable, start, mode]` written to the measurement characteristic.
    pub fn start_command(self) -> [u8; 3] {
        [0x01, 0x01, self.code()]
    }

    pub fn stop_command(self) -> [u8; 3] {
        [0x01, 0x00, self.code()]
    }
}

impl Default for MeasurementMode {
    fn default() -> Self {
        MeasurementMode::FreeAcceleration
    }
}
