use serde::{Deserialize, Serialize};
use crate::core::LayoutKind;

/// GATT characteristics the acquisition pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Characteristic {
    /// Measurement control, receives start/stop commands
    Measurement,
    /// 40-byte notifications
    MediumPayload,
    /// 20-byte notifications
    ShortPayload,
    /// Battery level and charging flag
    Battery,
}

impl Characteristic {
    pub fn uuid(self) -> &'static str {
        match self {
            Characteristic::Measurement => "15172001-4947-11e9-8646-d663bd873d93",
            Characteristic::MediumPayload => "15172003-4947-11e9-8646-d663bd873d93",
            Characteristic::ShortPayload => "15172004-4947-11e9-8646-d663bd873d93",
            Characteristic::Battery => "15173001-4947-11e9-8646-d663bd873d93",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Characteristic::Measurement => "measurement",
            Characteristic::MediumPayload => "medium-payload",
            Characteristic::ShortPayload => "short-payload",
            Characteristic::Battery => "battery",
        }
    }

    /// Notification characteristic that carries records of `layout`.
    pub fn for_layout(layout: LayoutKind) -> Self {
        match layout {
            LayoutKind::Short => Characteristic::ShortPayload,
            LayoutKind::Medium => Characteristic::MediumPayload,
        }
    }
}

/// Result of a successful discovery, passed to `connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle {
    pub address: String,
    pub name: Option<String>,
    pub transport_id: String,
}

/// Raw bytes of one notification, exactly as delivered by the transport.
pub type Notification = Vec<u8>;
