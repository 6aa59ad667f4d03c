use serde::{Deserialize, Serialize};

/// Primitive stored in a record field. Every multi-byte kind is little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// u32 device clock
    Timestamp,
    /// IEEE-754 f32
    Float,
    /// Must be zero on decode, written as zeros on encode
    Padding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub width: usize,
}

const fn timestamp() -> FieldSpec {
    FieldSpec { name: "timestamp", kind: FieldKind::Timestamp, width: 4 }
}

const fn float(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Float, width: 4 }
}

const fn padding(width: usize) -> FieldSpec {
    FieldSpec { name: "padding", kind: FieldKind::Padding, width }
}

/// Named, fixed-size binary record schema.
#[derive(Debug, PartialEq, Eq)]
pub struct PayloadLayout {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

/// 20-byte short payload: one vector quantity.
pub static SHORT: PayloadLayout = PayloadLayout {
    name: "short",
    fields: &[timestamp(), float("x"), float("y"), float("z"), padding(4)],
};

/// 40-byte medium payload: acceleration, rate of turn and a third triple.
pub static MEDIUM: PayloadLayout = PayloadLayout {
    name: "medium",
    fields: &[
        timestamp(),
        float("acc_x"),
        float("acc_y"),
        float("acc_z"),
        float("gyro_x"),
        float("gyro_y"),
        float("gyro_z"),
        float("extra_x"),
        float("extra_y"),
        float("extra_z"),
    ],
};

impl PayloadLayout {
    /// Total record width in bytes.
    pub fn width(&self) -> usize {
        self.fields.iter().map(|f| f.width).sum()
    }

    /// Float fields in wire order.
    pub fn float_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| f.kind == FieldKind::Float)
    }

    pub fn float_count(&self) -> usize {
        self.float_fields().count()
    }
}

/// Selects one of the supported layouts. Chosen before streaming, never changed mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    Short,
    Medium,
}

impl LayoutKind {
    pub fn spec(self) -> &'static PayloadLayout {
        match self {
            LayoutKind::Short => &SHORT,
            LayoutKind::Medium => &MEDIUM,
        }
    }

    pub fn width(self) -> usize {
        self.spec().width()
    }
}
