use crate::error::DecodeError;
use super::{FieldKind, LayoutKind, Measurement};

fn le_word(raw: &[u8]) -> [u8; 4] {
    let mut word = [0u8; 4];
    word.copy_from_slice(raw);
    word
}

/// Decodes one notification record with the layout chosen for the session.
///
/// The record is either decoded whole or rejected: a length that differs from
/// the layout width is a `SizeMismatch`, a NaN or infinite float is a
/// `SchemaMismatch`, and so is a padding field with any non-zero byte. No
/// default values are ever produced.
pub fn decode(bytes: &[u8], layout: LayoutKind) -> Result<Measurement, DecodeError> {
    let spec = layout.spec();
    let expected = spec.width();
    if bytes.len() != expected {
        return Err(DecodeError::SizeMismatch {
            layout: spec.name,
            expected,
            actual: bytes.len(),
        });
    }

    let mut timestamp = 0u32;
    let mut values = Vec::with_capacity(spec.float_count());
    let mut offset = 0;

    for field in spec.fields {
        let raw = &bytes[offset..offset + field.width];
        match field.kind {
            FieldKind::Timestamp => timestamp = u32::from_le_bytes(le_word(raw)),
            FieldKind::Float => {
                let value = f32::from_le_bytes(le_word(raw));
                if !value.is_finite() {
                    return Err(DecodeError::SchemaMismatch {
                        layout: spec.name,
                        field: field.name,
                    });
                }
                values.push(value);
            }
            FieldKind::Padding => {
                if raw.iter().any(|b| *b != 0) {
                    return Err(DecodeError::SchemaMismatch {
                        layout: spec.name,
                        field: field.name,
                    });
                }
            }
        }
        offset += field.width;
    }

    Ok(Measurement::from_record(layout, timestamp, values))
}

/// Writes a measurement back into its wire record. Padding is zero-filled.
pub fn encode(measurement: &Measurement) -> Vec<u8> {
    let spec = measurement.layout.spec();
    let mut bytes = Vec::with_capacity(spec.width());
    let mut values = measurement.values().iter();

    for field in spec.fields {
        match field.kind {
            FieldKind::Timestamp => bytes.extend_from_slice(&measurement.timestamp.to_le_bytes()),
            FieldKind::Float => {
                let value = values.next().copied().unwrap_or_default();
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            FieldKind::Padding => bytes.extend(std::iter::repeat(0u8).take(field.width)),
        }
    }

    bytes
}
