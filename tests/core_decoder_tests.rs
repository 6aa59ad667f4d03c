use motionlink::core::{decode, encode, LayoutKind, Measurement};
use motionlink::DecodeError;

fn short_record(timestamp: u32, xyz: [f32; 3]) -> Vec<u8> {
    let mut bytes = timestamp.to_le_bytes().to_vec();
    for v in xyz {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes.extend_from_slice(&[0u8; 4]);
    bytes
}

#[test]
fn test_short_round_trip() {
    let bytes = short_record(123_456, [0.25, -1.5, 9.81]);
    assert_eq!(bytes.len(), 20);

    let measurement = decode(&bytes, LayoutKind::Short).unwrap();
    assert_eq!(measurement.timestamp, 123_456);
    assert_eq!(measurement.values(), &[0.25, -1.5, 9.81]);
    assert_eq!(encode(&measurement), bytes);
}

#[test]
fn test_medium_round_trip() {
    let values: Vec<f32> = (0..9).map(|i| i as f32 * 0.5 - 2.0).collect();
    let measurement = Measurement::try_new(LayoutKind::Medium, u32::MAX, values.clone()).unwrap();

    let bytes = encode(&measurement);
    assert_eq!(bytes.len(), 40);

    let decoded = decode(&bytes, LayoutKind::Medium).unwrap();
    assert_eq!(decoded, measurement);
    assert_eq!(decoded.primary_triple(), [values[0], values[1], values[2]]);
}

#[test]
fn test_wrong_length_is_size_mismatch() {
    let bytes = short_record(1, [1.0, 2.0, 3.0]);

    let err = decode(&bytes[..19], LayoutKind::Short).unwrap_err();
    assert_eq!(err, DecodeError::SizeMismatch { layout: "short", expected: 20, actual: 19 });

    // A valid short record is not a medium one
    let err = decode(&bytes, LayoutKind::Medium).unwrap_err();
    assert_eq!(err, DecodeError::SizeMismatch { layout: "medium", expected: 40, actual: 20 });
}

#[test]
fn test_non_finite_value_is_rejected() {
    let bytes = short_record(1, [1.0, f32::NAN, 3.0]);
    let err = decode(&bytes, LayoutKind::Short).unwrap_err();
    assert_eq!(err, DecodeError::SchemaMismatch { layout: "short", field: "y" });
}

#[test]
fn test_padding_with_content_is_rejected() {
    let mut bytes = short_record(7, [1.0, 2.0, 3.0]);
    bytes[16..].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

    let err = decode(&bytes, LayoutKind::Short).unwrap_err();
    assert_eq!(
        err,
        DecodeError::SchemaMismatch { layout: "short", field: "padding" }
    );
}

#[test]
fn test_accepted_short_record_reencodes_to_same_bytes() {
    let bytes = short_record(0xfffe_0001, [-0.0, 1.0e-38, 12345.678]);

    let measurement = decode(&bytes, LayoutKind::Short).unwrap();
    assert_eq!(encode(&measurement), bytes);
}

#[test]
fn test_try_new_checks_value_count() {
    assert!(Measurement::try_new(LayoutKind::Short, 0, vec![1.0, 2.0]).is_none());
    assert!(Measurement::try_new(LayoutKind::Medium, 0, vec![0.0; 3]).is_none());
}
