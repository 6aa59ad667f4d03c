use motionlink::config::Endpoint;
use motionlink::core::{LayoutKind, MeasurementMode};
use motionlink::resilience::RetryPolicy;
use motionlink::AcquisitionConfig;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_defaults() {
    let config = AcquisitionConfig::default();

    assert_eq!(config.sink, Endpoint::new("127.0.0.1", 5555));
    assert_eq!(config.control.port, 5556);
    assert_eq!(config.mode, MeasurementMode::FreeAcceleration);
    assert_eq!(config.window_size, 10);
    assert_eq!(config.discovery_timeout(), Duration::from_secs(20));
    assert_eq!(config.battery_interval(), Duration::from_secs(300));
    assert_eq!(config.retry, RetryPolicy::Never);
    assert_eq!(config.resolved_layout().unwrap(), LayoutKind::Short);
}

#[test]
fn test_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("acquisition.json");
    fs::write(
        &path,
        r#"{
            "sink": {"host": "192.168.1.20", "port": 9000},
            "sensors": ["D4:22:CD:00:36:80", "D4:22:CD:00:36:04"],
            "mode": "high_fidelity",
            "window_size": 25,
            "min_connected": 2,
            "retry": {"strategy": "exponential", "base_ms": 200, "max_ms": 2000, "max_attempts": 3}
        }"#,
    )
    .unwrap();

    let config = assert_ok!(AcquisitionConfig::load(&path));
    assert_ok!(config.validate());

    assert_eq!(config.sink.host, "192.168.1.20");
    assert_eq!(config.control, Endpoint::new("0.0.0.0", 5556));
    assert_eq!(config.window_size, 25);
    assert_eq!(config.resolved_layout().unwrap(), LayoutKind::Medium);

    let identities = config.identities();
    assert_eq!(identities.len(), 2);
    assert_eq!(identities[0].index(), 1);
    assert_eq!(identities[1].address(), "D4:22:CD:00:36:04");

    let settings = config.session_settings().unwrap();
    assert_eq!(settings.mode, MeasurementMode::HighFidelity);
    assert_eq!(settings.window_size, 25);
    assert_eq!(settings.command_timeout, Duration::from_millis(5000));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    assert_err!(AcquisitionConfig::load(dir.path().join("absent.json")));
}

#[test]
fn test_validate_rejects_bad_values() {
    let valid = AcquisitionConfig {
        sensors: vec!["D4:22:CD:00:36:80".to_string()],
        ..AcquisitionConfig::default()
    };
    assert_ok!(valid.validate());

    let no_sensors = AcquisitionConfig::default();
    assert_err!(no_sensors.validate());

    let zero_window = AcquisitionConfig { window_size: 0, ..valid.clone() };
    assert_err!(zero_window.validate());

    let quorum = AcquisitionConfig { min_connected: 2, ..valid.clone() };
    assert_err!(quorum.validate());

    let zero_interval = AcquisitionConfig { battery_interval_secs: 0, ..valid.clone() };
    assert_err!(zero_interval.validate());

    let zero_battery_timeout = AcquisitionConfig { battery_timeout_ms: 0, ..valid.clone() };
    assert_err!(zero_battery_timeout.validate());

    let zero_command_timeout = AcquisitionConfig { command_timeout_ms: 0, ..valid.clone() };
    assert_err!(zero_command_timeout.validate());

    let parsed = AcquisitionConfig::from_json(r#"{"sensors":["a"],"battery_interval_secs":0}"#).unwrap();
    assert_err!(parsed.validate());

    let unknown_layout = AcquisitionConfig {
        mode: MeasurementMode::OrientationQuaternion,
        ..valid.clone()
    };
    assert_err!(unknown_layout.validate());

    let overridden = AcquisitionConfig {
        mode: MeasurementMode::OrientationQuaternion,
        layout: Some(LayoutKind::Short),
        ..valid
    };
    assert_ok!(overridden.validate());
}

#[test]
fn test_layout_override_wins() {
    let config = AcquisitionConfig::from_json(
        r#"{"sensors": ["a"], "mode": "rate_quantities", "layout": "medium"}"#,
    )
    .unwrap();
    assert_eq!(config.resolved_layout().unwrap(), LayoutKind::Medium);
}

#[test]
fn test_unknown_mode_fails_to_parse() {
    assert_err!(AcquisitionConfig::from_json(r#"{"mode": "warp_speed"}"#));
}
