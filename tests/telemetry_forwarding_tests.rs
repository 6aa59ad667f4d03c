use motionlink::core::{LayoutKind, MeasurementMode, SensorIdentity};
use motionlink::hal::mock::{SimulatedDevice, SimulatedTransport};
use motionlink::resilience::RetryPolicy;
use motionlink::session::{SensorConnectionManager, SessionSettings, SessionState};
use motionlink::telemetry::{
    ControlMessage, MemorySink, OutboundMessage, TelemetryForwarder, TelemetrySink, TelemetryValue,
    UdpControlSource, UdpSink,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};

fn fast_device(name: &str) -> SimulatedDevice {
    SimulatedDevice::new(name).with_frame_period(Duration::from_millis(2))
}

fn settings(layout: LayoutKind, mode: MeasurementMode) -> SessionSettings {
    SessionSettings {
        mode,
        layout,
        discovery_timeout: Duration::from_millis(300),
        command_timeout: Duration::from_millis(300),
        ..SessionSettings::default()
    }
}

fn two_sensor_transport() -> (Arc<SimulatedTransport>, Vec<SensorIdentity>) {
    let transport = Arc::new(SimulatedTransport::new());
    transport.add_device("D4:22:CD:00:03:01", fast_device("a"));
    transport.add_device("D4:22:CD:00:03:02", fast_device("b"));
    let sensors = vec![
        SensorIdentity::new("D4:22:CD:00:03:01", 1),
        SensorIdentity::new("D4:22:CD:00:03:02", 2),
    ];
    (transport, sensors)
}

/// Every measurement batch must appear contiguously, whatever the sensor.
fn assert_batches_contiguous(messages: &[OutboundMessage], fields: &[&str]) {
    let mut starts = 0;
    for (i, message) in messages.iter().enumerate() {
        let Some(rest) = message.topic.strip_prefix("/sensor_") else {
            continue;
        };
        let Some((sensor, field)) = rest.split_once('/') else {
            continue;
        };
        if field != fields[0] || i + fields.len() > messages.len() {
            continue;
        }
        starts += 1;
        for (offset, expected) in fields.iter().enumerate() {
            assert_eq!(
                messages[i + offset].topic,
                format!("/sensor_{}/{}", sensor, expected),
                "batch starting at {} was interleaved",
                i
            );
        }
    }
    assert!(starts > 0, "no measurement batches were forwarded");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_never_interleave_a_measurement() {
    let (transport, sensors) = two_sensor_transport();
    let sink = MemorySink::new();
    let (forwarder, writer) = TelemetryForwarder::channel(1024);
    let writer = tokio::spawn(writer.run(Box::new(sink.clone())));

    let mut manager = SensorConnectionManager::new(
        sensors,
        settings(LayoutKind::Medium, MeasurementMode::HighFidelity),
        RetryPolicy::Never,
        transport,
        forwarder,
    );
    assert_eq!(manager.start_all().await.unwrap().connected_count(), 2);
    tokio::time::sleep(Duration::from_millis(150)).await;
    manager.shutdown(Duration::from_secs(1)).await;
    drop(manager);

    let stats = writer.await.unwrap();
    assert_eq!(stats.failures, 0);

    let messages = sink.messages();
    assert!(!sink.with_prefix("/sensor_1/acc/x").is_empty());
    assert!(!sink.with_prefix("/sensor_2/acc/x").is_empty());
    assert_batches_contiguous(
        &messages,
        &[
            "acc/x", "acc/y", "acc/z", "gyro/x", "gyro/y", "gyro/z", "extra/x", "extra/y",
            "extra/z", "timestamp",
        ],
    );
}

#[tokio::test]
async fn test_unreachable_sink_does_not_stop_sessions() {
    let (transport, sensors) = two_sensor_transport();
    let sink = MemorySink::new();
    sink.set_unreachable(true);
    let (forwarder, writer) = TelemetryForwarder::channel(1024);
    let writer = tokio::spawn(writer.run(Box::new(sink.clone())));

    let mut manager = SensorConnectionManager::new(
        sensors,
        settings(LayoutKind::Short, MeasurementMode::FreeAcceleration),
        RetryPolicy::Never,
        transport,
        forwarder,
    );
    manager.start_all().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let registry = manager.registry();
    assert_eq!(registry.state(1), Some(SessionState::Streaming));
    assert_eq!(registry.state(2), Some(SessionState::Streaming));

    let shutdown = manager.shutdown(Duration::from_secs(1)).await;
    assert_eq!(shutdown.clean_count(), 2);
    drop(manager);

    let stats = writer.await.unwrap();
    assert!(stats.failures > 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_full_queue_is_counted_not_fatal() {
    let (transport, sensors) = two_sensor_transport();
    // The writer is never run, so the queue fills after one batch
    let (forwarder, _writer) = TelemetryForwarder::channel(1);

    let mut manager = SensorConnectionManager::new(
        sensors,
        settings(LayoutKind::Short, MeasurementMode::FreeAcceleration),
        RetryPolicy::Never,
        transport,
        forwarder,
    );
    manager.start_all().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(manager.registry().state(1), Some(SessionState::Streaming));
    let snapshot = manager.monitor().collector().snapshot();
    let forward_errors: u64 = snapshot.iter().map(|s| s.forward_errors).sum();
    assert!(forward_errors > 0);

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_udp_sink_sends_json_datagrams() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    let sink = UdpSink::connect("127.0.0.1", port).await.unwrap();
    sink.send(&OutboundMessage::new("/sensor_1/x", TelemetryValue::Float(0.5)))
        .await
        .unwrap();

    let mut buf = [0u8; 512];
    let len = tokio::time::timeout(Duration::from_secs(2), receiver.recv(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();
    assert_eq!(value, serde_json::json!({"topic": "/sensor_1/x", "value": 0.5}));
}

#[tokio::test]
async fn test_udp_control_source_queues_messages() {
    let source = UdpControlSource::bind("127.0.0.1", 0).await.unwrap();
    let addr = source.local_addr().unwrap();
    let (inbox_tx, mut inbox_rx) = mpsc::channel(4);
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(source.run(inbox_tx, stop_rx));

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"not json", addr).await.unwrap();
    client
        .send_to(br#"{"address": "/batterystatus", "args": [2]}"#, addr)
        .await
        .unwrap();

    let message = tokio::time::timeout(Duration::from_secs(2), inbox_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        message,
        ControlMessage::new("/batterystatus", vec![serde_json::json!(2)])
    );

    stop_tx.send(true).unwrap();
    task.await.unwrap();
}
