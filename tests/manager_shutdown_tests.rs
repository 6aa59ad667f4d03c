use motionlink::core::SensorIdentity;
use motionlink::hal::mock::{SimulatedDevice, SimulatedTransport};
use motionlink::resilience::RetryPolicy;
use motionlink::session::{
    CloseReason, SensorConnectionManager, SessionSettings, SessionState, ShutdownOutcome,
    StartOutcome,
};
use motionlink::telemetry::{MemorySink, TelemetryForwarder};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn manager(devices: Vec<SimulatedDevice>, command_timeout: Duration) -> SensorConnectionManager {
    let settings = SessionSettings {
        discovery_timeout: Duration::from_millis(300),
        command_timeout,
        ..SessionSettings::default()
    };
    manager_with(devices, settings, RetryPolicy::Never)
}

fn manager_with(
    devices: Vec<SimulatedDevice>,
    settings: SessionSettings,
    retry: RetryPolicy,
) -> SensorConnectionManager {
    let transport = Arc::new(SimulatedTransport::new());
    let mut sensors = Vec::new();
    for (i, device) in devices.into_iter().enumerate() {
        let address = format!("D4:22:CD:00:01:0{}", i + 1);
        transport.add_device(address.clone(), device);
        sensors.push(SensorIdentity::new(address, i as u32 + 1));
    }

    let (forwarder, writer) = TelemetryForwarder::channel(1024);
    tokio::spawn(writer.run(Box::new(MemorySink::new())));

    SensorConnectionManager::new(sensors, settings, retry, transport, forwarder)
}

#[tokio::test]
async fn test_shutdown_while_streaming_is_clean() {
    let mut manager = manager(
        vec![SimulatedDevice::new("a"), SimulatedDevice::new("b")],
        Duration::from_millis(300),
    );
    let summary = manager.start_all().await.unwrap();
    assert_eq!(summary.connected_count(), 2);

    let mut signal = manager.shutdown_signal();
    let shutdown = manager.shutdown(Duration::from_secs(1)).await;

    assert_eq!(shutdown.clean_count(), 2);
    assert_eq!(shutdown.forced_count(), 0);
    assert!(*signal.borrow_and_update());

    let registry = manager.registry();
    for index in [1, 2] {
        assert_eq!(
            registry.state(index),
            Some(SessionState::Closed { reason: CloseReason::Requested })
        );
        assert!(registry.linked_connection(index).is_none());
    }
}

#[tokio::test]
async fn test_hanging_session_is_forced() {
    let mut manager = manager(
        vec![
            SimulatedDevice::new("a"),
            SimulatedDevice::new("b").hanging_on_disconnect(),
        ],
        Duration::from_secs(5),
    );
    manager.start_all().await.unwrap();

    let started = Instant::now();
    let shutdown = manager.shutdown(Duration::from_millis(300)).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(shutdown.outcome(1), Some(&ShutdownOutcome::Clean));
    assert_eq!(shutdown.outcome(2), Some(&ShutdownOutcome::Forced));
    assert_eq!(shutdown.forced_count(), 1);
    assert_eq!(
        manager.registry().state(2),
        Some(SessionState::Closed { reason: CloseReason::Forced })
    );
    assert!(shutdown.to_string().starts_with("1 clean / 1 forced"));
}

#[tokio::test]
async fn test_link_lost_before_shutdown_is_already_stopped() {
    let transport = Arc::new(SimulatedTransport::new());
    transport.add_device("D4:22:CD:00:02:01", SimulatedDevice::new("a").silent());
    let (forwarder, writer) = TelemetryForwarder::channel(16);
    tokio::spawn(writer.run(Box::new(MemorySink::new())));

    let mut manager = SensorConnectionManager::new(
        vec![SensorIdentity::new("D4:22:CD:00:02:01", 1)],
        SessionSettings::default(),
        RetryPolicy::Never,
        transport.clone(),
        forwarder,
    );
    manager.start_all().await.unwrap();

    transport.connection("D4:22:CD:00:02:01").unwrap().drop_link();
    let registry = manager.registry();
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry.state(1) == Some(SessionState::Streaming) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let shutdown = manager.shutdown(Duration::from_secs(1)).await;
    assert_eq!(
        shutdown.outcome(1),
        Some(&ShutdownOutcome::AlreadyStopped(SessionState::Closed {
            reason: CloseReason::LinkLost
        }))
    );
}

#[tokio::test]
async fn test_shutdown_without_start_is_empty() {
    let mut manager = manager(vec![SimulatedDevice::new("a")], Duration::from_millis(100));
    let shutdown = manager.shutdown(Duration::from_millis(100)).await;
    assert!(shutdown.entries.is_empty());
    assert!(manager.start_all().await.is_err());
}

#[tokio::test]
async fn test_shutdown_during_discovery_cancels_start() {
    let settings = SessionSettings {
        discovery_timeout: Duration::from_secs(10),
        command_timeout: Duration::from_millis(300),
        ..SessionSettings::default()
    };
    let mut manager = manager_with(
        vec![SimulatedDevice::new("slow").with_discovery_delay(Duration::from_secs(5))],
        settings,
        RetryPolicy::Never,
    );

    let trigger = manager.shutdown_trigger();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger();
    });

    let started = Instant::now();
    let summary = manager.start_all().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        summary.outcome(1),
        Some(StartOutcome::Failed { kind: "cancelled", .. })
    ));

    let shutdown = manager.shutdown(Duration::from_millis(500)).await;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(shutdown.outcome(1), Some(&ShutdownOutcome::Clean));
    assert_eq!(
        manager.registry().state(1),
        Some(SessionState::Closed { reason: CloseReason::Requested })
    );
    assert!(manager.registry().linked_connection(1).is_none());
}

#[tokio::test]
async fn test_shutdown_during_retry_backoff_stops_retrying() {
    let settings = SessionSettings {
        discovery_timeout: Duration::from_millis(300),
        command_timeout: Duration::from_millis(300),
        ..SessionSettings::default()
    };
    let mut manager = manager_with(
        vec![SimulatedDevice::new("broken").with_connect_error("refused")],
        settings,
        RetryPolicy::Fixed { delay_ms: 10_000, max_attempts: 5 },
    );

    let trigger = manager.shutdown_trigger();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.trigger();
    });

    let started = Instant::now();
    let summary = manager.start_all().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(summary.outcome(1), Some(StartOutcome::Failed { .. })));

    let shutdown = manager.shutdown(Duration::from_millis(500)).await;
    assert!(matches!(
        shutdown.outcome(1),
        Some(ShutdownOutcome::AlreadyStopped(SessionState::Failed { .. }))
    ));
    assert_eq!(shutdown.forced_count(), 0);
}
