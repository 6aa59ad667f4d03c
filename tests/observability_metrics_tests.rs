use motionlink::observability::SessionMetrics;
use std::sync::Arc;

#[test]
fn test_metrics_creation() {
    let metrics = SessionMetrics::new(3);
    assert_eq!(metrics.sensor(), 3);
    assert_eq!(metrics.notifications(), 0);
    assert_eq!(metrics.decode_errors(), 0);
}

#[test]
fn test_metrics_increment() {
    let metrics = Arc::new(SessionMetrics::new(1));

    metrics.record_notification();
    metrics.record_notification();
    metrics.record_decoded();
    metrics.record_decode_error();
    metrics.record_classification();

    assert_eq!(metrics.notifications(), 2);
    assert_eq!(metrics.decoded(), 1);
    assert_eq!(metrics.decode_errors(), 1);
    assert_eq!(metrics.classifications(), 1);
}

#[tokio::test]
async fn test_metrics_handling_time() {
    let metrics = SessionMetrics::new(1);

    let start = metrics.record_notification();
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    metrics.finish_handling(start);

    assert!(metrics.avg_handling_us() >= 10_000);
}
