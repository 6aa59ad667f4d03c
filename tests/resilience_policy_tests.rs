use motionlink::resilience::RetryPolicy;
use std::time::Duration;

#[test]
fn test_default_is_never() {
    assert_eq!(RetryPolicy::default(), RetryPolicy::Never);
}

#[test]
fn test_fixed_policy() {
    let policy = RetryPolicy::Fixed { delay_ms: 25, max_attempts: 3 };

    assert_eq!(policy.max_retries(), 3);
    assert_eq!(policy.delay_for(1), Some(Duration::from_millis(25)));
    assert_eq!(policy.delay_for(3), Some(Duration::from_millis(25)));
    assert_eq!(policy.delay_for(4), None);
    assert_eq!(policy.total_delay(), Duration::from_millis(75));
}

#[test]
fn test_exponential_doubles() {
    let policy = RetryPolicy::Exponential { base_ms: 10, max_ms: 1000, max_attempts: 3 };

    let delays: Vec<_> = (1..=3).filter_map(|r| policy.delay_for(r)).collect();
    assert_eq!(
        delays,
        vec![Duration::from_millis(10), Duration::from_millis(20), Duration::from_millis(40)]
    );
}
