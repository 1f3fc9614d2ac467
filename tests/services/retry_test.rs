use std::time::Duration;

use echoscribe::application::services::RetryPolicy;

#[test]
fn given_default_policy_when_computing_backoff_then_doubles_from_500ms() {
    let policy = RetryPolicy::default();

    assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
    assert_eq!(policy.backoff_for(2), Duration::from_millis(1000));
    assert_eq!(policy.backoff_for(3), Duration::from_millis(2000));
}

#[test]
fn given_large_attempt_when_computing_backoff_then_capped_at_max_delay() {
    let policy = RetryPolicy::default();

    assert_eq!(policy.backoff_for(20), policy.max_delay);
}

#[test]
fn given_jitter_ratio_when_computing_delay_then_within_expected_range() {
    let policy = RetryPolicy::default();

    for attempt in 1..=3 {
        let backoff = policy.backoff_for(attempt);
        for _ in 0..50 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= backoff);
            assert!(delay <= backoff + backoff.mul_f64(policy.jitter_ratio));
        }
    }
}

#[test]
fn given_zero_jitter_when_computing_delay_then_deterministic() {
    let policy = RetryPolicy {
        jitter_ratio: 0.0,
        ..RetryPolicy::default()
    };

    assert_eq!(policy.delay_for(2), policy.backoff_for(2));
}

#[test]
fn given_default_budget_when_counting_attempts_then_three_total() {
    let policy = RetryPolicy::default();

    assert!(policy.has_attempts_left(1));
    assert!(policy.has_attempts_left(2));
    assert!(!policy.has_attempts_left(3));
}
