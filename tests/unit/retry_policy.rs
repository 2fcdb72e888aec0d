//! Unit tests for retry classification and backoff

use airtable_kit::client::{BackoffMode, FailureKind, Method, RetryPolicy};
use airtable_kit::ApiError;
use std::time::Duration;

fn http(status: u16) -> ApiError {
    ApiError::Http {
        status,
        method: Method::Get,
        url: "https://api.airtable.com/v0/appX/Tasks".into(),
        message: None,
    }
}

#[test]
fn test_default_policy() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 6);
    assert_eq!(policy.backoff_factor, Duration::from_millis(300));
    for status in [429, 500, 502, 503, 504] {
        assert!(policy.is_retryable(&http(status)), "{status} should retry");
    }
    for status in [400, 401, 403, 404, 422] {
        assert!(!policy.is_retryable(&http(status)), "{status} should not retry");
    }
    assert!(policy.is_retryable(&ApiError::Timeout("read".into())));
    assert!(!policy.is_retryable(&ApiError::InvalidResponse("bad".into())));
}

#[test]
fn test_backoff_doubles() {
    let policy = RetryPolicy::default().with_backoff_factor(Duration::from_millis(100));
    let err = http(500);
    assert_eq!(policy.backoff_for(1, &err), Duration::from_millis(100));
    assert_eq!(policy.backoff_for(2, &err), Duration::from_millis(200));
    assert_eq!(policy.backoff_for(4, &err), Duration::from_millis(800));
}

#[test]
fn test_rate_limit_variant_always_retries_429() {
    let policy = RetryPolicy::rate_limit_aware().with_retryable_statuses([500]);
    assert_eq!(policy.mode, BackoffMode::RateLimitJitter);
    assert!(policy.is_retryable(&http(429)));
    assert!(!policy.is_retryable(&http(502)));

    let plain = RetryPolicy::default().with_retryable_statuses([500]);
    assert!(!plain.is_retryable(&http(429)));
}

#[test]
fn test_rate_limit_jitter_is_bounded() {
    let policy = RetryPolicy::rate_limit_aware().with_backoff_factor(Duration::from_millis(100));
    for _ in 0..20 {
        let delay = policy.backoff_for(2, &http(429));
        assert!(delay >= Duration::from_millis(200));
        assert!(delay <= Duration::from_millis(200) + Duration::from_secs(10));
    }
    assert_eq!(policy.backoff_for(2, &http(503)), Duration::from_millis(200));
}

#[test]
fn test_none_policy_never_retries() {
    let policy = RetryPolicy::none();
    assert_eq!(policy.max_attempts, 1);
    assert!(!policy.is_retryable(&http(429)));
    assert!(!policy.is_retryable(&ApiError::Timeout("read".into())));
}

#[test]
fn test_failure_kinds() {
    assert_eq!(FailureKind::classify(&http(429)), FailureKind::RateLimit);
    assert_eq!(FailureKind::classify(&http(503)), FailureKind::ServerError(503));
    assert_eq!(FailureKind::classify(&http(404)), FailureKind::NotFound);
    assert_eq!(
        FailureKind::classify(&ApiError::Timeout("x".into())),
        FailureKind::Timeout
    );
}
