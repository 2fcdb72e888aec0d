//! Integration tests for retries through the public API

use airtable_kit::testing::MockTransport;
use airtable_kit::{Api, ApiConfig, ApiError, QueryOptions, RetryPolicy};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn api(mock: &Arc<MockTransport>, retry: RetryPolicy) -> Api {
    Api::with_transport(
        mock.clone(),
        ApiConfig::default()
            .with_requests_per_second(0)
            .with_retry(retry),
    )
    .unwrap()
}

fn record() -> serde_json::Value {
    json!({"id": "rec1", "createdTime": "2024-01-01T00:00:00.000Z", "fields": {"Name": "ok"}})
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(429, json!({"error": {"type": "RATE_LIMIT_REACHED", "message": "slow down"}}));
    mock.push_json(500, json!({"error": "SERVER_ERROR"}));
    mock.push_json(200, record());
    let policy = RetryPolicy::default()
        .with_max_attempts(3)
        .with_backoff_factor(Duration::from_millis(100));
    let api = api(&mock, policy);

    let start = Instant::now();
    let fetched = api.table("appX", "Tasks").get("rec1", QueryOptions::new()).await.unwrap();
    assert_eq!(fetched.id, "rec1");
    assert_eq!(mock.call_count(), 3);
    // 100ms then 200ms of backoff
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_attempts_run_out() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(429, json!({"error": {"type": "RATE_LIMIT_REACHED", "message": "slow down"}}));
    mock.push_json(500, json!({"error": "SERVER_ERROR"}));
    mock.push_json(200, record());
    let api = api(&mock, RetryPolicy::default().with_max_attempts(2));

    let err = api
        .table("appX", "Tasks")
        .get("rec1", QueryOptions::new())
        .await
        .unwrap_err();
    match &err {
        ApiError::RetryExhausted { attempts, last } => {
            assert_eq!(*attempts, 2);
            assert_eq!(last.status(), Some(500));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(err.status(), Some(500));
    assert_eq!(mock.call_count(), 2);
    assert_eq!(mock.pending(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_client_errors_fail_immediately() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(404, json!({"error": "NOT_FOUND"}));
    let api = api(&mock, RetryPolicy::default());

    let err = api
        .table("appX", "Tasks")
        .get("recMissing", QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 404, .. }));
    assert_eq!(err.service_message(), Some("NOT_FOUND"));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_are_retried_when_enabled() {
    let mock = Arc::new(MockTransport::new());
    mock.push_timeout();
    mock.push_network_error();
    mock.push_json(200, record());
    let retrying = api(&mock, RetryPolicy::default().with_max_attempts(3));

    let fetched = retrying.table("appX", "Tasks").get("rec1", QueryOptions::new()).await;
    assert!(fetched.is_ok());
    assert_eq!(mock.call_count(), 3);

    let mock = Arc::new(MockTransport::new());
    mock.push_timeout();
    let strict = api(&mock, RetryPolicy::default().with_retry_timeouts(false));
    let err = strict
        .table("appX", "Tasks")
        .get("rec1", QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Timeout(_)));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_policy_waits_longer_on_429() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(429, json!({"error": {"type": "RATE_LIMIT_REACHED", "message": "slow down"}}));
    mock.push_json(200, record());
    let policy = RetryPolicy::rate_limit_aware().with_backoff_factor(Duration::from_millis(100));
    let api = api(&mock, policy);

    let start = Instant::now();
    api.table("appX", "Tasks").get("rec1", QueryOptions::new()).await.unwrap();
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(100));
    assert!(waited <= Duration::from_millis(100) + Duration::from_secs(5));
}
