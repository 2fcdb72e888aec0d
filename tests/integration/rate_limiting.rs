//! Integration tests for request spacing, run on a paused clock

use airtable_kit::testing::MockTransport;
use airtable_kit::{Api, ApiConfig, Fields, QueryOptions, RateLimiter};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_pages_are_spaced_by_the_limiter() {
    let mock = Arc::new(MockTransport::new());
    for page in 0..3 {
        mock.push_json(
            200,
            json!({"records": [{"id": format!("rec{page}"), "fields": {}}], "offset": format!("c{page}")}),
        );
    }
    mock.push_json(200, json!({"records": [{"id": "rec3", "fields": {}}]}));
    let api = Api::with_transport(mock.clone(), ApiConfig::default().with_requests_per_second(5)).unwrap();

    let start = Instant::now();
    let records = api.table("appX", "Tasks").all(QueryOptions::new()).await.unwrap();
    assert_eq!(records.len(), 4);
    // four pages, three gaps of 200ms
    assert!(start.elapsed() >= Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn test_batch_chunks_are_spaced() {
    let mock = Arc::new(MockTransport::new());
    for _ in 0..3 {
        mock.push_json(200, json!({"records": []}));
    }
    let api = Api::with_transport(mock.clone(), ApiConfig::default().with_requests_per_second(5)).unwrap();
    let input: Vec<Fields> = (0..25).map(|_| Fields::new()).collect();

    let start = Instant::now();
    api.table("appX", "Tasks").batch_create(input, false).await.unwrap();
    assert_eq!(mock.call_count(), 3);
    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_zero_rate_never_waits() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"records": [], "offset": "c1"}));
    mock.push_json(200, json!({"records": []}));
    let api = Api::with_transport(mock.clone(), ApiConfig::default().with_requests_per_second(0)).unwrap();

    let start = Instant::now();
    api.table("appX", "Tasks").all(QueryOptions::new()).await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_budget() {
    let limiter = Arc::new(RateLimiter::per_second(5));
    let start = Instant::now();
    let handles: Vec<_> = (0..5)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.wait().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    assert!(start.elapsed() >= Duration::from_millis(800));
}
