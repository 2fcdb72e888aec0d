//! Integration tests for cursor pagination through the table facade

use airtable_kit::testing::MockTransport;
use airtable_kit::{Api, ApiConfig, ApiError, QueryOptions};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;

fn records(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| json!({"id": format!("{prefix}{i}"), "createdTime": "2024-01-01T00:00:00.000Z", "fields": {}}))
        .collect()
}

fn api(mock: &Arc<MockTransport>) -> Api {
    Api::with_transport(mock.clone(), ApiConfig::default().with_requests_per_second(0)).unwrap()
}

#[tokio::test]
async fn test_pages_are_followed_until_no_cursor() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"records": records("a", 2), "offset": "c1"}));
    mock.push_json(200, json!({"records": records("b", 2), "offset": "c2"}));
    mock.push_json(200, json!({"records": records("c", 1)}));
    let api = api(&mock);

    let all = api.table("appX", "Tasks").all(QueryOptions::new()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a0", "a1", "b0", "b1", "c0"]);

    let requests = mock.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].query_value("offset"), None);
    assert_eq!(requests[1].query_value("offset"), Some("c1"));
    assert_eq!(requests[2].query_value("offset"), Some("c2"));
    assert_eq!(mock.pending(), 0);
}

#[tokio::test]
async fn test_exhausted_paginator_makes_no_more_requests() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"records": records("a", 1)}));
    let api = api(&mock);

    let mut paginator = api.table("appX", "Tasks").iterate(QueryOptions::new());
    assert!(paginator.next_page().await.unwrap().is_some());
    assert!(paginator.is_exhausted());
    assert!(paginator.next_page().await.unwrap().is_none());
    assert!(paginator.next_page().await.unwrap().is_none());
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_max_records_truncates_last_page() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"records": records("a", 10), "offset": "c1"}));
    mock.push_json(200, json!({"records": records("b", 10), "offset": "c2"}));
    mock.push_json(200, json!({"records": records("c", 10), "offset": "c3"}));
    mock.push_json(200, json!({"records": records("d", 10)}));
    let api = api(&mock);

    let options = QueryOptions::new().with_max_records(25);
    let all = api.table("appX", "Tasks").all(options).await.unwrap();
    assert_eq!(all.len(), 25);
    assert_eq!(all.last().unwrap().id, "c4");
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test]
async fn test_stream_yields_pages_then_error() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"records": records("a", 2), "offset": "c1"}));
    mock.push_json(422, json!({"error": {"type": "INVALID_FILTER_BY_FORMULA", "message": "bad formula"}}));
    let api = api(&mock);

    let mut stream = api
        .table("appX", "Tasks")
        .iterate(QueryOptions::new())
        .into_stream();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.items.len(), 2);

    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert!(err.to_string().contains("bad formula"));
    assert!(matches!(err, ApiError::Http { .. }));

    assert!(stream.next().await.is_none());
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_first_returns_none_for_empty_table() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"records": []}));
    let api = api(&mock);
    let first = api.table("appX", "Tasks").first(QueryOptions::new()).await.unwrap();
    assert!(first.is_none());
}
