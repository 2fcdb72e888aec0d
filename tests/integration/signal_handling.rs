use std::time::Duration;

use airtable_kit::shutdown::ShutdownSignal;
use airtable_kit::testing::MockTransport;
use airtable_kit::{Api, ApiConfig, QueryOptions};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn shutdown_notifies_waiters() {
    let shutdown = ShutdownSignal::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait().await;
            true
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

/// A request made before anyone waits must still release later waiters
#[tokio::test]
async fn shutdown_requested_before_wait_does_not_hang() {
    let shutdown = ShutdownSignal::shared();
    shutdown.request();

    let handle = shutdown.clone();
    let waiter = tokio::spawn(async move {
        handle.wait().await;
        true
    });

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok(), "wait() hung although shutdown was already requested");
}

#[tokio::test]
async fn shutdown_concurrent_waiters_all_notified() {
    let shutdown = ShutdownSignal::shared();

    let mut waiters = Vec::new();
    for _ in 0..10 {
        let handle = shutdown.clone();
        waiters.push(tokio::spawn(async move {
            handle.wait().await;
        }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.request();
    shutdown.request();

    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(result.is_ok(), "a waiter was not notified");
    }
    assert!(shutdown.is_requested());
}

/// Consumers stop between pages; the page in flight completes
#[tokio::test]
async fn listing_stops_between_pages() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"records": [{"id": "rec1", "fields": {}}], "offset": "c1"}));
    mock.push_json(200, json!({"records": [{"id": "rec2", "fields": {}}], "offset": "c2"}));
    let api = Api::with_transport(mock.clone(), ApiConfig::default().with_requests_per_second(0)).unwrap();
    let shutdown = ShutdownSignal::shared();

    let mut paginator = api.table("appX", "Tasks").iterate(QueryOptions::new());
    let mut seen = Vec::new();
    while let Some(page) = paginator.next_page().await.unwrap() {
        seen.extend(page.items.into_iter().map(|record| record.id));
        shutdown.request();
        if shutdown.is_requested() {
            break;
        }
    }

    assert_eq!(seen, vec!["rec1"]);
    assert!(!paginator.is_exhausted());
    assert_eq!(mock.call_count(), 1);
}
