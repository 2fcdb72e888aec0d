//! Unit tests for option translation and the POST fallback

use airtable_kit::client::{ApiRequest, Method, RequestExecutor, RetryPolicy, Timeouts};
use airtable_kit::testing::MockTransport;
use airtable_kit::{ApiError, QueryOptions};
use serde_json::json;
use std::sync::Arc;

fn executor(max_url_length: usize) -> RequestExecutor {
    RequestExecutor::new(
        Arc::new(MockTransport::new()),
        RetryPolicy::none(),
        Timeouts::default(),
    )
    .with_max_url_length(max_url_length)
}

#[test]
fn test_unknown_option_fails_before_request() {
    let mut options = QueryOptions::new();
    let err = options.set("colour", json!("red")).unwrap_err();
    assert!(matches!(err, ApiError::InvalidParameter(_)));
    assert!(err.to_string().contains("colour"));
}

#[test]
fn test_wire_names() {
    let options = QueryOptions::new()
        .with_view("Grid")
        .with_max_records(25)
        .with_fields(["Name", "Age"])
        .with_sort(["-Age"])
        .with_return_fields_by_field_id(true);
    let params = options.to_query_params();
    let get = |key: &str| {
        params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
    };
    assert_eq!(get("view"), vec!["Grid"]);
    assert_eq!(get("maxRecords"), vec!["25"]);
    assert_eq!(get("fields[]"), vec!["Name", "Age"]);
    assert_eq!(get("sort[0][field]"), vec!["Age"]);
    assert_eq!(get("sort[0][direction]"), vec!["desc"]);
    assert_eq!(get("returnFieldsByFieldId"), vec!["1"]);
}

#[test]
fn test_raw_params_win_on_conflict() {
    let request = ApiRequest::get("https://api.airtable.com/v0/appX/Tasks")
        .with_options(QueryOptions::new().with_view("A"))
        .with_params(vec![("view".into(), "B".into())]);
    let prepared = executor(16_000).prepare(request).unwrap();
    assert_eq!(prepared.query_values("view"), vec!["B"]);
}

#[test]
fn test_long_get_becomes_post_keeping_get_only_params() {
    let formula = format!("{{Name}}='{}'", "x".repeat(200));
    let options = QueryOptions::new()
        .with_formula(formula.clone())
        .with_time_zone("Europe/Paris")
        .with_user_locale("fr");
    let request = ApiRequest::get("https://api.airtable.com/v0/appX/Tasks")
        .with_options(options)
        .with_fallback("https://api.airtable.com/v0/appX/Tasks/listRecords");

    let prepared = executor(100).prepare(request).unwrap();
    assert_eq!(prepared.method, Method::Post);
    assert!(prepared.url.ends_with("/listRecords"));
    assert_eq!(prepared.query_value("timeZone"), Some("Europe/Paris"));
    assert_eq!(prepared.query_value("userLocale"), Some("fr"));
    let body = prepared.body.unwrap();
    assert_eq!(body["filterByFormula"], json!(formula));
    assert!(body.get("timeZone").is_none());
}

#[test]
fn test_short_get_stays_get() {
    let request = ApiRequest::get("https://api.airtable.com/v0/appX/Tasks")
        .with_options(QueryOptions::new().with_page_size(10))
        .with_fallback("https://api.airtable.com/v0/appX/Tasks/listRecords");
    let prepared = executor(16_000).prepare(request).unwrap();
    assert_eq!(prepared.method, Method::Get);
    assert_eq!(prepared.query_value("pageSize"), Some("10"));
}

#[test]
fn test_invalid_page_size_is_rejected() {
    let request = ApiRequest::get("https://api.airtable.com/v0/appX/Tasks")
        .with_options(QueryOptions::new().with_page_size(500));
    assert!(matches!(
        executor(16_000).prepare(request),
        Err(ApiError::InvalidParameter(_))
    ));
}
