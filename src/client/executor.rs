//! Request execution
//!
//! [`RequestExecutor`] turns an [`ApiRequest`] into wire calls:
//! 1. validates and renders the query options, merging raw parameters
//! 2. re-issues an over-long GET as a POST against the fallback URL
//! 3. sends through the [`Transport`] under the [`RetryPolicy`]
//! 4. decodes the JSON body, or extracts the service's error message

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::config::{Timeouts, MAX_URL_LENGTH};
use super::params::{QueryOptions, GET_ONLY_PARAMS};
use super::retry::RetryPolicy;
use super::transport::{full_url, HttpRequest, Method, Transport};
use super::{ApiError, ApiResult};
use crate::metrics::HttpRequestMetrics;

/// A logical API call, before option rendering and fallback
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    url: String,
    options: QueryOptions,
    params: Vec<(String, String)>,
    body: Option<Value>,
    fallback_post_url: Option<String>,
}

impl ApiRequest {
    /// Request with the given method and URL
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            options: QueryOptions::default(),
            params: Vec::new(),
            body: None,
            fallback_post_url: None,
        }
    }

    /// GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// POST request with a JSON body
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, url).with_body(body)
    }

    /// PATCH request with a JSON body
    pub fn patch(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, url).with_body(body)
    }

    /// PUT request with a JSON body
    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, url).with_body(body)
    }

    /// DELETE request
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Attach query options
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach raw query parameters; they win over rendered options with the same key
    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    /// Attach a JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// URL to POST to when the GET URL would be too long
    pub fn with_fallback(mut self, fallback_post_url: impl Into<String>) -> Self {
        self.fallback_post_url = Some(fallback_post_url.into());
        self
    }

    /// Method
    pub fn method(&self) -> Method {
        self.method
    }

    /// URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Sends [`ApiRequest`]s with retries
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    timeouts: Timeouts,
    max_url_length: usize,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("retry", &self.retry)
            .field("timeouts", &self.timeouts)
            .field("max_url_length", &self.max_url_length)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    /// Create an executor over `transport`
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy, timeouts: Timeouts) -> Self {
        Self {
            transport,
            retry,
            timeouts,
            max_url_length: MAX_URL_LENGTH,
        }
    }

    /// Override the GET URL length that triggers the POST fallback
    pub fn with_max_url_length(mut self, max_url_length: usize) -> Self {
        self.max_url_length = max_url_length;
        self
    }

    /// Retry policy in use
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Timeouts in use
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Execute the request and return the decoded JSON body.
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn execute(&self, request: ApiRequest) -> ApiResult<Value> {
        let http = self.prepare(request)?;
        self.retry
            .run(|attempt| self.attempt(&http, attempt))
            .await
    }

    /// Render an [`ApiRequest`] into the exact [`HttpRequest`] that will be sent
    pub fn prepare(&self, request: ApiRequest) -> ApiResult<HttpRequest> {
        request.options.validate()?;

        let mut query = request.options.to_query_params();
        if !request.params.is_empty() {
            query.retain(|(key, _)| !request.params.iter().any(|(raw, _)| raw == key));
            query.extend(request.params.iter().cloned());
        }

        if request.method == Method::Get {
            if let Some(fallback) = &request.fallback_post_url {
                let url_length = full_url(&request.url, &query)?.len();
                if url_length > self.max_url_length {
                    debug!(
                        url_length,
                        max_url_length = self.max_url_length,
                        "URL too long, falling back to POST"
                    );
                    let get_only: Vec<_> = query
                        .into_iter()
                        .filter(|(key, _)| GET_ONLY_PARAMS.contains(&key.as_str()))
                        .collect();
                    let mut body = request.options.to_post_body();
                    merge_raw_params(&mut body, &request.params);
                    return Ok(HttpRequest {
                        method: Method::Post,
                        url: fallback.clone(),
                        query: get_only,
                        body: Some(Value::Object(body)),
                        timeouts: self.timeouts,
                    });
                }
            }
        }

        Ok(HttpRequest {
            method: request.method,
            url: request.url,
            query,
            body: request.body,
            timeouts: self.timeouts,
        })
    }

    async fn attempt(&self, request: &HttpRequest, attempt: u32) -> ApiResult<Value> {
        let metrics = HttpRequestMetrics::start(request.method, attempt);
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                metrics.record_transport_error(e.failure_kind());
                return Err(e);
            }
        };
        metrics.record_complete(response.status);

        if !response.is_success() {
            return Err(ApiError::Http {
                status: response.status,
                method: request.method,
                url: request.url.clone(),
                message: extract_error_message(&response.body),
            });
        }

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "{} {} returned a body that is not JSON: {e}",
                request.method, request.url
            ))
        })
    }
}

/// Copy raw parameters that are allowed in a POST body into `body`.
///
/// `key[]` parameters become arrays under `key`; repeated keys collect into
/// an array as well.
fn merge_raw_params(body: &mut Map<String, Value>, params: &[(String, String)]) {
    let mut arrays: Map<String, Value> = Map::new();
    for (key, value) in params {
        if GET_ONLY_PARAMS.contains(&key.as_str()) {
            continue;
        }
        match key.strip_suffix("[]") {
            Some(name) => {
                let entry = arrays
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = entry {
                    items.push(Value::String(value.clone()));
                }
            }
            None => {
                body.insert(key.clone(), Value::String(value.clone()));
            }
        }
    }
    body.extend(arrays);
}

/// Pull a human-readable message out of an error response body.
///
/// Handles `{"error": "CODE"}`, `{"error": {"type": ..., "message": ...}}` and
/// `{"errors": [...]}`. Returns `None` for bodies that are not JSON.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error").or_else(|| value.get("errors"))?;
    let message = match error {
        Value::String(code) => code.clone(),
        Value::Object(details) => {
            let kind = details.get("type").and_then(Value::as_str);
            let text = details.get("message").and_then(Value::as_str);
            match (kind, text) {
                (Some(kind), Some(text)) => format!("{kind}: {text}"),
                (Some(kind), None) => kind.to_string(),
                (None, Some(text)) => text.to_string(),
                (None, None) => error.to_string(),
            }
        }
        other => other.to_string(),
    };
    Some(message)
}
