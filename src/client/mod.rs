//! Transport-level building blocks shared by the table facade and the ORM
//!
//! This module contains:
//! - Rate limiting between consecutive calls
//! - Retry policies with exponential and jittered backoff
//! - Request execution (option translation, GET to POST fallback, error extraction)
//! - Cursor pagination
//! - Chunked batch writes

pub mod batch;
pub mod config;
pub mod executor;
pub mod failure;
pub mod pagination;
pub mod params;
pub mod rate_limit;
pub mod retry;
pub mod transport;
pub mod urls;

pub use batch::BatchCoordinator;
pub use config::Timeouts;
pub use executor::{ApiRequest, RequestExecutor};
pub use failure::FailureKind;
pub use pagination::{Page, PageStream, Paginator};
pub use params::QueryOptions;
pub use rate_limit::RateLimiter;
pub use retry::{BackoffMode, RetryPolicy};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
pub use urls::UrlBuilder;

/// Errors surfaced by the client layer
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A query option or call argument was rejected before any network call
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The service answered with a non-2xx status
    #[error("{}", format_http_error(*.status, .method, .url, .message.as_deref()))]
    Http {
        /// HTTP status code
        status: u16,
        /// Request method
        method: Method,
        /// Request URL, without the query string
        url: String,
        /// Message extracted from the response body, if any
        message: Option<String>,
    },

    /// The request did not complete within the configured timeouts
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection-level failure (DNS, refused, reset)
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Every attempt allowed by the retry policy failed
    #[error("request failed after {attempts} attempts: {last}")]
    RetryExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Failure of the final attempt
        #[source]
        last: Box<ApiError>,
    },

    /// A batch write failed part-way; earlier chunks were already applied
    #[error(
        "batch failed at chunk {} of {total_chunks} after {completed_records} records were written: {source}",
        .completed_chunks + 1
    )]
    PartialBatch {
        /// Chunks fully applied before the failure
        completed_chunks: usize,
        /// Records contained in those chunks
        completed_records: usize,
        /// Total number of chunks in the batch
        total_chunks: usize,
        /// Failure of the chunk that did not go through
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// HTTP status behind this error, looking through retry exhaustion and partial batches.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RetryExhausted { last, .. } => last.status(),
            Self::PartialBatch { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Message extracted from the service's error body, if any.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Self::Http { message, .. } => message.as_deref(),
            Self::RetryExhausted { last, .. } => last.service_message(),
            Self::PartialBatch { source, .. } => source.service_message(),
            _ => None,
        }
    }

    /// Classification used for retry logging and metrics labels.
    pub fn failure_kind(&self) -> FailureKind {
        FailureKind::classify(self)
    }
}

fn format_http_error(status: u16, method: &Method, url: &str, message: Option<&str>) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status");
    match message {
        Some(message) => format!("{status} {reason} for {method} {url} [Error: {message}]"),
        None => format!("{status} {reason} for {method} {url}"),
    }
}

/// Result alias for the client layer
pub type ApiResult<T> = Result<T, ApiError>;

/// Deserialize a response body, reporting shape mismatches as invalid responses
pub(crate) fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}
