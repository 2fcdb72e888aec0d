//! Failure classification and retry log formatting.
//!
//! Every failed attempt is mapped to a [`FailureKind`] so retry warnings and
//! exhaustion errors read the same way regardless of which endpoint failed.

use std::time::Duration;

use super::ApiError;

/// Classification of request failures for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request exceeded its connect or read timeout
    Timeout,
    /// Connection refused, DNS failure, reset
    Network,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 401/403
    AuthFailed(u16),
    /// HTTP 404
    NotFound,
    /// HTTP 422, usually a bad formula or field name
    InvalidRequest,
    /// Any other 4xx
    ClientError(u16),
    /// Body could not be parsed
    InvalidResponse,
    /// Rejected locally before the call was made
    InvalidParameter,
}

impl FailureKind {
    /// Classify an error, looking through retry exhaustion and partial batches.
    pub fn classify(error: &ApiError) -> Self {
        match error {
            ApiError::Timeout(_) => Self::Timeout,
            ApiError::Network(_) => Self::Network,
            ApiError::InvalidResponse(_) => Self::InvalidResponse,
            ApiError::InvalidParameter(_) => Self::InvalidParameter,
            ApiError::Http { status, .. } => Self::from_status(*status),
            ApiError::RetryExhausted { last, .. } => Self::classify(last),
            ApiError::PartialBatch { source, .. } => Self::classify(source),
        }
    }

    /// Classify an HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthFailed(status),
            404 => Self::NotFound,
            422 => Self::InvalidRequest,
            500..=599 => Self::ServerError(status),
            _ => Self::ClientError(status),
        }
    }

    /// Short description used inside log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "request timeout",
            Self::Network => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::AuthFailed(_) => "authentication failed",
            Self::NotFound => "resource not found",
            Self::InvalidRequest => "invalid request",
            Self::ClientError(_) => "client error",
            Self::InvalidResponse => "invalid response",
            Self::InvalidParameter => "invalid parameter",
        }
    }

    /// Suggested remediation shown once retries are exhausted.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Timeout => "Check network latency or raise the read timeout",
            Self::Network => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Lower requests_per_second or use the rate-limit-aware retry policy",
            Self::ServerError(_) => "The service may be degraded, try again later",
            Self::AuthFailed(_) => "Verify the access token and its scopes",
            Self::NotFound => "Check the base id, table name and record id",
            Self::InvalidRequest => "Check formulas, field names and option values",
            Self::ClientError(_) => "Review the request parameters",
            Self::InvalidResponse => "The service returned an unexpected body",
            Self::InvalidParameter => "Fix the offending argument",
        }
    }

    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::ServerError(_) => "server_error",
            Self::AuthFailed(_) => "auth_failed",
            Self::NotFound => "not_found",
            Self::InvalidRequest => "invalid_request",
            Self::ClientError(_) => "client_error",
            Self::InvalidResponse => "invalid_response",
            Self::InvalidParameter => "invalid_parameter",
        }
    }
}

/// Format the warning logged before sleeping for the next attempt.
pub fn format_retry(attempt: u32, max_attempts: u32, kind: FailureKind, backoff: Duration) -> String {
    format!(
        "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds...",
        attempt + 1,
        max_attempts,
        kind.description(),
        backoff.as_secs_f64()
    )
}

/// Format the final message once the retry budget is spent.
pub fn format_exhausted(attempts: u32, kind: FailureKind, last_error: &str) -> String {
    format!(
        "Failed after {} attempts: {} ({}). Suggestion: {}",
        attempts,
        kind.description(),
        last_error,
        kind.suggestion()
    )
}
