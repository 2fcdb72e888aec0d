//! Client configuration constants and backoff calculation

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root of the REST API, including the version segment.
pub const API_BASE_URL: &str = "https://api.airtable.com/v0/";

/// Requests-per-second ceiling the service documents per base.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;

/// Maximum number of records the service accepts in one write request.
pub const MAX_RECORDS_PER_REQUEST: usize = 10;

/// GET URLs longer than this are re-issued as POST against the fallback URL.
pub const MAX_URL_LENGTH: usize = 16_000;

/// Largest `pageSize` the list endpoints accept.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default number of attempts per request (the first try plus 5 retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// Default base delay for exponential backoff, in milliseconds.
pub const DEFAULT_BACKOFF_FACTOR_MS: u64 = 300;

/// Status codes retried by the default policy.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Upper bound on a single backoff sleep for the plain policy, in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 120_000;

/// Multiplier used by the rate-limit-aware policy (the service asks for a 30s
/// cool-down after a 429, the official JS client backs off in 5s steps).
pub const RATE_LIMIT_BACKOFF_MULTIPLIER_MS: u64 = 5_000;

/// Cap for the rate-limit-aware jittered backoff, in milliseconds.
pub const RATE_LIMIT_MAX_BACKOFF_MS: u64 = 600_000;

/// HTTP connect timeout (seconds)
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP read timeout (seconds) for the whole request
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connect/read timeout pair applied to every network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Time allowed to establish the connection
    pub connect: Duration,
    /// Time allowed for the full request/response exchange
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS),
            read: Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Exponential backoff before the nth retry: `factor * 2^(n-1)`, capped.
///
/// `retry` is 1-based; `retry == 0` yields no delay.
pub fn calculate_backoff(factor: Duration, retry: u32, cap: Duration) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }
    let multiplier = 2u32.saturating_pow(retry - 1);
    factor.saturating_mul(multiplier).min(cap)
}
