//! Retry policies
//!
//! A [`RetryPolicy`] decides which failures are retried, how long to sleep
//! between attempts, and how many attempts are made in total.
//!
//! - [`RetryPolicy::default`]: exponential backoff (`factor * 2^(n-1)`) on
//!   429/500/502/503/504, six attempts in total.
//! - [`RetryPolicy::rate_limit_aware`]: same, plus a random exponential jitter
//!   and 429 always retried.
//! - [`RetryPolicy::none`]: a single attempt, nothing retried.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::config::{
    calculate_backoff, DEFAULT_BACKOFF_FACTOR_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_RETRYABLE_STATUSES, MAX_BACKOFF_MS, RATE_LIMIT_BACKOFF_MULTIPLIER_MS,
    RATE_LIMIT_MAX_BACKOFF_MS,
};
use super::failure::{format_exhausted, format_retry};
use super::{ApiError, ApiResult};
use crate::metrics;

/// How the delay between attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffMode {
    /// `factor * 2^(n-1)`, capped at `max_backoff`
    Exponential,
    /// Exponential plus a uniform random jitter in
    /// `[0, min(cap, 5s * 2^(n-1))]`; 429 is always retried
    RateLimitJitter,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// HTTP statuses that trigger a retry
    pub retryable_statuses: BTreeSet<u16>,
    /// Base delay for exponential backoff
    pub backoff_factor: Duration,
    /// Cap on the exponential part of a single delay
    pub max_backoff: Duration,
    /// Whether timeouts and connection errors are retried
    pub retry_timeouts: bool,
    /// Backoff shape
    pub mode: BackoffMode,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            backoff_factor: Duration::from_millis(DEFAULT_BACKOFF_FACTOR_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
            retry_timeouts: true,
            mode: BackoffMode::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Policy that makes exactly one attempt and never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            retryable_statuses: BTreeSet::new(),
            retry_timeouts: false,
            ..Self::default()
        }
    }

    /// Default policy with jittered backoff for 429 responses
    pub fn rate_limit_aware() -> Self {
        Self {
            mode: BackoffMode::RateLimitJitter,
            ..Self::default()
        }
    }

    /// Set the total number of attempts (minimum 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Replace the set of retryable statuses
    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Set the exponential backoff base delay
    pub fn with_backoff_factor(mut self, factor: Duration) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Enable or disable retrying timeouts and connection errors
    pub fn with_retry_timeouts(mut self, retry_timeouts: bool) -> Self {
        self.retry_timeouts = retry_timeouts;
        self
    }

    /// Whether a failed attempt should be retried (budget permitting)
    pub fn is_retryable(&self, error: &ApiError) -> bool {
        match error {
            ApiError::Http { status, .. } => {
                self.retryable_statuses.contains(status)
                    || (*status == 429 && self.mode == BackoffMode::RateLimitJitter)
            }
            ApiError::Timeout(_) | ApiError::Network(_) => self.retry_timeouts,
            _ => false,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32, error: &ApiError) -> Duration {
        let base = calculate_backoff(self.backoff_factor, retry, self.max_backoff);
        match self.mode {
            BackoffMode::Exponential => base,
            BackoffMode::RateLimitJitter if error.status() == Some(429) => {
                base + rate_limit_jitter(retry)
            }
            BackoffMode::RateLimitJitter => base,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent.
    ///
    /// `operation` receives the 1-based attempt number. Exhaustion is reported
    /// as [`ApiError::RetryExhausted`] wrapping the last failure.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> ApiResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Attempt {}/{} succeeded", attempt, max_attempts);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !self.is_retryable(&error) {
                return Err(error);
            }

            let kind = error.failure_kind();
            if attempt >= max_attempts {
                warn!("{}", format_exhausted(attempt, kind, &error.to_string()));
                return Err(ApiError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.backoff_for(attempt, &error);
            warn!("{}", format_retry(attempt, max_attempts, kind, delay));
            metrics::record_retry(kind, delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn rate_limit_jitter(retry: u32) -> Duration {
    let ceiling = calculate_backoff(
        Duration::from_millis(RATE_LIMIT_BACKOFF_MULTIPLIER_MS),
        retry,
        Duration::from_millis(RATE_LIMIT_MAX_BACKOFF_MS),
    );
    let ceiling_ms = ceiling.as_millis() as u64;
    if ceiling_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling_ms))
}
