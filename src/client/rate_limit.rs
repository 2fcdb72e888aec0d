//! Minimum-interval rate limiting
//!
//! Spaces consecutive calls at least `1/N` seconds apart. The limiter is shared
//! (via [`Arc`](std::sync::Arc)) by the paginator and the batch coordinator of
//! one [`Api`](crate::Api), so concurrent callers queue behind each other.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

use crate::metrics;

/// Rate limiter enforcing a minimum interval between consecutive calls
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last_release: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_second` calls per second.
    ///
    /// Zero disables limiting.
    pub fn per_second(requests_per_second: u32) -> Self {
        let min_interval = (requests_per_second > 0)
            .then(|| Duration::from_secs_f64(1.0 / f64::from(requests_per_second)));
        Self {
            min_interval,
            last_release: Mutex::new(None),
        }
    }

    /// Create a limiter that never waits
    pub fn unlimited() -> Self {
        Self::per_second(0)
    }

    /// Minimum spacing between calls, `None` when unlimited
    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    /// Wait until at least the minimum interval has passed since the previous
    /// call to `wait` returned.
    ///
    /// The first call returns immediately.
    pub async fn wait(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };

        let mut last_release = self.last_release.lock().await;
        if let Some(previous) = *last_release {
            let ready_at = previous + interval;
            let now = Instant::now();
            if ready_at > now {
                let delay = ready_at - now;
                trace!(delay_ms = delay.as_millis() as u64, "Rate limiter waiting");
                metrics::record_rate_limit_wait(delay);
                sleep_until(ready_at).await;
            }
        }
        *last_release = Some(Instant::now());
    }

    /// Record a call as just finished without waiting, so the next [`wait`]
    /// measures the interval from now.
    ///
    /// [`wait`]: RateLimiter::wait
    pub async fn mark(&self) {
        if self.min_interval.is_some() {
            *self.last_release.lock().await = Some(Instant::now());
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::per_second(super::config::DEFAULT_REQUESTS_PER_SECOND)
    }
}
