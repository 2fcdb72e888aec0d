//! Request, retry and throughput metrics
//!
//! Metrics are emitted through the `metrics` facade and are no-ops until a
//! recorder is installed. The CLI installs a Prometheus exporter when started
//! with `--metrics-addr`.
//!
//! ## Metric names
//!
//! - `http_requests_total` (labels: method, status)
//! - `http_request_duration_seconds` (labels: method)
//! - `http_429_errors_total`
//! - `http_retries_total` (labels: kind)
//! - `rate_limit_wait_seconds`
//! - `records_fetched_total`
//! - `records_written_total` (labels: operation)

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::client::{FailureKind, Method};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The Prometheus exporter could not be installed
    #[error("failed to install Prometheus exporter: {0}")]
    Install(String),
}

/// Install the Prometheus exporter and register metric descriptions.
///
/// Idempotent: later calls return `Ok(())` without reinstalling.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        METRICS_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(MetricsError::Install(e.to_string()));
    }

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests sent to the API"
    );
    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Total number of 429 rate limit responses received"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_histogram!(
        "rate_limit_wait_seconds",
        Unit::Seconds,
        "Time spent waiting on the client-side rate limiter"
    );
    describe_counter!(
        "records_fetched_total",
        Unit::Count,
        "Records returned by list endpoints"
    );
    describe_counter!(
        "records_written_total",
        Unit::Count,
        "Records created, updated, upserted or deleted"
    );

    Ok(())
}

/// Whether [`init_metrics`] has installed an exporter
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.load(Ordering::SeqCst)
}

/// Timing handle for a single HTTP attempt
pub struct HttpRequestMetrics {
    method: Method,
    attempt: u32,
    start_time: Instant,
}

impl HttpRequestMetrics {
    /// Start timing an attempt
    pub fn start(method: Method, attempt: u32) -> Self {
        Self {
            method,
            attempt,
            start_time: Instant::now(),
        }
    }

    /// Record a response with the given status
    pub fn record_complete(&self, status: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "method" => self.method.as_str(),
            "status" => status.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds", "method" => self.method.as_str())
            .record(duration.as_secs_f64());

        if status == 429 {
            counter!("http_429_errors_total").increment(1);
            warn!(
                method = %self.method,
                attempt = self.attempt,
                duration_ms = duration.as_millis() as u64,
                "Rate limit error (429) recorded"
            );
        }
    }

    /// Record an attempt that produced no response
    pub fn record_transport_error(&self, kind: FailureKind) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "method" => self.method.as_str(),
            "status" => kind.label(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds", "method" => self.method.as_str())
            .record(duration.as_secs_f64());
    }
}

/// Record a retry about to happen
pub fn record_retry(kind: FailureKind, backoff: Duration) {
    counter!("http_retries_total", "kind" => kind.label()).increment(1);
    debug!(
        kind = kind.label(),
        backoff_ms = backoff.as_millis() as u64,
        "Retry backoff recorded"
    );
}

/// Record time spent in the rate limiter
pub fn record_rate_limit_wait(delay: Duration) {
    histogram!("rate_limit_wait_seconds").record(delay.as_secs_f64());
}

/// Record records returned by a list page
pub fn record_records_fetched(count: usize) {
    counter!("records_fetched_total").increment(count as u64);
}

/// Record records written by one request
pub fn record_records_written(operation: &'static str, count: usize) {
    counter!("records_written_total", "operation" => operation).increment(count as u64);
}
