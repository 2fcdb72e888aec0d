//! API handle and configuration
//!
//! An [`Api`] owns everything one access token needs: the transport, the
//! retry policy, the rate limiter shared by pagination and batch writes, and
//! the record cache used by memoizing models. Handles are cheap to clone and
//! clones share all of it.

pub mod table;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::client::config::{
    API_BASE_URL, DEFAULT_REQUESTS_PER_SECOND, MAX_RECORDS_PER_REQUEST, MAX_URL_LENGTH,
};
use crate::client::{
    decode, ApiRequest, ApiResult, BatchCoordinator, RateLimiter, ReqwestTransport, RequestExecutor,
    RetryPolicy, Timeouts, Transport, UrlBuilder,
};
use crate::orm::RecordCache;
use crate::types::UserInfo;

pub use table::{Table, WriteOptions};

/// Settings for an [`Api`] handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API root, including the version segment
    pub base_url: String,
    /// Connect/read timeouts
    pub timeouts: Timeouts,
    /// Retry policy applied to every request
    pub retry: RetryPolicy,
    /// Spacing between pages and batch chunks; 0 disables limiting
    pub requests_per_second: u32,
    /// Records per batch write request
    pub chunk_size: usize,
    /// GET URL length that triggers the POST fallback for list calls
    pub max_url_length: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            timeouts: Timeouts::default(),
            retry: RetryPolicy::default(),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            chunk_size: MAX_RECORDS_PER_REQUEST,
            max_url_length: MAX_URL_LENGTH,
        }
    }
}

impl ApiConfig {
    /// Set the API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the timeouts
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the rate limit; 0 disables limiting
    pub fn with_requests_per_second(mut self, requests_per_second: u32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    /// Set the batch chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Entry point: one access token, one transport, one rate limiter
#[derive(Debug, Clone)]
pub struct Api {
    executor: Arc<RequestExecutor>,
    limiter: Arc<RateLimiter>,
    batcher: BatchCoordinator,
    urls: UrlBuilder,
    cache: Arc<RecordCache>,
    config: ApiConfig,
}

impl Api {
    /// Connect with `token` and default settings
    pub fn new(token: impl Into<String>) -> ApiResult<Self> {
        Self::with_config(token, ApiConfig::default())
    }

    /// Connect with `token` over HTTPS using `config`
    pub fn with_config(token: impl Into<String>, config: ApiConfig) -> ApiResult<Self> {
        let transport = ReqwestTransport::new(token, config.timeouts)?;
        Self::with_transport(Arc::new(transport), config)
    }

    /// Build a handle over any [`Transport`]
    pub fn with_transport(transport: Arc<dyn Transport>, config: ApiConfig) -> ApiResult<Self> {
        let urls = UrlBuilder::new(&config.base_url)?;
        let executor = Arc::new(
            RequestExecutor::new(transport, config.retry.clone(), config.timeouts)
                .with_max_url_length(config.max_url_length),
        );
        let limiter = Arc::new(RateLimiter::per_second(config.requests_per_second));
        let batcher = BatchCoordinator::new(executor.clone(), limiter.clone())
            .with_chunk_size(config.chunk_size);
        debug!(
            base_url = %config.base_url,
            requests_per_second = config.requests_per_second,
            max_attempts = config.retry.max_attempts,
            "Created API handle"
        );
        Ok(Self {
            executor,
            limiter,
            batcher,
            urls,
            cache: Arc::new(RecordCache::new()),
            config,
        })
    }

    /// Settings this handle was built with
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Handle for one table of a base
    pub fn table(&self, base_id: impl Into<String>, table_name: impl Into<String>) -> Table<'_> {
        Table::new(self, base_id.into(), table_name.into())
    }

    /// Identity and scopes of the access token
    pub async fn whoami(&self) -> ApiResult<UserInfo> {
        let response = self.executor.execute(ApiRequest::get(self.urls.whoami())).await?;
        decode(response)
    }

    /// Request executor shared by every table handle
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    /// Rate limiter shared by pagination and batch writes
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Batch write coordinator
    pub fn batcher(&self) -> &BatchCoordinator {
        &self.batcher
    }

    /// URL builder
    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    /// Record cache used by memoizing models
    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }
}
