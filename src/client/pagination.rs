//! Cursor pagination
//!
//! [`Paginator`] follows the service's `offset` cursor page by page. It is an
//! explicit state machine (`Initial`, `Fetching`, `Exhausted`) so that a page
//! can be pulled with [`Paginator::next_page`] or the whole sequence consumed
//! as a [`Stream`] with [`Paginator::into_stream`].
//!
//! - The rate limiter is awaited between pages, never before the first one;
//!   the interval is measured from the end of the previous page.
//! - `max_records` truncates the page that reaches the cap and ends the sequence.
//! - A failed page ends the sequence; the error is returned once.

use futures_util::stream::{self, Stream};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

use super::executor::{ApiRequest, RequestExecutor};
use super::params::QueryOptions;
use super::rate_limit::RateLimiter;
use super::{ApiError, ApiResult};
use crate::metrics;
use crate::types::RecordDict;

/// Stream of pages
pub type PageStream<T> = Pin<Box<dyn Stream<Item = ApiResult<Page<T>>> + Send>>;

/// One page of results
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page
    pub offset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PaginatorState {
    Initial,
    Fetching { offset: String },
    Exhausted,
}

/// Follows `offset` cursors across pages
pub struct Paginator<T = RecordDict> {
    executor: Arc<RequestExecutor>,
    limiter: Arc<RateLimiter>,
    url: String,
    fallback_post_url: Option<String>,
    options: QueryOptions,
    items_key: &'static str,
    state: PaginatorState,
    yielded: u64,
    pages_fetched: usize,
    _item: std::marker::PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Paginator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("yielded", &self.yielded)
            .field("pages_fetched", &self.pages_fetched)
            .finish_non_exhaustive()
    }
}

impl<T> Paginator<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Paginate `url` with `options`; items are read from the `records` key.
    ///
    /// `options.max_records` caps the total across pages and
    /// `options.page_size` is sent with every page request.
    pub fn new(
        executor: Arc<RequestExecutor>,
        limiter: Arc<RateLimiter>,
        url: impl Into<String>,
        options: QueryOptions,
    ) -> Self {
        Self {
            executor,
            limiter,
            url: url.into(),
            fallback_post_url: None,
            options,
            items_key: "records",
            state: PaginatorState::Initial,
            yielded: 0,
            pages_fetched: 0,
            _item: std::marker::PhantomData,
        }
    }

    /// POST fallback for over-long GET URLs
    pub fn with_fallback(mut self, fallback_post_url: impl Into<String>) -> Self {
        self.fallback_post_url = Some(fallback_post_url.into());
        self
    }

    /// Read items from `key` instead of `records`
    pub fn with_items_key(mut self, key: &'static str) -> Self {
        self.items_key = key;
        self
    }

    /// Whether no further page will be fetched
    pub fn is_exhausted(&self) -> bool {
        self.state == PaginatorState::Exhausted
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetch the next page, or `None` once the sequence has ended
    pub async fn next_page(&mut self) -> ApiResult<Option<Page<T>>> {
        let cap = self.options.max_records;
        if cap.is_some_and(|cap| self.yielded >= cap) {
            self.state = PaginatorState::Exhausted;
        }

        let offset = match &self.state {
            PaginatorState::Exhausted => return Ok(None),
            PaginatorState::Initial => None,
            PaginatorState::Fetching { offset } => Some(offset.clone()),
        };
        if offset.is_some() {
            self.limiter.wait().await;
        }

        let mut options = self.options.clone();
        options.offset = offset;
        let mut request = ApiRequest::get(self.url.clone()).with_options(options);
        if let Some(fallback) = &self.fallback_post_url {
            request = request.with_fallback(fallback.clone());
        }

        let response = self.executor.execute(request).await;
        self.limiter.mark().await;
        let mut page = match response.and_then(|body| parse_page::<T>(body, self.items_key)) {
            Ok(page) => page,
            Err(e) => {
                self.state = PaginatorState::Exhausted;
                return Err(e);
            }
        };
        self.pages_fetched += 1;

        if let Some(cap) = cap {
            let remaining = cap.saturating_sub(self.yielded);
            if page.items.len() as u64 >= remaining {
                page.items.truncate(remaining as usize);
                page.offset = None;
            }
        }
        self.yielded += page.items.len() as u64;
        metrics::record_records_fetched(page.items.len());

        debug!(
            page = self.pages_fetched,
            items = page.items.len(),
            has_more = page.offset.is_some(),
            "Fetched page"
        );

        self.state = match &page.offset {
            Some(offset) => PaginatorState::Fetching {
                offset: offset.clone(),
            },
            None => PaginatorState::Exhausted,
        };
        Ok(Some(page))
    }

    /// Consume the paginator as a stream of pages
    pub fn into_stream(self) -> PageStream<T> {
        Box::pin(stream::unfold(self, |mut paginator| async move {
            match paginator.next_page().await {
                Ok(Some(page)) => Some((Ok(page), paginator)),
                Ok(None) => None,
                Err(e) => Some((Err(e), paginator)),
            }
        }))
    }

    /// Fetch every remaining page and concatenate the items
    pub async fn collect_all(mut self) -> ApiResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page.items);
        }
        Ok(items)
    }
}

fn parse_page<T: DeserializeOwned>(body: Value, items_key: &str) -> ApiResult<Page<T>> {
    let mut body = match body {
        Value::Object(body) => body,
        other => {
            return Err(ApiError::InvalidResponse(format!(
                "expected a JSON object with '{items_key}', got {other}"
            )))
        }
    };
    let items = match body.remove(items_key) {
        Some(items) => serde_json::from_value(items)
            .map_err(|e| ApiError::InvalidResponse(format!("malformed '{items_key}': {e}")))?,
        None => Vec::new(),
    };
    let offset = body
        .remove("offset")
        .and_then(|offset| offset.as_str().map(str::to_string));
    Ok(Page { items, offset })
}
