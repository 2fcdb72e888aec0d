//! Endpoint URL construction with percent-encoded path segments

use url::Url;

use super::{ApiError, ApiResult};

/// Builds endpoint URLs below an API root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    base: Url,
}

impl UrlBuilder {
    /// Create a builder rooted at `base_url` (e.g. `https://api.airtable.com/v0/`)
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidParameter(format!("invalid base url {base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidParameter(format!(
                "base url {base_url} cannot have path segments"
            )));
        }
        Ok(Self { base })
    }

    /// Root URL
    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    /// `{base}/{base_id}/{table}`
    pub fn table(&self, base_id: &str, table: &str) -> String {
        self.join(&[base_id, table])
    }

    /// `{base}/{base_id}/{table}/listRecords`, the POST fallback for long list URLs
    pub fn list_records_post(&self, base_id: &str, table: &str) -> String {
        self.join(&[base_id, table, "listRecords"])
    }

    /// `{base}/{base_id}/{table}/{record_id}`
    pub fn record(&self, base_id: &str, table: &str, record_id: &str) -> String {
        self.join(&[base_id, table, record_id])
    }

    /// `{base}/{base_id}/{table}/{record_id}/comments`
    pub fn comments(&self, base_id: &str, table: &str, record_id: &str) -> String {
        self.join(&[base_id, table, record_id, "comments"])
    }

    /// `{base}/{base_id}/{table}/{record_id}/comments/{comment_id}`
    pub fn comment(&self, base_id: &str, table: &str, record_id: &str, comment_id: &str) -> String {
        self.join(&[base_id, table, record_id, "comments", comment_id])
    }

    /// `{base}/meta/whoami`
    pub fn whoami(&self) -> String {
        self.join(&["meta", "whoami"])
    }

    fn join(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }
}
