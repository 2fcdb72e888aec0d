//! HTTP transport seam
//!
//! [`Transport`] is the only place network I/O happens. [`ReqwestTransport`]
//! is the production implementation; tests substitute
//! [`MockTransport`](crate::testing::MockTransport).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use tracing::debug;
use url::Url;

use super::config::Timeouts;
use super::{ApiError, ApiResult};

/// HTTP methods used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case method name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A fully prepared request, ready to be sent as-is
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method
    pub method: Method,
    /// URL without query string
    pub url: String,
    /// Query pairs, in order; repeated keys are allowed
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
    /// Timeouts for this call
    pub timeouts: Timeouts,
}

impl HttpRequest {
    /// URL with the query string encoded, as it would go over the wire
    pub fn full_url(&self) -> ApiResult<String> {
        full_url(&self.url, &self.query)
    }

    /// All values of a query parameter, in order
    pub fn query_values(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// First value of a query parameter
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query_values(name).into_iter().next()
    }
}

pub(crate) fn full_url(url: &str, query: &[(String, String)]) -> ApiResult<String> {
    let mut parsed =
        Url::parse(url).map_err(|e| ApiError::InvalidParameter(format!("invalid url {url}: {e}")))?;
    if !query.is_empty() {
        parsed.query_pairs_mut().extend_pairs(query);
    }
    Ok(parsed.into())
}

/// Raw response: status and undecoded body
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body text
    pub body: String,
}

impl HttpResponse {
    /// Build a response with a JSON body
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations must not retry; retries are the executor's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request.
    ///
    /// Non-2xx statuses are returned as `Ok`; only failures to obtain a
    /// response (timeouts, connection errors) are `Err`.
    async fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse>;
}

/// [`Transport`] backed by a pooled `reqwest` client with bearer authentication
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    token: String,
}

impl ReqwestTransport {
    /// Create a transport authenticating with `token`
    pub fn new(token: impl Into<String>, timeouts: Timeouts) -> ApiResult<Self> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .user_agent(concat!("airtable-kit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .bearer_auth(&self.token)
            .timeout(request.timeouts.read);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout(error.to_string())
    } else if error.is_decode() || error.is_body() {
        ApiError::InvalidResponse(error.to_string())
    } else {
        ApiError::Network(error.to_string())
    }
}
