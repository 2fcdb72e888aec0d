//! In-memory [`Transport`] for tests
//!
//! [`MockTransport`] replays scripted responses in order and records every
//! request it receives. When the script runs out it falls back to an optional
//! handler, then to a 500 with an explanatory body.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::{ApiError, ApiResult, HttpRequest, HttpResponse, Transport};

type Handler = Arc<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

#[derive(Debug, Clone)]
enum Scripted {
    Response(HttpResponse),
    Timeout,
    Network,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<Scripted>,
    requests: Vec<HttpRequest>,
    handler: Option<Handler>,
}

/// Scripted transport recording the requests it receives
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockTransport")
            .field("pending", &state.script.len())
            .field("calls", &state.requests.len())
            .finish()
    }
}

impl MockTransport {
    /// Empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests without a scripted response using `handler`
    pub fn with_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        self.lock().handler = Some(Arc::new(handler));
        self
    }

    /// Queue a JSON response
    pub fn push_json(&self, status: u16, body: Value) {
        self.push(Scripted::Response(HttpResponse::json(status, body)));
    }

    /// Queue a raw text response
    pub fn push_text(&self, status: u16, body: &str) {
        self.push(Scripted::Response(HttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    /// Queue a timeout
    pub fn push_timeout(&self) {
        self.push(Scripted::Timeout);
    }

    /// Queue a connection failure
    pub fn push_network_error(&self) {
        self.push(Scripted::Network);
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    /// Most recent request
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.lock().requests.last().cloned()
    }

    /// Number of requests received
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Scripted responses not yet consumed
    pub fn pending(&self) -> usize {
        self.lock().script.len()
    }

    fn push(&self, scripted: Scripted) {
        self.lock().script.push_back(scripted);
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        match state.script.pop_front() {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Timeout) => Err(ApiError::Timeout(format!(
                "{} {} timed out",
                request.method, request.url
            ))),
            Some(Scripted::Network) => Err(ApiError::Network(format!(
                "connection to {} refused",
                request.url
            ))),
            None => match &state.handler {
                Some(handler) => Ok(handler(request)),
                None => Ok(HttpResponse::json(
                    500,
                    json!({"error": {"type": "MOCK_EXHAUSTED", "message": "no scripted response left"}}),
                )),
            },
        }
    }
}
