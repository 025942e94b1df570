//! Test doubles.
//!
//! [`MockTransport`] answers requests from a queue of scripted outcomes and
//! remembers what it was sent, so client behavior can be checked without a
//! network.
//!
//! Outside this crate's own tests the module needs the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! turbo-fetch = { path = "../turbo-fetch", features = ["testing"] }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::{Request, Response, Transport, TransportError};

/// Scripted transport.
///
/// Outcomes are returned in the order they were queued. Once the queue is
/// empty every request fails with [`TransportError::Network`].
#[derive(Debug, Default)]
pub struct MockTransport {
    outcomes: Mutex<VecDeque<Result<Response, TransportError>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    /// Create a transport with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with a JSON body.
    pub fn with_json(self, status: u16, body: Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        self.with_response(Response::new(status, headers, body.to_string().into_bytes()))
    }

    /// Queue a response with a raw body.
    pub fn with_body(self, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.with_response(Response::new(status, HashMap::new(), body.into()))
    }

    /// Queue a prepared response.
    pub fn with_response(self, response: Response) -> Self {
        self.push(Ok(response));
        self
    }

    /// Queue a transport failure.
    pub fn with_error(self, error: TransportError) -> Self {
        self.push(Err(error));
        self
    }

    /// Queue an outcome on a shared transport.
    pub fn push(&self, outcome: Result<Response, TransportError>) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no response queued".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestOptions;
    use serde_json::json;

    #[tokio::test]
    async fn test_outcomes_in_order_then_exhausted() {
        let transport = MockTransport::new()
            .with_json(200, json!({"n": 1}))
            .with_error(TransportError::Network("reset".into()));

        let first = transport
            .send(Request::new("http://a/1", RequestOptions::new()))
            .await
            .unwrap();
        assert_eq!(first.json_value().unwrap(), json!({"n": 1}));
        assert_eq!(first.content_type(), Some("application/json"));

        let second = transport
            .send(Request::new("http://a/2", RequestOptions::new()))
            .await;
        assert!(matches!(second, Err(TransportError::Network(m)) if m == "reset"));

        let third = transport
            .send(Request::new("http://a/3", RequestOptions::new()))
            .await;
        assert!(matches!(third, Err(TransportError::Network(_))));

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["http://a/1", "http://a/2", "http://a/3"]);
    }
}
