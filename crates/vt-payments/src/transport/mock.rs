//! Mock Transport
//!
//! Records every request and answers from canned responses. Used by tests
//! and for running the server without provider credentials.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{PaymentError, Result};

struct Route {
    url_fragment: String,
    response: HttpResponse,
}

/// Transport returning canned responses matched by URL fragment
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose URL contains `url_fragment`.
    /// Later registrations take precedence.
    #[must_use]
    pub fn respond(self, url_fragment: &str, status: u16, body: serde_json::Value) -> Self {
        self.respond_raw(url_fragment, status, body.to_string())
    }

    #[must_use]
    pub fn respond_raw(self, url_fragment: &str, status: u16, body: impl Into<String>) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(Route {
                url_fragment: url_fragment.to_string(),
                response: HttpResponse::new(status, body),
            });
        }
        self
    }

    /// Every request sent so far
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Requests whose URL contains `url_fragment`
    pub fn calls_to(&self, url_fragment: &str) -> Vec<HttpRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.url.contains(url_fragment))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }

        let routes = self
            .routes
            .lock()
            .map_err(|_| PaymentError::Transport("mock lock poisoned".into()))?;

        routes
            .iter()
            .rev()
            .find(|r| url.contains(&r.url_fragment))
            .map(|r| r.response.clone())
            .ok_or_else(|| PaymentError::Transport(format!("no mock response for {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_matches_and_records() {
        let mock = MockTransport::new()
            .respond("/token", 200, serde_json::json!({"access_token": "abc"}))
            .respond("/orders", 201, serde_json::json!({"id": "O-1"}));

        let response = mock.send(HttpRequest::post("https://x/v2/orders")).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls_to("/orders").len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_is_transport_error() {
        let mock = MockTransport::new();
        let err = mock.send(HttpRequest::get("https://nowhere")).await.unwrap_err();
        assert!(matches!(err, PaymentError::Transport(_)));
        assert_eq!(mock.call_count(), 1);
    }
}
