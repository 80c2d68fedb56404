//! Outbound HTTP
//!
//! Every gateway adapter talks to its provider through [`HttpTransport`], so
//! the same adapter code runs against reqwest in production and against
//! [`MockTransport`] in tests.

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Credentials attached to a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Auth {
    Bearer(String),
    Basic { username: String, password: String },
}

/// Request payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    /// Pre-serialized JSON, sent byte-for-byte (signed payloads)
    RawJson(String),
}

/// Provider-agnostic HTTP request
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub auth: Option<Auth>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            auth: None,
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(Auth::Bearer(token.into()));
        self
    }

    #[must_use]
    pub fn basic(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(Auth::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    #[must_use]
    pub fn raw_json(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::RawJson(body.into());
        self
    }

    /// Header value by case-insensitive name
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Form field value by name
    pub fn form_value(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// JSON body, whether structured or pre-serialized
    pub fn json_body(&self) -> Option<serde_json::Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value.clone()),
            RequestBody::RawJson(raw) => serde_json::from_str(raw).ok(),
            _ => None,
        }
    }
}

/// Status and body of a provider response
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// Sends one request and returns the response, whatever its status
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport (client default timeouts, no retries)
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.request(request.method.clone(), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder = match request.auth {
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            Some(Auth::Basic { username, password }) => builder.basic_auth(username, Some(password)),
            None => builder,
        };

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::RawJson(raw) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(raw),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status,
            "Provider call completed"
        );

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::post("https://api.example.com/v1/things")
            .header("X-Trace", "abc")
            .bearer("sk_test")
            .form(vec![("mode".into(), "payment".into())]);

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.header_value("x-trace"), Some("abc"));
        assert_eq!(request.form_value("mode"), Some("payment"));
        assert_eq!(request.auth, Some(Auth::Bearer("sk_test".into())));
    }

    #[test]
    fn test_raw_json_body_is_readable() {
        let request = HttpRequest::post("https://x").raw_json(r#"{"a":1}"#);
        assert_eq!(request.json_body().unwrap()["a"], 1);
    }

    #[test]
    fn test_response_status() {
        assert!(HttpResponse::new(201, "").is_success());
        assert!(!HttpResponse::new(400, "").is_success());
    }

    #[test]
    fn test_default_transport_is_cloneable() {
        let transport = ReqwestTransport::default();
        let _shared: std::sync::Arc<dyn HttpTransport> = std::sync::Arc::new(transport.clone());
    }
}
