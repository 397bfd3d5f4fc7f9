//! HTTP transport abstraction for calls against the Okapi gateway.
//!
//! This module defines the `Transport` trait to abstract HTTP request
//! execution, enabling testability with mock implementations.

use crate::error::Result;
use async_trait::async_trait;

/// HTTP method for a [`RequestSpec`]. Only the two verbs the Okapi sync
/// operations actually use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one HTTP request to the service.
///
/// The base URL lives here rather than in the transport so a single
/// transport (and its connection pool) can serve any number of calls.
/// Query pairs are kept structured and encoded by the transport; the CQL
/// filter string contains characters (`>`, `=`, `"`) that must be
/// percent-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    /// HTTP method.
    pub method: Method,
    /// Base service URL, e.g. `https://folio.example.org`.
    pub base_url: String,
    /// Path under the base URL, e.g. `/instance-storage/instances`.
    pub path: String,
    /// Query parameters, appended in order.
    pub query: Vec<(String, String)>,
    /// Headers to send, in order.
    pub headers: Vec<(String, String)>,
    /// Optional request body (already-serialized JSON).
    pub body: Option<String>,
}

impl RequestSpec {
    /// A GET request with no body.
    pub fn get(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            base_url: base_url.into(),
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST request carrying a JSON body.
    pub fn post(
        base_url: impl Into<String>,
        path: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            method: Method::Post,
            base_url: base_url.into(),
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the headers for this request.
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }
}

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for executing HTTP requests.
///
/// This abstraction allows for different implementations (production vs.
/// testing) and makes the sync loop testable without a live Okapi gateway.
///
/// # Example
/// ```ignore
/// let transport = ReqwestTransport::new();
/// let response = transport.execute(&spec).await?;
/// println!("Status: {}, Body: {}", response.status, response.body);
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute an HTTP request.
    ///
    /// # Errors
    /// Returns [`crate::SyncError::Transport`] if the request fails due to
    /// network issues, times out, or the URL is invalid. A completed call
    /// with a non-success status is NOT an error at this layer.
    async fn execute(&self, spec: &RequestSpec) -> Result<HttpResponse>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production transport using reqwest.
///
/// One instance holds one `reqwest::Client`; reusing it across all calls in
/// a run gives connection pooling for free.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a new reqwest-based transport.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, spec), fields(method = %spec.method, path = %spec.path))]
    async fn execute(&self, spec: &RequestSpec) -> Result<HttpResponse> {
        let url = format!("{}{}", spec.base_url, spec.path);

        tracing::debug!(url = %url, "Executing HTTP request");

        let method = match spec.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut req = self.client.request(method, &url);

        if !spec.query.is_empty() {
            req = req.query(&spec.query);
        }

        for (name, value) in &spec.headers {
            req = req.header(name, value);
        }

        if let Some(body) = &spec.body {
            req = req.body(body.clone());
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "HTTP request failed");
            e
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(
            status = status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Mock transport for testing.
///
/// Allows configuring predetermined responses for specific requests without
/// making actual HTTP calls.
///
/// # Example
/// ```ignore
/// let mock = MockTransport::new();
/// mock.add_response(
///     "GET /instance-storage/instances",
///     Ok(HttpResponse {
///         status: 200,
///         body: r#"{"totalRecords": 0, "instances": []}"#.to_string(),
///     }),
/// );
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<String, Vec<Result<HttpResponse>>>>>,
    calls: Arc<Mutex<Vec<RequestSpec>>>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predetermined response for a specific method and path.
    ///
    /// The key is formatted as "{method} {path}". Multiple responses can be
    /// added for the same key; they are returned in FIFO order.
    pub fn add_response(&self, key: &str, response: Result<HttpResponse>) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(response);
    }

    /// Get all calls that have been made to this mock transport.
    pub fn get_calls(&self) -> Vec<RequestSpec> {
        self.calls.lock().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, spec: &RequestSpec) -> Result<HttpResponse> {
        // Record this call
        self.calls.lock().push(spec.clone());

        // Look up the response
        let key = format!("{} {}", spec.method, spec.path);
        let response = {
            let mut responses = self.responses.lock();
            match responses.get_mut(&key) {
                Some(queue) if !queue.is_empty() => Some(queue.remove(0)),
                _ => None,
            }
        };

        match response {
            Some(response) => response,
            None => Err(crate::error::SyncError::Other(anyhow::anyhow!(
                "No mock response configured for {} {}",
                spec.method,
                spec.path
            ))),
        }
    }
}
