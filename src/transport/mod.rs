//! Transport abstraction.
//!
//! # Data Flow
//! ```text
//! Caller
//!     → Governor::call (same shape as Transport::call)
//!     → Arc<dyn Transport> (injected at startup)
//!     → network
//! ```
//!
//! # Design Decisions
//! - The governor never owns a network stack; it decorates whatever
//!   `Transport` the hosting application injects
//! - Responses are fully buffered so one result can be handed to many
//!   callers (cache hits, debounced calls)
//! - `TransportError` is `Clone` for the same reason

pub mod http_client;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use std::time::Duration;

pub use http_client::HttpTransport;

/// Per-call options handed to the transport alongside the URL.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    /// Options for a bodiless request with the given method.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// Add a header, ignoring names or values that are not valid HTTP.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::from_bytes(name.as_bytes()),
            axum::http::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A buffered upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// 429 Too Many Requests.
    pub fn is_throttled(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// `Retry-After` in delta-seconds form, if present.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(axum::http::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Failure of the underlying network primitive.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// The low-level call primitive: `call(url, options) -> Result<Response>`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn call(&self, url: &str, options: RequestOptions) -> Result<Response, TransportError>;
}
