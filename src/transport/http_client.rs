//! Hyper-based transport used by the gateway binary.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;
use tokio::time;

use crate::config::UpstreamConfig;
use crate::transport::{RequestOptions, Response, Transport, TransportError};

/// Plain-HTTP transport with a per-call deadline and buffered bodies.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    max_response_bytes: usize,
}

impl HttpTransport {
    pub fn new(config: &UpstreamConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_response_bytes: config.max_response_bytes,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, url: &str, options: RequestOptions) -> Result<Response, TransportError> {
        let mut builder = Request::builder().method(options.method).uri(url);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(options.headers);
        }

        let body = options.body.map(Body::from).unwrap_or_else(Body::empty);
        let request = builder
            .body(body)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response = match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(TransportError::Connect(e.to_string())),
            Err(_) => return Err(TransportError::Timeout(self.timeout)),
        };

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_response_bytes)
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(Response {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}
