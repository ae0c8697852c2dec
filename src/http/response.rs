//! Outbound response handling.
//!
//! # Responsibilities
//! - Turn buffered upstream responses back into axum responses
//! - Map governor errors to HTTP status codes
//!
//! # Design Decisions
//! - Upstream status and headers pass through unchanged, minus hop-by-hop
//! - Circuit open → 503 with `Retry-After`; backoff exhausted → 429
//! - Transport timeout → 504; any other transport failure → 502

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::time::Duration;

use crate::governor::GovernorError;
use crate::http::request::strip_hop_by_hop;
use crate::transport::{Response, TransportError};

/// JSON body for locally generated errors.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        strip_hop_by_hop(response.headers_mut());
        response
    }
}

impl IntoResponse for GovernorError {
    fn into_response(self) -> axum::response::Response {
        let status = status_for(&self);
        let retry_after = match &self {
            GovernorError::CircuitOpen { retry_after, .. } => Some(retry_after_secs(*retry_after)),
            _ => None,
        };

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub fn status_for(error: &GovernorError) -> StatusCode {
    match error {
        GovernorError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
        GovernorError::RateLimitExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
        GovernorError::Passthrough(TransportError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        GovernorError::Passthrough(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Whole seconds, rounded up.
fn retry_after_secs(remaining: Duration) -> u64 {
    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let open = GovernorError::CircuitOpen {
            endpoint: "GET /items/:id".into(),
            retry_after: Duration::from_millis(2_500),
        };
        let response = open.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "3");

        let exhausted = GovernorError::RateLimitExhausted {
            endpoint: "GET /search".into(),
            attempts: 4,
            last_status: 429,
        };
        assert_eq!(status_for(&exhausted), StatusCode::TOO_MANY_REQUESTS);

        let timeout = GovernorError::Passthrough(TransportError::Timeout(Duration::from_secs(30)));
        assert_eq!(status_for(&timeout), StatusCode::GATEWAY_TIMEOUT);

        let refused = GovernorError::Passthrough(TransportError::Connect("refused".into()));
        let response = refused.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_upstream_response_passthrough() {
        let mut upstream = Response::new(StatusCode::NOT_FOUND, "missing");
        upstream
            .headers
            .insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream
            .headers
            .insert("x-upstream", HeaderValue::from_static("1"));

        let response = upstream.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(response.headers().get("x-upstream").unwrap(), "1");
    }
}
