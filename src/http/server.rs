//! Gateway HTTP server.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all gateway handler
//! - Wire up middleware (request ID, tracing, body limit)
//! - Forward every inbound request upstream through the governor
//! - Stop accepting on the shutdown broadcast and drain in-flight requests

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::governor::Governor;
use crate::http::request::{forwarded_headers, request_id, upstream_url, UuidRequestId};
use crate::transport::RequestOptions;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub governor: Governor,
    pub upstream_base: Arc<str>,
    pub max_body_bytes: usize,
}

/// HTTP server fronting the upstream.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServiceConfig, governor: Governor) -> Self {
        let state = GatewayState {
            governor,
            upstream_base: Arc::from(config.upstream.base_url.as_str()),
            max_body_bytes: config.listener.max_body_bytes,
        };

        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServiceConfig, state: GatewayState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The configured router, for serving on a custom listener or in tests.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve until a shutdown broadcast arrives, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Forward one inbound request through the governor.
async fn gateway_handler(State(state): State<GatewayState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts.headers).to_string();

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let url = upstream_url(&state.upstream_base, &parts.uri);
    tracing::debug!(request_id = %request_id, method = %parts.method, url = %url, "Forwarding request");

    let options = RequestOptions {
        method: parts.method,
        headers: forwarded_headers(&parts.headers),
        body: (!body.is_empty()).then_some(body),
    };

    match state.governor.call(&url, options).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                kind = e.kind(),
                error = %e,
                "Governed call failed"
            );
            e.into_response()
        }
    }
}
