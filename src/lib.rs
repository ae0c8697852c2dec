//! Request governor library.
//!
//! A transparent layer over an injected HTTP transport that adds response
//! caching, call deduplication, rate-limit backoff and per-endpoint circuit
//! breaking, with an emergency stop against runaway call loops.

pub mod admin;
pub mod config;
pub mod governor;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod transport;

pub use config::ServiceConfig;
pub use governor::{EndpointKey, Governor, GovernorError, GovernorStats};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use transport::{HttpTransport, RequestOptions, Response, Transport, TransportError};
