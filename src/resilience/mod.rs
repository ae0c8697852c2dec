//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Governed call to an endpoint:
//!     → circuit_breaker.rs (fail fast if the endpoint's circuit is open)
//!     → On 429 from a rate-limited endpoint: retries.rs (retry with backoff.rs)
//!     → circuit_breaker.rs (record outcome, open circuit if threshold exceeded)
//! ```
//!
//! # Design Decisions
//! - Timeouts stay with the transport and the hosting application
//! - Only throttling is retried
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
