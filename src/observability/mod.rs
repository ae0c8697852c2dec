//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Governor, transport, gateway produce:
//!     → logging.rs (structured tracing events, spans per governed call)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the gateway into every upstream call
//! - Metrics are cheap (atomic increments); with no exporter installed they are no-ops
//! - Governor state transitions are always logged, never thrown

pub mod logging;
pub mod metrics;
