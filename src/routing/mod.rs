//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call (method, path)
//!     → router.rs (strategy lookup)
//!     → matcher.rs (evaluate prefix / method conditions)
//!     → Return: Route { strategy, rate_limited } or denylisted
//!
//! Compilation (at startup and on reconfigure):
//!     GovernorConfig endpoint lists
//!     → Compile matchers
//!     → Freeze as immutable EndpointRouter
//! ```
//!
//! # Design Decisions
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always picks the same strategy

pub mod matcher;
pub mod router;

pub use router::{EndpointRouter, Route, Strategy};
