//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!
//! On admin reload:
//!     POST /admin/reload
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → Governor::reconfigure swaps the governor policy atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only an explicit admin action changes it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, GovernorConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig,
    ServiceConfig, UpstreamConfig,
};
