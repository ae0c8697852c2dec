//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the governed
//! gateway. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the governed gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Backend that governed calls are forwarded to.
    pub upstream: UpstreamConfig,

    /// Request governor policy.
    pub governor: GovernorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Upstream backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL every inbound path is appended to.
    pub base_url: String,

    /// Deadline for a single upstream call in seconds.
    pub request_timeout_secs: u64,

    /// Maximum buffered response body size in bytes.
    pub max_response_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_secs: 30,
            max_response_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Request governor policy.
///
/// Endpoint lists are path prefixes matched against the request path
/// (before ID normalization).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GovernorConfig {
    /// Calls per minute above which an endpoint is flagged as excessive.
    pub excessive_call_threshold: usize,

    /// Consecutive failures that open an endpoint's circuit.
    pub circuit_failure_threshold: u32,

    /// Cooldown before an open circuit admits a probe, in milliseconds.
    pub circuit_reset_timeout_ms: u64,

    /// Calls per minute to any single endpoint that disable all governance.
    pub emergency_stop_threshold: usize,

    /// Endpoints whose GET/HEAD responses are cached.
    pub cacheable_endpoints: Vec<String>,

    /// Cache time-to-live in milliseconds.
    pub cache_ttl_ms: u64,

    /// Upper bound on cached responses.
    pub cache_max_entries: usize,

    /// Request headers that take part in cache and debounce keys.
    pub cache_vary_headers: Vec<String>,

    /// Endpoints whose identical calls are coalesced.
    pub debounce_endpoints: Vec<String>,

    /// Window during which a dispatched call's result is shared, in milliseconds.
    pub debounce_window_ms: u64,

    /// Endpoints retried with backoff on 429.
    pub rate_limited_endpoints: Vec<String>,

    /// Backoff settings for `rate_limited_endpoints`.
    pub rate_limit: RateLimitConfig,

    /// Endpoints that always bypass the governor.
    pub denylisted_endpoints: Vec<String>,

    /// Interval of the background maintenance sweep in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            excessive_call_threshold: 5,
            circuit_failure_threshold: 10,
            circuit_reset_timeout_ms: 30_000,
            emergency_stop_threshold: 500,
            cacheable_endpoints: Vec::new(),
            cache_ttl_ms: 60_000,
            cache_max_entries: 1_000,
            cache_vary_headers: vec![
                "authorization".to_string(),
                "cookie".to_string(),
                "accept".to_string(),
                "accept-language".to_string(),
            ],
            debounce_endpoints: Vec::new(),
            debounce_window_ms: 500,
            rate_limited_endpoints: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            // The config endpoint is fetched by the error handler of a failed
            // config fetch; governing it would loop.
            denylisted_endpoints: vec!["/api/config".to_string()],
            sweep_interval_secs: 60,
        }
    }
}

/// Backoff configuration for throttled endpoints.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Retries after the first throttled attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,

    /// Never wait less than the upstream's `Retry-After`.
    pub respect_retry_after: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
            jitter: false,
            respect_retry_after: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
