//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! consistency. All errors are returned, not just the first.

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::{GovernorConfig, ServiceConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a full service configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme '{}', only http is supported", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("upstream.base_url", e.to_string())),
    }

    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.request_timeout_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set when the admin API is enabled",
            ));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "not a socket address"));
        }
    }

    if let Err(governor_errors) = validate_governor(&config.governor) {
        errors.extend(governor_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the governor policy on its own (used by runtime reconfiguration).
pub fn validate_governor(config: &GovernorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.excessive_call_threshold == 0 {
        errors.push(ValidationError::new("governor.excessive_call_threshold", "must be > 0"));
    }
    if config.emergency_stop_threshold <= config.excessive_call_threshold {
        errors.push(ValidationError::new(
            "governor.emergency_stop_threshold",
            "must be greater than excessive_call_threshold",
        ));
    }
    if config.circuit_failure_threshold == 0 {
        errors.push(ValidationError::new("governor.circuit_failure_threshold", "must be > 0"));
    }
    if config.circuit_reset_timeout_ms == 0 {
        errors.push(ValidationError::new("governor.circuit_reset_timeout_ms", "must be > 0"));
    }
    if config.cache_ttl_ms == 0 {
        errors.push(ValidationError::new("governor.cache_ttl_ms", "must be > 0"));
    }
    if config.cache_max_entries == 0 {
        errors.push(ValidationError::new("governor.cache_max_entries", "must be > 0"));
    }
    if config.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("governor.sweep_interval_secs", "must be > 0"));
    }
    if config.rate_limit.max_delay_ms < config.rate_limit.base_delay_ms {
        errors.push(ValidationError::new(
            "governor.rate_limit.max_delay_ms",
            "must be >= base_delay_ms",
        ));
    }

    let lists = [
        ("governor.cacheable_endpoints", &config.cacheable_endpoints),
        ("governor.debounce_endpoints", &config.debounce_endpoints),
        ("governor.rate_limited_endpoints", &config.rate_limited_endpoints),
        ("governor.denylisted_endpoints", &config.denylisted_endpoints),
    ];
    for (field, prefixes) in lists {
        for prefix in prefixes.iter().filter(|p| !p.starts_with('/')) {
            errors.push(ValidationError::new(
                field,
                format!("prefix '{}' must start with '/'", prefix),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
