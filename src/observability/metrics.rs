//! Metrics collection and exposition.
//!
//! # Metrics
//! - `governor_calls_total` (counter): governed calls by strategy, outcome
//! - `governor_call_duration_seconds` (histogram): latency by strategy
//! - `governor_cache_events_total` (counter): hit, miss, expired, evicted
//! - `governor_cache_entries` (gauge): cached responses
//! - `governor_circuit_transitions_total` (counter): by new state
//! - `governor_backoff_retries_total` (counter)
//! - `governor_emergency_stops_total` (counter)
//! - `governor_excessive_endpoints_total` (counter)
//!
//! Endpoint keys are normalized, so no label is unbounded.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_call(strategy: &'static str, outcome: &'static str, start: Instant) {
    ::metrics::counter!("governor_calls_total", "strategy" => strategy, "outcome" => outcome)
        .increment(1);
    ::metrics::histogram!("governor_call_duration_seconds", "strategy" => strategy)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_event(event: &'static str) {
    ::metrics::counter!("governor_cache_events_total", "event" => event).increment(1);
}

pub fn record_cache_size(entries: usize) {
    ::metrics::gauge!("governor_cache_entries").set(entries as f64);
}

pub fn record_circuit_transition(state: &'static str) {
    ::metrics::counter!("governor_circuit_transitions_total", "state" => state).increment(1);
}

pub fn record_backoff_retry() {
    ::metrics::counter!("governor_backoff_retries_total").increment(1);
}

pub fn record_emergency_stop() {
    ::metrics::counter!("governor_emergency_stops_total").increment(1);
}

pub fn record_excessive(endpoint: &str) {
    ::metrics::counter!("governor_excessive_endpoints_total", "endpoint" => endpoint.to_string())
        .increment(1);
}
