//! Request governor.
//!
//! # Data Flow
//! ```text
//! Governor::call(url, options)
//!     → denylisted?                      → raw transport call
//!     → normalizer.rs (endpoint key)
//!     → tracker.rs (record, emergency stop check)
//!     → disabled?                        → raw transport call
//!     → circuit_breaker.rs               → CircuitOpen, no network
//!     → routing (strategy)
//!         cache:    cache.rs hit, or single fill call via debounce.rs
//!         debounce: debounce.rs shared call
//!         direct:   one call
//!       every real call: retries.rs when rate-limited, outcome → circuit
//! ```
//!
//! # Design Decisions
//! - One `Governor` value owns every map; clones share it
//! - Shared maps are DashMaps and flags are atomics, so each per-key
//!   check-and-insert is a single `entry()` call; no lock spans an `.await`
//! - The emergency stop is one-way until an operator calls `enable()`

pub mod cache;
pub mod debounce;
pub mod error;
pub mod normalizer;
pub mod tracker;

use arc_swap::ArcSwap;
use futures_util::future::FutureExt;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::validation::{validate_governor, ValidationError};
use crate::config::{GovernorConfig, RateLimitConfig};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CircuitPermit, CircuitRegistry, CircuitSnapshot};
use crate::resilience::retries::retry_on_throttle;
use crate::routing::{EndpointRouter, Route, Strategy};
use crate::transport::{RequestOptions, Response, Transport};

use self::cache::{is_shareable, request_key, CacheStats, ResponseCache};
use self::debounce::{CallOutcome, DebounceRegistry, Dispatch};
use self::tracker::{CallTracker, ExcessiveEndpoint};

pub use self::error::GovernorError;
pub use self::normalizer::{normalize, EndpointKey};

/// Diagnostics snapshot. Never consumed by business logic.
#[derive(Debug, Clone, Serialize)]
pub struct GovernorStats {
    pub enabled: bool,
    pub emergency_stopped: bool,
    pub active_endpoint_count: usize,
    pub total_calls_last_minute: usize,
    pub cache_stats: CacheStats,
    pub excessive_endpoints: Vec<ExcessiveEndpoint>,
    pub open_circuits: Vec<CircuitSnapshot>,
    pub in_flight_calls: usize,
}

/// What one maintenance sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub call_records: usize,
    pub settled_calls: usize,
    pub cache_entries: usize,
    pub circuits: usize,
}

struct Policy {
    config: GovernorConfig,
    router: EndpointRouter,
}

impl Policy {
    fn new(config: GovernorConfig) -> Self {
        let router = EndpointRouter::from_config(&config);
        Self { config, router }
    }
}

struct GovernorInner {
    policy: ArcSwap<Policy>,
    transport: Arc<dyn Transport>,
    tracker: CallTracker,
    circuits: CircuitRegistry,
    cache: ResponseCache,
    debounce: DebounceRegistry,
    enabled: AtomicBool,
    emergency_stopped: AtomicBool,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for GovernorInner {
    fn drop(&mut self) {
        if let Some(handle) = self.maintenance.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
    }
}

/// Transparent governor around an injected transport.
#[derive(Clone)]
pub struct Governor {
    inner: Arc<GovernorInner>,
}

impl Governor {
    pub fn new(config: GovernorConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(GovernorInner {
                policy: ArcSwap::from_pointee(Policy::new(config)),
                transport,
                tracker: CallTracker::new(),
                circuits: CircuitRegistry::new(),
                cache: ResponseCache::new(),
                debounce: DebounceRegistry::new(),
                enabled: AtomicBool::new(true),
                emergency_stopped: AtomicBool::new(false),
                maintenance: Mutex::new(None),
            }),
        }
    }

    /// Make a governed call. Drop-in for `Transport::call`: responses and
    /// transport errors come back unchanged; the governor only adds
    /// `CircuitOpen` and `RateLimitExhausted`.
    pub async fn call(&self, url: &str, options: RequestOptions) -> Result<Response, GovernorError> {
        let start = std::time::Instant::now();
        let policy = self.inner.policy.load_full();

        let path = normalizer::request_path(url);
        if path.as_deref().is_some_and(|p| policy.router.is_denylisted(p)) {
            tracing::trace!(url = %url, "Denylisted endpoint, bypassing governor");
            return self.passthrough(url, options, "denylisted", start).await;
        }

        let endpoint = EndpointKey::new(&options.method, url);
        let now = Instant::now();
        let recent = self.inner.tracker.track_call(endpoint.as_str(), now);
        self.check_call_volume(&endpoint, recent, &policy.config);

        if !self.is_enabled() {
            return self.passthrough(url, options, "disabled", start).await;
        }

        let config = &policy.config;
        let permit = match self.inner.circuits.admit(
            endpoint.as_str(),
            Duration::from_millis(config.circuit_reset_timeout_ms),
            config.circuit_failure_threshold,
            now,
        ) {
            Ok(permit) => permit,
            Err(retry_after) => {
                tracing::debug!(endpoint = %endpoint, retry_after = ?retry_after, "Circuit open, failing fast");
                let err = GovernorError::CircuitOpen {
                    endpoint: endpoint.to_string(),
                    retry_after,
                };
                metrics::record_call("circuit", err.kind(), start);
                return Err(err);
            }
        };

        let path = path.unwrap_or_else(|| normalize(url));
        let mut route = policy.router.route(&options.method, &path);
        if route.strategy != Strategy::Direct && !is_shareable(&options.headers, &config.cache_vary_headers) {
            // Credentials that are not part of the key must not reach another caller.
            tracing::debug!(endpoint = %endpoint, "Unvaried credentials, calling direct");
            route.strategy = Strategy::Direct;
        }
        let span = tracing::debug_span!(
            "governed_call",
            endpoint = %endpoint,
            strategy = route.strategy.as_str(),
            probe = permit.is_probe(),
        );

        let result = self
            .execute(route, endpoint, url, options, permit, config)
            .instrument(span)
            .await;
        metrics::record_call(route.strategy.as_str(), outcome_label(&result), start);
        result
    }

    async fn execute(
        &self,
        route: Route,
        endpoint: EndpointKey,
        url: &str,
        options: RequestOptions,
        permit: CircuitPermit,
        config: &GovernorConfig,
    ) -> CallOutcome {
        let rate_limit = route.rate_limited.then(|| config.rate_limit.clone());
        let url = url.to_string();

        match route.strategy {
            Strategy::Direct => {
                dispatch(self.inner.clone(), endpoint, url, options, permit, rate_limit).await
            }
            Strategy::Debounce => {
                let key = request_key(
                    &options.method,
                    &url,
                    &options.headers,
                    options.body.as_ref(),
                    &config.cache_vary_headers,
                );
                let window = Duration::from_millis(config.debounce_window_ms);
                let inner = self.inner.clone();

                // A joined caller drops the unused permit, which frees a probe slot.
                let (call, dispatch_mode) = self.inner.debounce.debounce(&key, window, Instant::now(), move || {
                    dispatch(inner, endpoint, url, options, permit, rate_limit).boxed()
                });
                if dispatch_mode == Dispatch::Joined {
                    tracing::debug!(key = %key, "Joined dispatched call");
                }
                call.await
            }
            Strategy::Cache => {
                let key = request_key(
                    &options.method,
                    &url,
                    &options.headers,
                    options.body.as_ref(),
                    &config.cache_vary_headers,
                );
                if let Some(hit) = self.inner.cache.get(&key, Instant::now()) {
                    tracing::debug!(key = %key, "Served from cache");
                    return Ok(hit);
                }

                let ttl = Duration::from_millis(config.cache_ttl_ms);
                let max_entries = config.cache_max_entries;
                let inner = self.inner.clone();
                let cache = self.inner.cache.clone();
                let fill_key = key.clone();

                // Concurrent misses share one fill call.
                let (call, _) = self.inner.debounce.debounce(
                    &format!("fill {}", key),
                    Duration::ZERO,
                    Instant::now(),
                    move || {
                        async move {
                            let result = dispatch(inner, endpoint, url, options, permit, rate_limit).await;
                            if let Ok(response) = &result {
                                if response.status.is_success() {
                                    cache.set(&fill_key, response.clone(), ttl, max_entries, Instant::now());
                                }
                            }
                            result
                        }
                        .boxed()
                    },
                );
                call.await
            }
        }
    }

    async fn passthrough(
        &self,
        url: &str,
        options: RequestOptions,
        reason: &'static str,
        start: std::time::Instant,
    ) -> CallOutcome {
        let result = self
            .inner
            .transport
            .call(url, options)
            .await
            .map_err(GovernorError::Passthrough);
        metrics::record_call(reason, outcome_label(&result), start);
        result
    }

    fn check_call_volume(&self, endpoint: &EndpointKey, recent: usize, config: &GovernorConfig) {
        if recent > config.emergency_stop_threshold {
            if self.inner.enabled.swap(false, Ordering::SeqCst) {
                self.inner.emergency_stopped.store(true, Ordering::SeqCst);
                tracing::error!(
                    event = "EmergencyStopTriggered",
                    endpoint = %endpoint,
                    calls_last_minute = recent,
                    threshold = config.emergency_stop_threshold,
                    "Runaway call volume, governance disabled for all endpoints until re-enabled"
                );
                metrics::record_emergency_stop();
            }
        } else if self
            .inner
            .tracker
            .flag_excessive(endpoint.as_str(), config.excessive_call_threshold)
        {
            tracing::warn!(
                endpoint = %endpoint,
                calls_last_minute = recent,
                threshold = config.excessive_call_threshold,
                "Excessive call rate"
            );
            metrics::record_excessive(endpoint.as_str());
        }
    }

    // --- Lifecycle ---

    /// Start the maintenance sweep. Idempotent; needs a Tokio runtime.
    pub fn initialize(&self) {
        let mut maintenance = self
            .inner
            .maintenance
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if maintenance.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Governor initialized outside a Tokio runtime, maintenance sweep not started");
            return;
        };
        *maintenance = Some(handle.spawn(run_maintenance(Arc::downgrade(&self.inner))));

        let policy = self.inner.policy.load();
        let config = &policy.config;
        tracing::info!(
            cacheable = config.cacheable_endpoints.len(),
            debounced = config.debounce_endpoints.len(),
            rate_limited = config.rate_limited_endpoints.len(),
            denylisted = config.denylisted_endpoints.len(),
            emergency_stop_threshold = config.emergency_stop_threshold,
            "Request governor initialized"
        );
    }

    /// Stop the maintenance sweep.
    pub fn shutdown(&self) {
        let handle = self
            .inner
            .maintenance
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("Request governor maintenance stopped");
        }
    }

    /// Turn governance off: every call goes straight to the transport.
    pub fn disable(&self) {
        if self.inner.enabled.swap(false, Ordering::SeqCst) {
            tracing::info!("Request governor disabled");
        }
    }

    /// Turn governance back on, re-arming the emergency stop.
    pub fn enable(&self) {
        self.inner.emergency_stopped.store(false, Ordering::SeqCst);
        if !self.inner.enabled.swap(true, Ordering::SeqCst) {
            tracing::info!("Request governor enabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Whether `endpoint` is above the excessive-call threshold right now.
    pub fn is_excessive(&self, endpoint: &EndpointKey) -> bool {
        let threshold = self.inner.policy.load().config.excessive_call_threshold;
        self.inner
            .tracker
            .is_excessive(endpoint.as_str(), threshold, Instant::now())
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        tracing::info!("Response cache cleared");
    }

    /// Close every circuit.
    pub fn reset_circuits(&self) {
        self.inner.circuits.reset();
        tracing::info!("All circuits reset");
    }

    /// Replace the policy. Per-key state (records, circuits, cache) is kept.
    pub fn reconfigure(&self, config: GovernorConfig) -> Result<(), Vec<ValidationError>> {
        validate_governor(&config)?;
        self.inner.policy.store(Arc::new(Policy::new(config)));
        tracing::info!("Request governor reconfigured");
        Ok(())
    }

    pub fn config(&self) -> GovernorConfig {
        self.inner.policy.load().config.clone()
    }

    pub fn stats(&self) -> GovernorStats {
        let now = Instant::now();
        let threshold = self.inner.policy.load().config.excessive_call_threshold;

        GovernorStats {
            enabled: self.is_enabled(),
            emergency_stopped: self.inner.emergency_stopped.load(Ordering::SeqCst),
            active_endpoint_count: self.inner.tracker.active_endpoint_count(),
            total_calls_last_minute: self.inner.tracker.total_recent(now),
            cache_stats: self.inner.cache.stats(),
            excessive_endpoints: self.inner.tracker.excessive_endpoints(threshold, now),
            open_circuits: self.inner.circuits.open_circuits(),
            in_flight_calls: self.inner.debounce.in_flight(),
        }
    }

    /// Drop idle records, settled calls, expired cache entries and clean circuits.
    pub fn sweep(&self) -> SweepReport {
        self.inner.sweep()
    }
}

impl GovernorInner {
    fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        let window = Duration::from_millis(self.policy.load().config.debounce_window_ms);

        let report = SweepReport {
            call_records: self.tracker.collect_garbage(now),
            settled_calls: self.debounce.collect_garbage(window, now),
            cache_entries: self.cache.purge_expired(now),
            circuits: self.circuits.collect_garbage(),
        };
        if report != SweepReport::default() {
            tracing::debug!(?report, "Maintenance sweep");
        }
        report
    }
}

async fn run_maintenance(inner: Weak<GovernorInner>) {
    loop {
        let interval = match inner.upgrade() {
            Some(inner) => Duration::from_secs(inner.policy.load().config.sweep_interval_secs),
            None => break,
        };
        tokio::time::sleep(interval).await;

        match inner.upgrade() {
            Some(inner) => {
                inner.sweep();
            }
            None => break,
        }
    }
}

/// Make the real call for one admitted request and settle its circuit permit.
async fn dispatch(
    inner: Arc<GovernorInner>,
    endpoint: EndpointKey,
    url: String,
    options: RequestOptions,
    permit: CircuitPermit,
    rate_limit: Option<RateLimitConfig>,
) -> CallOutcome {
    let transport = inner.transport.as_ref();

    let result = match rate_limit {
        Some(policy) => {
            let url = url.as_str();
            let options = &options;
            retry_on_throttle(endpoint.as_str(), &policy, move || {
                transport.call(url, options.clone())
            })
            .await
        }
        None => transport.call(&url, options).await.map_err(GovernorError::from),
    };

    match &result {
        Ok(response) if !response.status.is_server_error() => permit.record_success(),
        Ok(response) => {
            tracing::debug!(endpoint = %endpoint, status = %response.status, "Upstream server error");
            permit.record_failure(Instant::now());
        }
        Err(e) => {
            tracing::debug!(endpoint = %endpoint, error = %e, "Governed call failed");
            permit.record_failure(Instant::now());
        }
    }
    result
}

fn outcome_label(result: &CallOutcome) -> &'static str {
    match result {
        Ok(response) if response.status.is_server_error() => "server_error",
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}
