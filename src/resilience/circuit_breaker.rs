//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: endpoint assumed down, requests fail fast
//! - Half-Open: testing if endpoint recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: after reset timeout, on the next call
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - Per-endpoint-key circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering backend)
//! - Only the probe moves an Open/Half-Open circuit; late outcomes of calls
//!   admitted before the circuit opened are counted but change nothing

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// How a call was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Normal,
    Probe,
}

/// Failure state machine for one endpoint.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Admit a call, or return how long until the circuit may probe again.
    pub fn admit(&mut self, reset_timeout: Duration, now: Instant) -> Result<Admission, Duration> {
        match self.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(reset_timeout);
                if elapsed >= reset_timeout {
                    self.state = CircuitState::HalfOpen;
                    self.probe_in_flight = true;
                    Ok(Admission::Probe)
                } else {
                    Err(reset_timeout - elapsed)
                }
            }
            CircuitState::HalfOpen if self.probe_in_flight => Err(Duration::ZERO),
            CircuitState::HalfOpen => {
                self.probe_in_flight = true;
                Ok(Admission::Probe)
            }
        }
    }

    /// Returns the new state if this outcome caused a transition.
    pub fn on_success(&mut self, admission: Admission) -> Option<CircuitState> {
        match (self.state, admission) {
            (CircuitState::Closed, _) => {
                self.failure_count = 0;
                None
            }
            (CircuitState::HalfOpen, Admission::Probe) => {
                self.state = CircuitState::Closed;
                self.failure_count = 0;
                self.opened_at = None;
                self.probe_in_flight = false;
                Some(CircuitState::Closed)
            }
            _ => None,
        }
    }

    /// Returns the new state if this outcome caused a transition.
    pub fn on_failure(&mut self, admission: Admission, threshold: u32, now: Instant) -> Option<CircuitState> {
        self.failure_count = self.failure_count.saturating_add(1);
        match (self.state, admission) {
            (CircuitState::Closed, _) if self.failure_count >= threshold => {
                self.state = CircuitState::Open;
                self.opened_at = Some(now);
                Some(CircuitState::Open)
            }
            (CircuitState::HalfOpen, Admission::Probe) => {
                self.state = CircuitState::Open;
                self.opened_at = Some(now);
                self.probe_in_flight = false;
                Some(CircuitState::Open)
            }
            _ => None,
        }
    }

    /// Free the probe slot when a probe ends without an outcome.
    pub fn release_probe(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.probe_in_flight = false;
        }
    }
}

/// A circuit that is not closed, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub endpoint: String,
    pub state: CircuitState,
    pub failure_count: u32,
}

/// Circuit breakers keyed by endpoint key, created lazily.
#[derive(Debug, Clone, Default)]
pub struct CircuitRegistry {
    circuits: Arc<DashMap<String, CircuitBreaker>>,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a call to `key` or return the remaining cooldown.
    pub fn admit(
        &self,
        key: &str,
        reset_timeout: Duration,
        failure_threshold: u32,
        now: Instant,
    ) -> Result<CircuitPermit, Duration> {
        let admission = {
            let mut breaker = self.circuits.entry(key.to_string()).or_default();
            let was = breaker.state();
            let admission = breaker.admit(reset_timeout, now)?;
            if was == CircuitState::Open {
                tracing::info!(endpoint = %key, "Circuit half-open, admitting probe");
                metrics::record_circuit_transition(CircuitState::HalfOpen.as_str());
            }
            admission
        };

        Ok(CircuitPermit {
            circuits: self.circuits.clone(),
            key: key.to_string(),
            admission,
            failure_threshold,
            settled: false,
        })
    }

    pub fn state(&self, key: &str) -> Option<CircuitState> {
        self.circuits.get(key).map(|b| b.state())
    }

    pub fn failure_count(&self, key: &str) -> u32 {
        self.circuits.get(key).map(|b| b.failure_count()).unwrap_or(0)
    }

    /// Circuits currently open or half-open.
    pub fn open_circuits(&self) -> Vec<CircuitSnapshot> {
        let mut open: Vec<_> = self
            .circuits
            .iter()
            .filter(|b| b.state() != CircuitState::Closed)
            .map(|b| CircuitSnapshot {
                endpoint: b.key().clone(),
                state: b.state(),
                failure_count: b.failure_count(),
            })
            .collect();
        open.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        open
    }

    /// Close every circuit.
    pub fn reset(&self) {
        self.circuits.clear();
    }

    /// Drop closed circuits with no recorded failures.
    pub fn collect_garbage(&self) -> usize {
        let before = self.circuits.len();
        self.circuits
            .retain(|_, b| b.state() != CircuitState::Closed || b.failure_count() > 0);
        before - self.circuits.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }
}

/// Outcome slot for one admitted call.
///
/// Dropping an unsettled probe permit frees the probe slot, so a probe that
/// never reaches the network (cache hit, cancelled caller) does not wedge
/// the circuit in Half-Open.
#[derive(Debug)]
pub struct CircuitPermit {
    circuits: Arc<DashMap<String, CircuitBreaker>>,
    key: String,
    admission: Admission,
    failure_threshold: u32,
    settled: bool,
}

impl CircuitPermit {
    pub fn is_probe(&self) -> bool {
        self.admission == Admission::Probe
    }

    pub fn record_success(mut self) {
        self.settled = true;
        let transition = self
            .circuits
            .get_mut(&self.key)
            .and_then(|mut b| b.on_success(self.admission));
        if transition == Some(CircuitState::Closed) {
            tracing::info!(endpoint = %self.key, "Circuit closed after successful probe");
            metrics::record_circuit_transition(CircuitState::Closed.as_str());
        }
    }

    pub fn record_failure(mut self, now: Instant) {
        self.settled = true;
        let result = self.circuits.get_mut(&self.key).map(|mut b| {
            let transition = b.on_failure(self.admission, self.failure_threshold, now);
            (transition, b.failure_count())
        });
        if let Some((Some(CircuitState::Open), failures)) = result {
            tracing::warn!(
                endpoint = %self.key,
                failures,
                probe = self.is_probe(),
                "Circuit opened"
            );
            metrics::record_circuit_transition(CircuitState::Open.as_str());
        }
    }
}

impl Drop for CircuitPermit {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Probe {
            if let Some(mut breaker) = self.circuits.get_mut(&self.key) {
                breaker.release_probe();
            }
        }
    }
}
