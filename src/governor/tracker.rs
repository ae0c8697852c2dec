//! Sliding-window call tracking per endpoint key.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Width of the sliding window.
pub const CALL_WINDOW: Duration = Duration::from_secs(60);

/// Idle time after which an empty record is dropped.
pub const IDLE_RECORD_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct CallRecord {
    calls: VecDeque<Instant>,
    last_call: Instant,
    flagged: bool,
}

impl CallRecord {
    fn new(now: Instant) -> Self {
        Self {
            calls: VecDeque::new(),
            last_call: now,
            flagged: false,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) > CALL_WINDOW {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }
}

/// An endpoint above the excessive-call threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcessiveEndpoint {
    pub endpoint: String,
    pub calls_last_minute: usize,
}

/// Per-key call timestamps, pruned to the last minute on every access.
#[derive(Debug, Default)]
pub struct CallTracker {
    records: DashMap<String, CallRecord>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call and return the number of calls in the current window,
    /// this one included.
    pub fn track_call(&self, key: &str, now: Instant) -> usize {
        let mut record = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| CallRecord::new(now));
        record.prune(now);
        record.calls.push_back(now);
        record.last_call = now;
        record.calls.len()
    }

    /// Calls to `key` within the window.
    pub fn recent_count(&self, key: &str, now: Instant) -> usize {
        match self.records.get_mut(key) {
            Some(mut record) => {
                record.prune(now);
                record.calls.len()
            }
            None => 0,
        }
    }

    pub fn is_excessive(&self, key: &str, threshold: usize, now: Instant) -> bool {
        self.recent_count(key, now) > threshold
    }

    /// True once per excursion of `key` above `threshold`. The flag is
    /// cleared when the count is back at or below the threshold, so a
    /// lowered threshold or a fresh burst is reported again.
    pub fn flag_excessive(&self, key: &str, threshold: usize) -> bool {
        let Some(mut record) = self.records.get_mut(key) else {
            return false;
        };
        let excessive = record.calls.len() > threshold;
        let newly = excessive && !record.flagged;
        record.flagged = excessive;
        newly
    }

    /// Number of keys currently tracked.
    pub fn active_endpoint_count(&self) -> usize {
        self.records.len()
    }

    /// Calls across all keys within the window.
    pub fn total_recent(&self, now: Instant) -> usize {
        self.records
            .iter_mut()
            .map(|mut r| {
                r.prune(now);
                r.calls.len()
            })
            .sum()
    }

    /// Keys above `threshold`, busiest first.
    pub fn excessive_endpoints(&self, threshold: usize, now: Instant) -> Vec<ExcessiveEndpoint> {
        let mut excessive: Vec<_> = self
            .records
            .iter_mut()
            .filter_map(|mut r| {
                r.prune(now);
                let count = r.calls.len();
                (count > threshold).then(|| ExcessiveEndpoint {
                    endpoint: r.key().clone(),
                    calls_last_minute: count,
                })
            })
            .collect();
        excessive.sort_by(|a, b| {
            b.calls_last_minute
                .cmp(&a.calls_last_minute)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        excessive
    }

    /// Drop records that have been empty and idle for `IDLE_RECORD_TTL`.
    pub fn collect_garbage(&self, now: Instant) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| {
            record.prune(now);
            !record.calls.is_empty()
                || now.saturating_duration_since(record.last_call) < IDLE_RECORD_TTL
        });
        before - self.records.len()
    }

    pub fn clear(&self) {
        self.records.clear();
    }
}
