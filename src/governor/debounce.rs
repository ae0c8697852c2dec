//! Call coalescing.
//!
//! One real call per key is ever in flight. Callers arriving while it runs,
//! or within `window` of its dispatch, share its outcome, success or error.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::time::Duration;
use tokio::time::Instant;

use crate::governor::error::GovernorError;
use crate::transport::Response;

pub type CallOutcome = Result<Response, GovernorError>;

/// Handle to a dispatched call; every clone resolves to the same outcome.
pub type SharedCall = Shared<BoxFuture<'static, CallOutcome>>;

struct Dispatched {
    call: SharedCall,
    dispatched_at: Instant,
}

impl Dispatched {
    fn is_live(&self, window: Duration, now: Instant) -> bool {
        self.call.peek().is_none() || now.saturating_duration_since(self.dispatched_at) < window
    }
}

/// Whether `debounce` started a new call or attached to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Started,
    Joined,
}

/// Registry of dispatched calls keyed by request key.
#[derive(Default)]
pub struct DebounceRegistry {
    calls: DashMap<String, Dispatched>,
}

impl DebounceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share the live call for `key`, or dispatch a new one built by `start`.
    ///
    /// `start` runs under the key's shard lock, so it must only build the
    /// future, not poll it.
    pub fn debounce<F>(&self, key: &str, window: Duration, now: Instant, start: F) -> (SharedCall, Dispatch)
    where
        F: FnOnce() -> BoxFuture<'static, CallOutcome>,
    {
        match self.calls.entry(key.to_string()) {
            Entry::Occupied(entry) if entry.get().is_live(window, now) => {
                (entry.get().call.clone(), Dispatch::Joined)
            }
            Entry::Occupied(mut entry) => {
                let call = start().shared();
                entry.insert(Dispatched {
                    call: call.clone(),
                    dispatched_at: now,
                });
                (call, Dispatch::Started)
            }
            Entry::Vacant(entry) => {
                let call = start().shared();
                entry.insert(Dispatched {
                    call: call.clone(),
                    dispatched_at: now,
                });
                (call, Dispatch::Started)
            }
        }
    }

    /// Number of calls still running.
    pub fn in_flight(&self) -> usize {
        self.calls.iter().filter(|c| c.call.peek().is_none()).count()
    }

    /// Drop settled calls older than `window`.
    pub fn collect_garbage(&self, window: Duration, now: Instant) -> usize {
        let before = self.calls.len();
        self.calls.retain(|_, c| c.is_live(window, now));
        before - self.calls.len()
    }
}
