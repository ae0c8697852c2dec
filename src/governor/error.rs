//! Governor error taxonomy.

use std::time::Duration;

use crate::transport::TransportError;

/// Failure of a governed call.
///
/// `Passthrough` carries the transport's own failure unchanged; the other
/// variants are failures the governor introduces itself and never reach the
/// network (circuit open) or only after the retry budget is spent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GovernorError {
    #[error(transparent)]
    Passthrough(#[from] TransportError),

    #[error("circuit open for {endpoint}, retry in {retry_after:?}")]
    CircuitOpen {
        endpoint: String,
        retry_after: Duration,
    },

    #[error("rate limit retries exhausted for {endpoint} after {attempts} attempts")]
    RateLimitExhausted {
        endpoint: String,
        attempts: u32,
        last_status: u16,
    },
}

impl GovernorError {
    /// Stable tag for logs, metrics and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            GovernorError::Passthrough(_) => "passthrough",
            GovernorError::CircuitOpen { .. } => "circuit_open",
            GovernorError::RateLimitExhausted { .. } => "rate_limit_exhausted",
        }
    }

    /// True for failures that originate in the governor rather than the transport.
    pub fn is_governor_failure(&self) -> bool {
        !matches!(self, GovernorError::Passthrough(_))
    }
}
