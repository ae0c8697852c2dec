//! Rate-limit retry logic.
//!
//! # Responsibilities
//! - Retry calls the upstream throttled (HTTP 429)
//! - Wait `base * 2^(attempt-1)` between attempts, never less than `Retry-After`
//! - Report an exhausted retry budget as its own error
//!
//! # Design Decisions
//! - Only throttling is retried; transport errors and every other status
//!   return to the caller as-is
//! - Exhaustion is never swallowed

use std::future::Future;
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::governor::error::GovernorError;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::transport::{Response, TransportError};

/// Run `attempt` until it is not throttled or the retry budget is spent.
pub async fn retry_on_throttle<F, Fut>(
    endpoint: &str,
    policy: &RateLimitConfig,
    mut attempt: F,
) -> Result<Response, GovernorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Response, TransportError>>,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let response = attempt().await?;

        if !response.is_throttled() {
            return Ok(response);
        }

        if attempts > policy.max_retries {
            tracing::warn!(
                endpoint = %endpoint,
                attempts,
                "Rate limit retries exhausted"
            );
            return Err(GovernorError::RateLimitExhausted {
                endpoint: endpoint.to_string(),
                attempts,
                last_status: response.status.as_u16(),
            });
        }

        let mut delay = calculate_backoff(
            attempts,
            policy.base_delay_ms,
            policy.max_delay_ms,
            policy.jitter,
        );
        if policy.respect_retry_after {
            if let Some(retry_after) = response.retry_after() {
                delay = delay.max(retry_after.min(Duration::from_millis(policy.max_delay_ms)));
            }
        }

        tracing::info!(endpoint = %endpoint, attempt = attempts, delay = ?delay, "Throttled, backing off");
        metrics::record_backoff_retry();
        tokio::time::sleep(delay).await;
    }
}
