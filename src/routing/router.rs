//! Strategy selection.
//!
//! # Responsibilities
//! - Compile the governor's endpoint lists into matchers
//! - Decide which strategy handles a call
//!
//! # Design Decisions
//! - Immutable after construction; a reconfigure builds a new router
//! - Priority is fixed: denylist, cache, debounce, direct
//! - Cache and debounce only ever share reads; writes always go direct
//! - Rate limiting is orthogonal and wraps whatever real call a strategy makes

use axum::http::Method;

use crate::config::GovernorConfig;
use crate::routing::matcher::{AndMatcher, AnyMatcher, CallTarget, Matcher, ReadMethodMatcher};

/// How a governed call is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from the response cache, filling it on a miss.
    Cache,
    /// Share one in-flight or recent call among identical callers.
    Debounce,
    /// Call the transport directly.
    Direct,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Cache => "cache",
            Strategy::Debounce => "debounce",
            Strategy::Direct => "direct",
        }
    }
}

/// The routing decision for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub strategy: Strategy,
    pub rate_limited: bool,
}

/// Compiled endpoint lists.
#[derive(Debug)]
pub struct EndpointRouter {
    denylist: AnyMatcher,
    cacheable: AndMatcher,
    debounce: AndMatcher,
    rate_limited: AnyMatcher,
}

impl EndpointRouter {
    pub fn from_config(config: &GovernorConfig) -> Self {
        Self {
            denylist: AnyMatcher::prefixes(&config.denylisted_endpoints),
            cacheable: AndMatcher::new(vec![
                Box::new(AnyMatcher::prefixes(&config.cacheable_endpoints)),
                Box::new(ReadMethodMatcher),
            ]),
            debounce: AndMatcher::new(vec![
                Box::new(AnyMatcher::prefixes(&config.debounce_endpoints)),
                Box::new(ReadMethodMatcher),
            ]),
            rate_limited: AnyMatcher::prefixes(&config.rate_limited_endpoints),
        }
    }

    /// Paths that must never be governed.
    pub fn is_denylisted(&self, path: &str) -> bool {
        // Method is irrelevant for the denylist.
        self.denylist.matches(&CallTarget {
            method: &Method::GET,
            path,
        })
    }

    pub fn route(&self, method: &Method, path: &str) -> Route {
        let target = CallTarget { method, path };

        let strategy = if self.cacheable.matches(&target) {
            Strategy::Cache
        } else if self.debounce.matches(&target) {
            Strategy::Debounce
        } else {
            Strategy::Direct
        };

        Route {
            strategy,
            rate_limited: self.rate_limited.matches(&target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> EndpointRouter {
        EndpointRouter::from_config(&GovernorConfig {
            cacheable_endpoints: vec!["/items".into()],
            debounce_endpoints: vec!["/search".into(), "/items".into()],
            rate_limited_endpoints: vec!["/search".into()],
            ..GovernorConfig::default()
        })
    }

    #[test]
    fn test_priority_order() {
        let router = router();
        assert_eq!(router.route(&Method::GET, "/items/1").strategy, Strategy::Cache);
        // Writes are never shared, even on cacheable or debounced prefixes
        assert_eq!(router.route(&Method::POST, "/items").strategy, Strategy::Direct);
        assert_eq!(router.route(&Method::PUT, "/search").strategy, Strategy::Direct);
        assert_eq!(router.route(&Method::HEAD, "/search").strategy, Strategy::Debounce);
        assert_eq!(
            router.route(&Method::GET, "/search"),
            Route {
                strategy: Strategy::Debounce,
                rate_limited: true,
            }
        );
        assert_eq!(
            router.route(&Method::GET, "/cart"),
            Route {
                strategy: Strategy::Direct,
                rate_limited: false,
            }
        );
    }

    #[test]
    fn test_default_denylist() {
        let router = router();
        assert!(router.is_denylisted("/api/config"));
        assert!(router.is_denylisted("/api/config/features"));
        assert!(!router.is_denylisted("/api/items"));
    }
}
