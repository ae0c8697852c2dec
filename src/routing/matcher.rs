//! Endpoint matching logic.
//!
//! # Responsibilities
//! - Match request path prefixes (case-sensitive)
//! - Match pure-read methods
//! - Combine conditions with AND / OR semantics
//!
//! # Design Decisions
//! - Paths are matched before ID normalization, so `/items` covers `/items/42`
//! - No regex to guarantee O(n) matching
//! - An empty `AnyMatcher` matches nothing

use axum::http::Method;

/// What a matcher sees of an outbound call.
#[derive(Debug, Clone, Copy)]
pub struct CallTarget<'a> {
    pub method: &'a Method,
    pub path: &'a str,
}

/// Trait for matching calls against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the call matches this condition.
    fn matches(&self, target: &CallTarget<'_>) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, target: &CallTarget<'_>) -> bool {
        target.path.starts_with(&self.prefix)
    }
}

/// Matches idempotent read methods (GET, HEAD).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadMethodMatcher;

impl Matcher for ReadMethodMatcher {
    fn matches(&self, target: &CallTarget<'_>) -> bool {
        *target.method == Method::GET || *target.method == Method::HEAD
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, target: &CallTarget<'_>) -> bool {
        self.matchers.iter().all(|m| m.matches(target))
    }
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// One prefix matcher per configured prefix.
    pub fn prefixes(prefixes: &[String]) -> Self {
        Self::new(
            prefixes
                .iter()
                .map(|p| Box::new(PathPrefixMatcher::new(p.clone())) as Box<dyn Matcher>)
                .collect(),
        )
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, target: &CallTarget<'_>) -> bool {
        self.matchers.iter().any(|m| m.matches(target))
    }
}
