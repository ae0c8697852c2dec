//! TTL response cache for idempotent reads.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::transport::Response;

/// A stored response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Response,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Servable until strictly more than `ttl` has passed.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) <= self.ttl
    }
}

/// Cache counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Headers that identify the caller. A request carrying one of them is
/// only shared with other callers when the header is varied on.
pub const CREDENTIAL_HEADERS: [&str; 2] = ["authorization", "cookie"];

/// Build the key for a cacheable or debounceable request.
///
/// Everything that can change the response takes part: method, full path
/// and query, the body, and the values of `vary_headers`. Body and header
/// values are hashed so credentials never sit in the key.
pub fn request_key(
    method: &Method,
    url: &str,
    headers: &HeaderMap,
    body: Option<&Bytes>,
    vary_headers: &[String],
) -> String {
    let mut hasher = DefaultHasher::new();
    let mut varied = false;
    for name in vary_headers {
        for value in headers.get_all(name.as_str()) {
            name.to_ascii_lowercase().hash(&mut hasher);
            value.as_bytes().hash(&mut hasher);
            varied = true;
        }
    }
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        b"body".hash(&mut hasher);
        body.as_ref().hash(&mut hasher);
        varied = true;
    }

    if varied {
        format!("{} {} #{:016x}", method, url, hasher.finish())
    } else {
        format!("{} {}", method, url)
    }
}

/// False when the request carries a credential header that is not varied
/// on, so its response must not be handed to anyone else.
pub fn is_shareable(headers: &HeaderMap, vary_headers: &[String]) -> bool {
    CREDENTIAL_HEADERS.iter().all(|credential| {
        !headers.contains_key(*credential)
            || vary_headers.iter().any(|v| v.eq_ignore_ascii_case(credential))
    })
}

/// Concurrent TTL store with hit/miss accounting and a size bound.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fresh payload for `key`, evicting it if it has expired.
    pub fn get(&self, key: &str, now: Instant) -> Option<Response> {
        let fresh = self.entries.get(key).map(|entry| {
            if entry.is_fresh(now) {
                Some(entry.payload.clone())
            } else {
                None
            }
        });

        match fresh {
            Some(Some(payload)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_event("hit");
                Some(payload)
            }
            Some(None) => {
                self.entries.remove_if(key, |_, entry| !entry.is_fresh(now));
                self.record_miss();
                None
            }
            None => {
                self.record_miss();
                None
            }
        }
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_event("miss");
    }

    /// Store `payload` and schedule its eviction at `ttl`.
    pub fn set(&self, key: &str, payload: Response, ttl: Duration, max_entries: usize, now: Instant) {
        if !self.entries.contains_key(key) && self.entries.len() >= max_entries {
            self.make_room(max_entries, now);
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                payload,
                stored_at: now,
                ttl,
            },
        );
        metrics::record_cache_size(self.entries.len());
        self.schedule_eviction(key.to_string(), now, ttl);
    }

    fn make_room(&self, max_entries: usize, now: Instant) {
        self.purge_expired(now);
        while self.entries.len() >= max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.stored_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    metrics::record_cache_event("evicted");
                }
                None => break,
            }
        }
    }

    fn schedule_eviction(&self, key: String, stored_at: Instant, ttl: Duration) {
        // Without a runtime the entry is still dropped lazily on read or by the sweep.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let entries = Arc::downgrade(&self.entries);
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(entries) = entries.upgrade() {
                // A newer set owns its own timer.
                if entries.remove_if(&key, |_, e| e.stored_at == stored_at).is_some() {
                    metrics::record_cache_event("expired");
                    metrics::record_cache_size(entries.len());
                }
            }
        });
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            metrics::record_cache_size(self.entries.len());
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
        metrics::record_cache_size(0);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn ok(body: &'static str) -> Response {
        Response::new(StatusCode::OK, body)
    }

    #[test]
    fn test_hit_and_expiry() {
        let cache = ResponseCache::new();
        let t0 = Instant::now();
        let ttl = Duration::from_secs(60);

        assert!(cache.get("GET /items/1", t0).is_none());
        cache.set("GET /items/1", ok("one"), ttl, 10, t0);

        assert_eq!(cache.get("GET /items/1", t0 + ttl).unwrap().body, "one");
        assert!(cache.get("GET /items/1", t0 + ttl + Duration::from_millis(1)).is_none());
        assert!(cache.is_empty());

        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 0,
                hits: 1,
                misses: 2,
            }
        );
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let cache = ResponseCache::new();
        let t0 = Instant::now();
        let ttl = Duration::from_secs(60);

        cache.set("a", ok("a"), ttl, 2, t0);
        cache.set("b", ok("b"), ttl, 2, t0 + Duration::from_secs(1));
        cache.set("c", ok("c"), ttl, 2, t0 + Duration::from_secs(2));

        assert_eq!(cache.len(), 2);
        let now = t0 + Duration::from_secs(3);
        assert!(cache.get("a", now).is_none());
        assert!(cache.get("b", now).is_some());
        assert!(cache.get("c", now).is_some());
    }

    #[test]
    fn test_purge_expired() {
        let cache = ResponseCache::new();
        let t0 = Instant::now();
        cache.set("short", ok("s"), Duration::from_secs(1), 10, t0);
        cache.set("long", ok("l"), Duration::from_secs(100), 10, t0);

        assert_eq!(cache.purge_expired(t0 + Duration::from_secs(2)), 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_evicts_at_ttl() {
        let cache = ResponseCache::new();
        cache.set("k", ok("v"), Duration::from_secs(5), 10, Instant::now());
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(cache.is_empty());
    }

    #[test]
    fn test_request_key_varies_on_query_and_headers() {
        let vary = vec!["authorization".to_string()];
        let mut alice = HeaderMap::new();
        alice.insert("authorization", HeaderValue::from_static("Bearer alice"));
        let mut bob = HeaderMap::new();
        bob.insert("authorization", HeaderValue::from_static("Bearer bob"));
        let empty = HeaderMap::new();

        let a = request_key(&Method::GET, "/items?page=1", &alice, None, &vary);
        let b = request_key(&Method::GET, "/items?page=1", &bob, None, &vary);
        let p2 = request_key(&Method::GET, "/items?page=2", &alice, None, &vary);
        assert_ne!(a, b);
        assert_ne!(a, p2);
        assert!(!a.contains("alice"));

        assert_eq!(request_key(&Method::GET, "/items", &empty, None, &vary), "GET /items");
        assert_eq!(request_key(&Method::GET, "/items", &alice, None, &[]), "GET /items");
    }

    #[test]
    fn test_request_key_varies_on_body() {
        let headers = HeaderMap::new();
        let alice = Bytes::from_static(b"email=alice@example.com");
        let bob = Bytes::from_static(b"email=bob@example.com");

        let a = request_key(&Method::POST, "/validate", &headers, Some(&alice), &[]);
        let b = request_key(&Method::POST, "/validate", &headers, Some(&bob), &[]);
        assert_ne!(a, b);
        assert_eq!(a, request_key(&Method::POST, "/validate", &headers, Some(&alice), &[]));
        assert!(!a.contains("alice"));

        let empty = Bytes::new();
        assert_eq!(
            request_key(&Method::POST, "/validate", &headers, Some(&empty), &[]),
            "POST /validate"
        );
    }

    #[test]
    fn test_credentials_are_shareable_only_when_varied() {
        let mut cookie = HeaderMap::new();
        cookie.insert("cookie", HeaderValue::from_static("session=alice"));
        let mut bearer = HeaderMap::new();
        bearer.insert("authorization", HeaderValue::from_static("Bearer alice"));

        assert!(is_shareable(&HeaderMap::new(), &[]));
        assert!(!is_shareable(&cookie, &["authorization".into()]));
        assert!(is_shareable(&cookie, &["Cookie".into()]));
        assert!(!is_shareable(&bearer, &["cookie".into()]));
        assert!(is_shareable(&bearer, &["authorization".into(), "cookie".into()]));
    }
}
