//! Endpoint normalization.
//!
//! Maps raw URLs to stable endpoint keys so that `/items/42` and `/items/43`
//! share call records and circuit state.
//!
//! # Rules
//! - Scheme, host, query and fragment are dropped
//! - UUID-shaped and all-digit path segments become `:id`
//! - Output is capped at `MAX_KEY_LEN` bytes, cut on a segment boundary
//! - Absolute URLs that fail to parse fall back to the raw string
//!
//! The output is a fixed point: `normalize(normalize(u)) == normalize(u)`.

use axum::http::Method;
use std::fmt;
use url::Url;

/// Token substituted for entity identifiers.
pub const ID_TOKEN: &str = ":id";

/// Maximum length of a normalized path in bytes.
pub const MAX_KEY_LEN: usize = 200;

const RELATIVE_BASE: &str = "http://governor.invalid";

/// Canonical identifier of a logical API operation: method plus normalized path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey(String);

impl EndpointKey {
    pub fn new(method: &Method, url: &str) -> Self {
        Self(format!("{} {}", method, normalize(url)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a raw URL (absolute or path-only) into an endpoint path.
pub fn normalize(raw: &str) -> String {
    let Some(path) = request_path(raw) else {
        return truncate_raw(raw);
    };

    let normalized = path
        .split('/')
        .map(|segment| if is_identifier(segment) { ID_TOKEN } else { segment })
        .collect::<Vec<_>>()
        .join("/");

    truncate_on_segment(normalized)
}

/// Extract the (percent-encoded) path of a raw URL without touching its segments.
///
/// Returns `None` when the input claims to be an absolute http(s) URL but
/// cannot be parsed.
pub fn request_path(raw: &str) -> Option<String> {
    let url = if has_http_scheme(raw) {
        Url::parse(raw).ok()?
    } else {
        let relative = if raw.starts_with('/') {
            raw.to_string()
        } else {
            format!("/{}", raw)
        };
        Url::parse(&format!("{}{}", RELATIVE_BASE, relative)).ok()?
    };
    Some(url.path().to_string())
}

fn has_http_scheme(raw: &str) -> bool {
    let lower = raw.get(..8).unwrap_or(raw).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_identifier(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if segment.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    // Hyphenated form only; bare 32-hex strings are too often real slugs.
    segment.len() == 36 && uuid::Uuid::try_parse(segment).is_ok()
}

fn truncate_on_segment(path: String) -> String {
    if path.len() <= MAX_KEY_LEN {
        return path;
    }

    let mut cut = MAX_KEY_LEN;
    while !path.is_char_boundary(cut) {
        cut -= 1;
    }
    // A partial segment could look like an ID on the next pass.
    if path.as_bytes().get(cut) != Some(&b'/') {
        cut = path[..cut].rfind('/').unwrap_or(0);
    }

    if cut == 0 {
        "/".to_string()
    } else {
        path[..cut].to_string()
    }
}

fn truncate_raw(raw: &str) -> String {
    let mut cut = raw.len().min(MAX_KEY_LEN);
    while !raw.is_char_boundary(cut) {
        cut -= 1;
    }
    raw[..cut].to_string()
}
