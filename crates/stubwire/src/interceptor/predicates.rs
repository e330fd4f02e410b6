//! URL and method matching for stubs and tracked requests.
//!
//! Stubs are kept in a plain ordered list and scanned front to back; the
//! first stub whose URL and method both match wins. Registration order is
//! the only tie-break, so no index or hash lookup may replace the scan.

use super::stub::Stub;
use super::types::EngineError;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// How a stub (or a tracker lookup) identifies URLs.
#[derive(Debug, Clone)]
pub enum UrlMatcher {
    /// Exact string equality with the resolved URL
    Exact(String),
    /// Regex that must match somewhere in the resolved URL
    Pattern(Arc<Regex>),
}

impl UrlMatcher {
    pub fn exact(url: impl Into<String>) -> Self {
        UrlMatcher::Exact(url.into())
    }

    pub fn pattern(source: &str) -> Result<Self, EngineError> {
        Ok(UrlMatcher::Pattern(Arc::new(Regex::new(source)?)))
    }

    pub fn is_match(&self, url: &str) -> bool {
        match self {
            UrlMatcher::Exact(expected) => expected == url,
            UrlMatcher::Pattern(regex) => regex.is_match(url),
        }
    }

    /// Exact URL or pattern source
    pub fn as_str(&self) -> &str {
        match self {
            UrlMatcher::Exact(url) => url,
            UrlMatcher::Pattern(regex) => regex.as_str(),
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, UrlMatcher::Pattern(_))
    }

    /// Whether this (stored) matcher answers a lookup by `query`.
    ///
    /// Two exact URLs must be equal, two patterns must share a source, and a
    /// pattern on either side is tested against the other side's exact URL.
    pub fn covers(&self, query: &UrlMatcher) -> bool {
        match (self, query) {
            (UrlMatcher::Exact(stored), UrlMatcher::Exact(wanted)) => stored == wanted,
            (UrlMatcher::Pattern(stored), UrlMatcher::Pattern(wanted)) => {
                stored.as_str() == wanted.as_str()
            }
            (UrlMatcher::Pattern(stored), UrlMatcher::Exact(wanted)) => stored.is_match(wanted),
            (UrlMatcher::Exact(stored), UrlMatcher::Pattern(wanted)) => wanted.is_match(stored),
        }
    }
}

impl PartialEq for UrlMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.is_pattern() == other.is_pattern() && self.as_str() == other.as_str()
    }
}

impl fmt::Display for UrlMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlMatcher::Exact(url) => write!(f, "{url}"),
            UrlMatcher::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl From<&str> for UrlMatcher {
    fn from(url: &str) -> Self {
        UrlMatcher::Exact(url.to_string())
    }
}

impl From<String> for UrlMatcher {
    fn from(url: String) -> Self {
        UrlMatcher::Exact(url)
    }
}

impl From<&String> for UrlMatcher {
    fn from(url: &String) -> Self {
        UrlMatcher::Exact(url.clone())
    }
}

impl From<Regex> for UrlMatcher {
    fn from(regex: Regex) -> Self {
        UrlMatcher::Pattern(Arc::new(regex))
    }
}

/// A missing expected method matches any method; otherwise methods compare
/// case-insensitively.
pub fn method_matches(expected: Option<&str>, actual: &str) -> bool {
    match expected {
        Some(expected) => expected.eq_ignore_ascii_case(actual),
        None => true,
    }
}

pub fn stub_matches(stub: &Stub, method: &str, url: &str) -> bool {
    stub.url().is_match(url) && method_matches(stub.method(), method)
}

/// First stub matching the call, with its registration index.
pub fn find_matching_stub(
    stubs: &[Arc<Stub>],
    method: &str,
    url: &str,
) -> Option<(Arc<Stub>, usize)> {
    for (index, stub) in stubs.iter().enumerate() {
        if stub_matches(stub, method, url) {
            return Some((Arc::clone(stub), index));
        }
    }
    None
}
