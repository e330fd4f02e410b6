//! Stub definitions loaded from configuration files.

use crate::interceptor::{EngineError, ResponseSpec, Stub, UrlMatcher};
use serde::{Deserialize, Serialize};

/// Stub registered when an interceptor is built from configuration.
///
/// Exactly one of `url` and `pattern` must be set.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StubDefinition {
    /// Exact URL to match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Regex matched anywhere in the URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Restrict to one method; any method when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Answer with a timeout instead of `response`
    #[serde(default)]
    pub timeout: bool,
    #[serde(default)]
    pub response: ResponseSpec,
}

impl StubDefinition {
    pub fn matcher(&self) -> Result<UrlMatcher, EngineError> {
        match (&self.url, &self.pattern) {
            (Some(url), _) => Ok(UrlMatcher::exact(url.as_str())),
            (None, Some(pattern)) => UrlMatcher::pattern(pattern),
            // validate() rejects this shape before stubs are built
            (None, None) => Ok(UrlMatcher::exact("")),
        }
    }

    pub fn to_stub(&self) -> Result<Stub, EngineError> {
        let url = self.matcher()?;
        let method = self.method.as_ref().map(|m| m.to_uppercase());
        if self.timeout {
            Ok(Stub::timeout(url, method))
        } else {
            Ok(Stub::new(url, method, self.response.clone()))
        }
    }

    /// Human-readable identifier used in validation errors
    pub fn label(&self) -> String {
        let method = self.method.as_deref().unwrap_or("*");
        match (&self.url, &self.pattern) {
            (Some(url), _) => format!("{method} {url}"),
            (None, Some(pattern)) => format!("{method} /{pattern}/"),
            (None, None) => format!("{method} <no url>"),
        }
    }
}
