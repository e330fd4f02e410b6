//! Type definitions shared across the interceptor: the canned response
//! definition stubs answer with, and the engine error type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Response Definition
// ============================================================================

pub(crate) fn default_status() -> u16 {
    200
}

/// Canned response a stub (or a manual `respond_with`) answers with.
///
/// A non-empty `response_text` takes precedence over `response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSpec {
    #[serde(default = "default_status")]
    pub status: u16,
    /// Structured body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// Raw body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Transport-level error code attached to the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Default for ResponseSpec {
    fn default() -> Self {
        Self::new(default_status())
    }
}

impl ResponseSpec {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            response: None,
            response_text: None,
            headers: HashMap::new(),
            status_text: None,
            code: None,
        }
    }

    pub fn json(mut self, body: impl Into<serde_json::Value>) -> Self {
        self.response = Some(body.into());
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.response_text = Some(body.into());
        self
    }

    /// Set a header, replacing any earlier one whose name differs only in case.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    pub fn status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = Some(status_text.into());
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Body as the caller will see it: non-empty text wins, then the
    /// structured value, then null. Empty text counts as unset.
    pub fn body(&self) -> serde_json::Value {
        let text = self.response_text.as_deref().filter(|text| !text.is_empty());
        match (text, &self.response) {
            (Some(text), _) => serde_json::Value::String(text.to_string()),
            (None, Some(value)) => value.clone(),
            (None, None) => serde_json::Value::Null,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the interceptor for programmer mistakes and by
/// `stub_failure` signals.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Interceptor is already installed on client {0}")]
    AlreadyInstalled(u64),
    #[error("Interceptor is not installed")]
    NotInstalled,
    #[error("Interceptor is installed on client {installed}, not client {requested}")]
    ForeignClient { installed: u64, requested: u64 },
    #[error("Request {method} {url} has already been settled")]
    AlreadySettled { method: String, url: String },
    #[error("Nothing tracked matches {method} {url}")]
    NotTracked { method: String, url: String },
    #[error("Timeout: Stub function not called.")]
    StubNotCalled,
    #[error("Invalid URL pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
