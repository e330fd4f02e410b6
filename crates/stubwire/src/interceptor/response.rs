//! Synthetic responses built from a response spec and the intercepted call.

use super::request::Request;
use super::types::ResponseSpec;
use crate::client::RequestConfig;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Response as the calling code observes it.
#[derive(Debug, Clone)]
pub struct Response {
    pub data: Value,
    pub status: u16,
    pub status_text: Option<String>,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub code: Option<String>,
    pub config: RequestConfig,
    /// The intercepted call this answers
    pub request: Option<Arc<Request>>,
}

impl Response {
    pub(crate) fn synthesize(request: &Arc<Request>, spec: ResponseSpec) -> Self {
        Self {
            data: spec.body(),
            status: spec.status,
            status_text: spec.status_text,
            headers: normalize_headers(spec.headers),
            code: spec.code,
            config: request.config.clone(),
            request: Some(Arc::clone(request)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Body as text, when it is a string
    pub fn text(&self) -> Option<&str> {
        self.data.as_str()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// Lowercase every header name.
///
/// Names that differ only in case collapse to one entry. The value under the
/// name that sorts last byte-wise wins, so `x-id` beats `X-Id`.
pub fn normalize_headers(headers: HashMap<String, String>) -> HashMap<String, String> {
    headers
        .into_iter()
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect()
}
