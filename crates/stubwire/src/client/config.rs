//! Request configuration and client defaults.
//!
//! `RequestConfig` is the per-call configuration handed to an adapter.
//! `ClientDefaults` holds the values an `HttpClient` merges into every call
//! before dispatching it.

use http::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a status code fulfills (`true`) or rejects (`false`) a call.
pub type StatusValidator = Arc<dyn Fn(u16) -> bool + Send + Sync>;

/// Custom query-string serializer for request params.
pub type ParamsSerializer = Arc<dyn Fn(&[(String, Value)]) -> String + Send + Sync>;

pub const DEFAULT_XSRF_COOKIE_NAME: &str = "XSRF-TOKEN";
pub const DEFAULT_XSRF_HEADER_NAME: &str = "X-XSRF-TOKEN";

/// Default status policy: any 2xx status fulfills.
pub fn default_validate_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Expected body type of a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    /// String bodies are parsed as JSON when possible (default)
    #[default]
    Json,
    /// Bodies are handed over untouched
    Text,
}

/// Credentials used to derive a basic `Authorization` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Configuration for a single HTTP call.
#[derive(Clone)]
pub struct RequestConfig {
    pub method: Method,
    pub url: String,
    pub base_url: Option<String>,
    pub params: Vec<(String, Value)>,
    pub params_serializer: Option<ParamsSerializer>,
    pub headers: HashMap<String, String>,
    pub data: Option<Value>,
    pub auth: Option<BasicAuth>,
    /// Zero means "no timeout"
    pub timeout: Option<Duration>,
    pub with_credentials: Option<bool>,
    pub response_type: ResponseType,
    pub xsrf_cookie_name: Option<String>,
    pub xsrf_header_name: Option<String>,
    pub validate_status: Option<StatusValidator>,
}

impl RequestConfig {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            base_url: None,
            params: Vec::new(),
            params_serializer: None,
            headers: HashMap::new(),
            data: None,
            auth: None,
            timeout: None,
            with_credentials: None,
            response_type: ResponseType::default(),
            xsrf_cookie_name: None,
            xsrf_header_name: None,
            validate_status: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Append a query parameter. Order of insertion is the serialization order.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn params_serializer<F>(mut self, serializer: F) -> Self
    where
        F: Fn(&[(String, Value)]) -> String + Send + Sync + 'static,
    {
        self.params_serializer = Some(Arc::new(serializer));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = Some(with_credentials);
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn xsrf(mut self, cookie_name: impl Into<String>, header_name: impl Into<String>) -> Self {
        self.xsrf_cookie_name = Some(cookie_name.into());
        self.xsrf_header_name = Some(header_name.into());
        self
    }

    pub fn validate_status<F>(mut self, validator: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Some(Arc::new(validator));
        self
    }

    /// Fill unset fields from client defaults. Explicit per-call values win;
    /// headers are merged with per-call headers overriding defaults.
    pub(crate) fn merge_defaults(mut self, defaults: &ClientDefaults) -> Self {
        if self.base_url.is_none() {
            self.base_url = defaults.base_url.clone();
        }
        if self.timeout.is_none() {
            self.timeout = Some(defaults.timeout);
        }
        if self.with_credentials.is_none() {
            self.with_credentials = Some(defaults.with_credentials);
        }
        if self.xsrf_cookie_name.is_none() {
            self.xsrf_cookie_name = defaults.xsrf_cookie_name.clone();
        }
        if self.xsrf_header_name.is_none() {
            self.xsrf_header_name = defaults.xsrf_header_name.clone();
        }
        if self.validate_status.is_none() {
            self.validate_status = defaults.validate_status.clone();
        }

        let mut headers = defaults.headers.clone();
        headers.extend(self.headers.drain());
        self.headers = headers;
        self
    }

    /// Timeout in whole milliseconds, zero when unset.
    pub fn timeout_ms(&self) -> u128 {
        self.timeout.unwrap_or(Duration::ZERO).as_millis()
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("base_url", &self.base_url)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("data", &self.data)
            .field("auth", &self.auth.as_ref().map(|a| &a.username))
            .field("timeout", &self.timeout)
            .field("with_credentials", &self.with_credentials)
            .field("response_type", &self.response_type)
            .field("custom_serializer", &self.params_serializer.is_some())
            .field("custom_validator", &self.validate_status.is_some())
            .finish()
    }
}

/// Values merged into every call an `HttpClient` dispatches.
#[derive(Clone)]
pub struct ClientDefaults {
    pub base_url: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
    pub with_credentials: bool,
    pub xsrf_cookie_name: Option<String>,
    pub xsrf_header_name: Option<String>,
    pub validate_status: Option<StatusValidator>,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: HashMap::new(),
            timeout: Duration::ZERO,
            with_credentials: false,
            xsrf_cookie_name: Some(DEFAULT_XSRF_COOKIE_NAME.to_string()),
            xsrf_header_name: Some(DEFAULT_XSRF_HEADER_NAME.to_string()),
            validate_status: Some(Arc::new(default_validate_status)),
        }
    }
}

impl fmt::Debug for ClientDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientDefaults")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("with_credentials", &self.with_credentials)
            .field("xsrf_cookie_name", &self.xsrf_cookie_name)
            .field("xsrf_header_name", &self.xsrf_header_name)
            .finish()
    }
}
