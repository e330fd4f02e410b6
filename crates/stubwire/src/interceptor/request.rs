//! Intercepted calls and the respond operations that settle them.

use super::predicates::UrlMatcher;
use super::response::Response;
use super::types::{EngineError, ResponseSpec};
use crate::client::{
    basic_auth_header, build_url, is_url_same_origin, settle, Environment, Outcome, RequestConfig,
    ResponseType, TransportError,
};
use crate::scheduler::{Deferred, Delivery, Scheduler};
use crate::tracker::Trackable;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Snapshot of one outgoing call, taken when the adapter intercepts it.
///
/// Holds the call's single continuation; the first respond operation
/// consumes it and any later attempt fails with
/// [`EngineError::AlreadySettled`].
pub struct Request {
    pub method: String,
    /// Fully resolved URL, query string included
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub with_credentials: bool,
    pub response_type: ResponseType,
    pub config: RequestConfig,
    continuation: Mutex<Option<oneshot::Sender<Outcome>>>,
    scheduler: Scheduler,
}

impl Request {
    pub(crate) fn intercept(
        config: RequestConfig,
        environment: &Environment,
        continuation: oneshot::Sender<Outcome>,
        scheduler: Scheduler,
    ) -> Self {
        let url = build_url(&config.url, &config.params, config.params_serializer.as_ref());
        let with_credentials = config.with_credentials.unwrap_or(false);

        let mut headers = config.headers.clone();
        if let Some(auth) = &config.auth {
            headers.insert(
                "Authorization".to_string(),
                basic_auth_header(&auth.username, &auth.password),
            );
        }
        if let Some((name, token)) = xsrf_header(&config, environment, with_credentials) {
            headers.insert(name, token);
        }

        Self {
            method: config.method.as_str().to_uppercase(),
            url,
            headers,
            timeout: config.timeout,
            with_credentials,
            response_type: config.response_type,
            config,
            continuation: Mutex::new(Some(continuation)),
            scheduler,
        }
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Request body, if one was sent
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.config.data.as_ref()
    }

    pub fn is_settled(&self) -> bool {
        self.continuation.lock().is_none()
    }

    fn take_continuation(&self) -> Result<oneshot::Sender<Outcome>, EngineError> {
        self.continuation
            .lock()
            .take()
            .ok_or_else(|| EngineError::AlreadySettled {
                method: self.method.clone(),
                url: self.url.clone(),
            })
    }

    /// Answer this call with `spec`.
    ///
    /// Delivery happens after the engine delay; at that point the config's
    /// status policy decides whether the caller sees a fulfillment or a
    /// rejection. The returned handle yields the synthesized response.
    pub fn respond_with(self: &Arc<Self>, spec: ResponseSpec) -> Result<Delivery, EngineError> {
        let continuation = self.take_continuation()?;
        let response = Response::synthesize(self, spec);
        debug!(
            method = %self.method,
            url = %self.url,
            status = response.status,
            "responding"
        );

        let delay = self.scheduler.default_delay();
        Ok(Deferred::schedule(&self.scheduler, delay, move || {
            let delivered = response.clone();
            let _ = continuation.send(settle(response, Ok, Err));
            Ok(delivered)
        }))
    }

    /// Answer this call with a timeout error on the rejection path.
    pub fn respond_with_timeout(&self) -> Result<Delivery, EngineError> {
        let continuation = self.take_continuation()?;
        debug!(method = %self.method, url = %self.url, "responding with timeout");

        let error = TransportError::timeout(self.config.clone());
        let delay = self.scheduler.default_delay();
        Ok(Deferred::schedule(&self.scheduler, delay, move || {
            let _ = continuation.send(Err(error.clone()));
            Err(error)
        }))
    }
}

/// XSRF header to attach, if the call is credentialed or same-origin and
/// the cookie jar holds a token.
fn xsrf_header(
    config: &RequestConfig,
    environment: &Environment,
    with_credentials: bool,
) -> Option<(String, String)> {
    let cookies = environment.cookies.as_ref()?;
    if !with_credentials && !is_url_same_origin(&config.url, environment.origin.as_deref()) {
        return None;
    }
    let token = cookies.read(config.xsrf_cookie_name.as_deref()?)?;
    if token.is_empty() {
        return None;
    }
    Some((config.xsrf_header_name.clone()?, token))
}

impl Trackable for Request {
    fn matches(&self, method: &str, url: &UrlMatcher) -> bool {
        self.method.eq_ignore_ascii_case(method) && url.is_match(&self.url)
    }

    fn describe(&self) -> String {
        format!("{}, {}", self.method.to_lowercase(), self.url)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("settled", &self.is_settled())
            .finish()
    }
}
