//! Minimal HTTP client with a pluggable transport slot.
//!
//! The client owns the request/response shape, the defaults merged into
//! every call, and the settle policy. It never touches the network itself:
//! every call is handed to the installed [`Adapter`], and the stock
//! [`DisconnectedAdapter`] rejects everything with a network error.
//!
//! ## Module Structure
//!
//! - `config`: `RequestConfig`, `ClientDefaults`, status policy
//! - `helpers`: URL building, origin checks, basic auth, cookies
//! - `settle`: `settle`, `TransportError`, error codes

mod config;
mod helpers;
mod settle;

pub use config::{
    default_validate_status, BasicAuth, ClientDefaults, ParamsSerializer, RequestConfig,
    ResponseType, StatusValidator, DEFAULT_XSRF_COOKIE_NAME, DEFAULT_XSRF_HEADER_NAME,
};
pub use helpers::{
    basic_auth_header, build_url, combine_urls, encode, is_absolute_url, is_url_same_origin,
    serialize_params, CookieJar,
};
pub use settle::{settle, Outcome, TransportError, ECONNABORTED, ERR_NETWORK};

use http::Method;
use parking_lot::RwLock;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, trace};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// The transport slot: performs (or fakes) a call and yields its outcome.
pub trait Adapter: Send + Sync {
    fn dispatch(&self, config: RequestConfig) -> ResponseFuture;

    /// Short name used in logs
    fn name(&self) -> &str {
        "adapter"
    }
}

/// Transport used when nothing else is installed. Rejects every call.
#[derive(Debug, Default)]
pub struct DisconnectedAdapter;

impl Adapter for DisconnectedAdapter {
    fn dispatch(&self, config: RequestConfig) -> ResponseFuture {
        debug!(method = %config.method, url = %config.url, "no transport available");
        ResponseFuture::ready(Err(TransportError::new(
            "Network Error",
            config,
            Some(ERR_NETWORK),
            None,
        )))
    }

    fn name(&self) -> &str {
        "disconnected"
    }
}

/// Page context the client runs in: the origin used for same-origin checks
/// and the cookie store XSRF tokens are read from.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub origin: Option<String>,
    pub cookies: Option<Arc<CookieJar>>,
}

enum FutureState {
    Ready(Option<Outcome>),
    Waiting(oneshot::Receiver<Outcome>),
    /// The sending side went away without answering; never completes.
    Abandoned,
}

/// Pending outcome of a dispatched call.
///
/// A call whose continuation is dropped unanswered stays pending forever,
/// the same as a call no stub ever matched.
///
/// Polling this future does not advance the interceptor's virtual clock. A
/// stubbed answer is only delivered once time moves forward, through
/// `Interceptor::wait_for`, `Scheduler::advance` or by awaiting the
/// `Delivery` of a manual `respond_with`. Awaiting a stubbed call before
/// that never completes.
pub struct ResponseFuture {
    state: FutureState,
    response_type: Option<ResponseType>,
}

impl ResponseFuture {
    pub fn ready(outcome: Outcome) -> Self {
        Self {
            state: FutureState::Ready(Some(outcome)),
            response_type: None,
        }
    }

    pub fn pending(receiver: oneshot::Receiver<Outcome>) -> Self {
        Self {
            state: FutureState::Waiting(receiver),
            response_type: None,
        }
    }

    fn with_transform(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    fn finish(&self, outcome: Outcome) -> Outcome {
        match self.response_type {
            Some(response_type) => transform_outcome(outcome, response_type),
            None => outcome,
        }
    }

    /// Take the outcome if it has already been delivered, without blocking.
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        let outcome = match &mut self.state {
            FutureState::Ready(outcome) => outcome.take(),
            FutureState::Waiting(receiver) => match receiver.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.state = FutureState::Abandoned;
                    None
                }
            },
            FutureState::Abandoned => None,
        };
        outcome.map(|o| self.finish(o))
    }
}

impl Future for ResponseFuture {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let polled = match &mut self.state {
            FutureState::Ready(outcome) => match outcome.take() {
                Some(outcome) => Poll::Ready(Some(outcome)),
                None => Poll::Pending,
            },
            FutureState::Waiting(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(Some(outcome)),
                Poll::Ready(Err(_)) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
            FutureState::Abandoned => Poll::Pending,
        };

        match polled {
            Poll::Ready(Some(outcome)) => Poll::Ready(self.finish(outcome)),
            Poll::Ready(None) => {
                trace!("call continuation dropped without an outcome");
                self.state = FutureState::Abandoned;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Parse string bodies as JSON for JSON-typed calls, leaving anything that
/// does not parse untouched.
fn transform_outcome(outcome: Outcome, response_type: ResponseType) -> Outcome {
    if response_type != ResponseType::Json {
        return outcome;
    }
    match outcome {
        Ok(mut response) => {
            parse_json_body(&mut response.data);
            Ok(response)
        }
        Err(mut err) => {
            if let Some(response) = err.response.as_mut() {
                parse_json_body(&mut response.data);
            }
            Err(err)
        }
    }
}

fn parse_json_body(data: &mut Value) {
    if let Value::String(text) = data {
        if let Ok(parsed) = serde_json::from_str::<Value>(text) {
            *data = parsed;
        }
    }
}

struct ClientInner {
    id: u64,
    adapter: RwLock<Arc<dyn Adapter>>,
    defaults: RwLock<ClientDefaults>,
    environment: Environment,
}

/// HTTP client whose transport can be swapped at runtime.
///
/// Clones share the same adapter slot and defaults.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        Self::with_environment(ClientDefaults::default(), Environment::default())
    }

    pub fn with_defaults(defaults: ClientDefaults) -> Self {
        Self::with_environment(defaults, Environment::default())
    }

    pub fn with_environment(defaults: ClientDefaults, environment: Environment) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
                adapter: RwLock::new(Arc::new(DisconnectedAdapter)),
                defaults: RwLock::new(defaults),
                environment,
            }),
        }
    }

    /// Identity shared by all clones of this client
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The currently installed transport
    pub fn adapter(&self) -> Arc<dyn Adapter> {
        Arc::clone(&self.inner.adapter.read())
    }

    /// Replace the transport, returning the previous one
    pub fn set_adapter(&self, adapter: Arc<dyn Adapter>) -> Arc<dyn Adapter> {
        let mut slot = self.inner.adapter.write();
        debug!(from = slot.name(), to = adapter.name(), "swapping client adapter");
        std::mem::replace(&mut *slot, adapter)
    }

    pub fn defaults(&self) -> ClientDefaults {
        self.inner.defaults.read().clone()
    }

    pub fn update_defaults(&self, update: impl FnOnce(&mut ClientDefaults)) {
        update(&mut self.inner.defaults.write());
    }

    pub fn environment(&self) -> &Environment {
        &self.inner.environment
    }

    /// Merge defaults into `config`, resolve the base URL, and dispatch
    /// through the installed adapter.
    pub fn request(&self, config: RequestConfig) -> ResponseFuture {
        let mut config = config.merge_defaults(&self.inner.defaults.read());
        if let Some(base_url) = config.base_url.as_deref() {
            if !is_absolute_url(&config.url) {
                config.url = combine_urls(base_url, &config.url);
            }
        }

        let response_type = config.response_type;
        let adapter = self.adapter();
        trace!(adapter = adapter.name(), method = %config.method, url = %config.url, "dispatching");
        adapter.dispatch(config).with_transform(response_type)
    }

    pub fn get(&self, url: impl Into<String>) -> ResponseFuture {
        self.request(RequestConfig::new(Method::GET, url))
    }

    pub fn delete(&self, url: impl Into<String>) -> ResponseFuture {
        self.request(RequestConfig::new(Method::DELETE, url))
    }

    pub fn head(&self, url: impl Into<String>) -> ResponseFuture {
        self.request(RequestConfig::new(Method::HEAD, url))
    }

    pub fn post(&self, url: impl Into<String>, data: impl Into<Value>) -> ResponseFuture {
        self.request(RequestConfig::new(Method::POST, url).data(data))
    }

    pub fn put(&self, url: impl Into<String>, data: impl Into<Value>) -> ResponseFuture {
        self.request(RequestConfig::new(Method::PUT, url).data(data))
    }

    pub fn patch(&self, url: impl Into<String>, data: impl Into<Value>) -> ResponseFuture {
        self.request(RequestConfig::new(Method::PATCH, url).data(data))
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("id", &self.inner.id)
            .field("adapter", &self.inner.adapter.read().name())
            .finish()
    }
}
