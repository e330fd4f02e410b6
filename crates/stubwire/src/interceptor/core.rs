//! The interceptor: lifecycle, stub registration, and scheduling.

use super::adapter::MockAdapter;
use super::predicates::UrlMatcher;
use super::request::Request;
use super::stub::{Stub, StubFired, StubSignal};
use super::types::{EngineError, ResponseSpec};
use crate::client::{Adapter, HttpClient};
use crate::config::EngineConfig;
use crate::scheduler::{Deferred, Scheduler, TimerRecord, Wait};
use crate::tracker::Tracker;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The adapter a client had before installation.
struct Installation {
    client_id: u64,
    default_adapter: Arc<dyn Adapter>,
}

/// State shared between an [`Interceptor`] and the adapter it installs.
pub(crate) struct InterceptorState {
    pub(crate) config: EngineConfig,
    pub(crate) stubs: Tracker<Stub>,
    pub(crate) requests: Tracker<Request>,
    pub(crate) scheduler: Scheduler,
    installation: Mutex<Option<Installation>>,
}

/// Intercepts calls made through an [`HttpClient`] and answers them from
/// registered stubs on a virtual clock.
///
/// Clones share the same trackers, scheduler and installation.
///
/// # Example
///
/// ```
/// use stubwire::{HttpClient, Interceptor, ResponseSpec};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let client = HttpClient::new();
/// let interceptor = Interceptor::new();
/// interceptor.install(&client).unwrap();
///
/// interceptor.stub_request("/users/1", ResponseSpec::new(200).json(json!({"id": 1})));
/// let call = client.get("/users/1");
/// // Awaiting `call` alone never advances the virtual clock.
/// interceptor.wait_for(None).await;
///
/// let response = call.await.unwrap();
/// assert_eq!(response.data["id"], 1);
/// interceptor.uninstall(&client).unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct Interceptor {
    state: Arc<InterceptorState>,
}

impl Default for Interceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor {
    pub fn new() -> Self {
        Self::from_state(EngineConfig::default())
    }

    /// Build an interceptor from configuration, registering its stubs.
    ///
    /// The configured stubs are registered again after every
    /// [`uninstall`](Self::uninstall).
    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        let interceptor = Self::from_state(config);
        interceptor.register_presets()?;
        Ok(interceptor)
    }

    fn register_presets(&self) -> Result<(), EngineError> {
        let stubs = self
            .state
            .config
            .stubs
            .iter()
            .map(|definition| definition.to_stub())
            .collect::<Result<Vec<_>, _>>()?;
        for stub in stubs {
            self.track_stub(stub);
        }
        Ok(())
    }

    fn from_state(config: EngineConfig) -> Self {
        let scheduler = Scheduler::new(config.delay());
        Self {
            state: Arc::new(InterceptorState {
                config,
                stubs: Tracker::new("stubs"),
                requests: Tracker::new("requests"),
                scheduler,
                installation: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    /// Registered stubs, in registration order
    pub fn stubs(&self) -> &Tracker<Stub> {
        &self.state.stubs
    }

    /// Intercepted calls, in interception order
    pub fn requests(&self) -> &Tracker<Request> {
        &self.state.requests
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.state.scheduler
    }

    /// Delay applied to deliveries and to `wait` calls without their own
    pub fn delay(&self) -> Duration {
        self.state.scheduler.default_delay()
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.scheduler.set_default_delay(delay);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Swap the client's transport for the stub adapter, saving the previous
    /// one for [`uninstall`](Self::uninstall).
    pub fn install(&self, client: &HttpClient) -> Result<(), EngineError> {
        let mut installation = self.state.installation.lock();
        if let Some(existing) = installation.as_ref() {
            return Err(EngineError::AlreadyInstalled(existing.client_id));
        }

        let adapter = MockAdapter::new(Arc::clone(&self.state), client.environment().clone());
        let default_adapter = client.set_adapter(Arc::new(adapter));
        info!(
            client = client.id(),
            saved = default_adapter.name(),
            "interceptor installed"
        );
        *installation = Some(Installation {
            client_id: client.id(),
            default_adapter,
        });
        Ok(())
    }

    /// Restore the saved transport and clear both trackers. Stubs from the
    /// configuration are registered again.
    pub fn uninstall(&self, client: &HttpClient) -> Result<(), EngineError> {
        let mut installation = self.state.installation.lock();
        let current = installation.take();
        match current {
            None => Err(EngineError::NotInstalled),
            Some(saved) if saved.client_id != client.id() => {
                let installed = saved.client_id;
                *installation = Some(saved);
                Err(EngineError::ForeignClient {
                    installed,
                    requested: client.id(),
                })
            }
            Some(saved) => {
                client.set_adapter(saved.default_adapter);
                drop(installation);

                self.state.stubs.reset();
                self.state.requests.reset();
                if let Err(err) = self.register_presets() {
                    warn!(error = %err, "could not restore configured stubs");
                }
                info!(client = client.id(), "interceptor uninstalled");
                Ok(())
            }
        }
    }

    pub fn is_installed(&self) -> bool {
        self.state.installation.lock().is_some()
    }

    /// Install and return a guard that uninstalls when dropped.
    pub fn install_scoped(&self, client: &HttpClient) -> Result<InstallGuard, EngineError> {
        self.install(client)?;
        Ok(InstallGuard {
            interceptor: self.clone(),
            client: client.clone(),
            armed: true,
        })
    }

    /// Run `f` with the interceptor installed, uninstalling afterwards even
    /// if `f` panics.
    pub fn with_mock<R>(
        &self,
        client: &HttpClient,
        f: impl FnOnce(&Interceptor) -> R,
    ) -> Result<R, EngineError> {
        let guard = self.install_scoped(client)?;
        let result = f(self);
        guard.finish()?;
        Ok(result)
    }

    /// Async form of [`with_mock`](Self::with_mock).
    pub async fn with_mock_async<F, Fut, R>(
        &self,
        client: &HttpClient,
        f: F,
    ) -> Result<R, EngineError>
    where
        F: FnOnce(Interceptor) -> Fut,
        Fut: Future<Output = R>,
    {
        let guard = self.install_scoped(client)?;
        let result = f(self.clone()).await;
        guard.finish()?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Stub registration
    // ------------------------------------------------------------------

    fn track_stub(&self, stub: Stub) -> Arc<Stub> {
        debug!(
            method = stub.method().unwrap_or("*"),
            url = %stub.url(),
            timeout = stub.is_timeout(),
            "stub registered"
        );
        self.state.stubs.track(stub)
    }

    /// Answer calls to `url` with any method.
    pub fn stub_request(&self, url: impl Into<UrlMatcher>, response: ResponseSpec) -> Arc<Stub> {
        self.track_stub(Stub::new(url, None, response))
    }

    /// Answer `method` calls to `url`.
    pub fn stub_request_for(
        &self,
        method: &str,
        url: impl Into<UrlMatcher>,
        response: ResponseSpec,
    ) -> Arc<Stub> {
        self.track_stub(Stub::new(url, Some(method.to_uppercase()), response))
    }

    /// Register a stub and get a handle that resolves the first time it
    /// answers a call.
    ///
    /// The stub stays registered afterwards and keeps answering.
    pub fn stub_once(
        &self,
        method: &str,
        url: impl Into<UrlMatcher>,
        response: ResponseSpec,
    ) -> StubFired {
        let (signal, receiver) = StubSignal::channel();
        let stub = self.track_stub(
            Stub::new(url, Some(method.to_uppercase()), response).with_signal(signal),
        );
        StubFired::new(receiver, stub, self.state.scheduler.clone(), None)
    }

    /// Like [`stub_once`](Self::stub_once), but the handle fails with
    /// [`EngineError::StubNotCalled`] if no call matches within the failure
    /// window.
    pub fn stub_failure(
        &self,
        method: &str,
        url: impl Into<UrlMatcher>,
        response: ResponseSpec,
    ) -> StubFired {
        let (signal, receiver) = StubSignal::channel();
        let stub = self.track_stub(
            Stub::new(url, Some(method.to_uppercase()), response).with_signal(signal.clone()),
        );

        let description = format!("{} {}", method.to_uppercase(), stub.url());
        let window = self.state.config.failure_window();
        let timer = self.state.scheduler.schedule(window, move || {
            if signal.expire() {
                warn!(stub = %description, "stub was not called within the failure window");
            }
        });
        StubFired::new(
            receiver,
            stub,
            self.state.scheduler.clone(),
            Some(timer.deadline),
        )
    }

    /// Answer calls to `url` with any method by timing out.
    pub fn stub_timeout(&self, url: impl Into<UrlMatcher>) -> Arc<Stub> {
        self.track_stub(Stub::timeout(url, None))
    }

    pub fn stub_timeout_for(&self, method: &str, url: impl Into<UrlMatcher>) -> Arc<Stub> {
        self.track_stub(Stub::timeout(url, Some(method.to_uppercase())))
    }

    // ------------------------------------------------------------------
    // Waiting
    // ------------------------------------------------------------------

    /// Run `callback` once `delay` (or the default delay) of virtual time has
    /// passed.
    pub fn wait<F>(&self, callback: F, delay: Option<Duration>) -> TimerRecord
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = delay.unwrap_or_else(|| self.delay());
        self.state.scheduler.schedule(delay, callback)
    }

    /// Awaitable form of [`wait`](Self::wait). Awaiting drives the virtual
    /// clock to the deadline, delivering everything due before it.
    pub fn wait_for(&self, delay: Option<Duration>) -> Wait {
        let delay = delay.unwrap_or_else(|| self.delay());
        Deferred::schedule(&self.state.scheduler, delay, || ())
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("installed", &self.is_installed())
            .field("stubs", &self.state.stubs.count())
            .field("requests", &self.state.requests.count())
            .field("scheduler", &self.state.scheduler)
            .finish()
    }
}

/// Uninstalls its interceptor when dropped.
pub struct InstallGuard {
    interceptor: Interceptor,
    client: HttpClient,
    armed: bool,
}

impl InstallGuard {
    /// Uninstall now, reporting any error.
    pub fn finish(mut self) -> Result<(), EngineError> {
        self.armed = false;
        self.interceptor.uninstall(&self.client)
    }
}

impl Drop for InstallGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = self.interceptor.uninstall(&self.client) {
                warn!(error = %err, "failed to uninstall interceptor on drop");
            }
        }
    }
}

impl std::fmt::Debug for InstallGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallGuard")
            .field("client", &self.client.id())
            .field("armed", &self.armed)
            .finish()
    }
}
