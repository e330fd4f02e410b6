//! Substitute transport installed into the client while intercepting.

use super::core::InterceptorState;
use super::predicates::find_matching_stub;
use super::request::Request;
use crate::client::{Adapter, Environment, RequestConfig, ResponseFuture};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Transport that answers calls from the registered stubs.
pub struct MockAdapter {
    state: Arc<InterceptorState>,
    environment: Environment,
}

impl MockAdapter {
    pub(crate) fn new(state: Arc<InterceptorState>, environment: Environment) -> Self {
        Self { state, environment }
    }
}

impl Adapter for MockAdapter {
    fn dispatch(&self, config: RequestConfig) -> ResponseFuture {
        let (tx, rx) = oneshot::channel();
        let request = Arc::new(Request::intercept(
            config,
            &self.environment,
            tx,
            self.state.scheduler.clone(),
        ));
        self.state.requests.track(Arc::clone(&request));

        let stubs = self.state.stubs.items();
        let Some((stub, index)) = find_matching_stub(&stubs, &request.method, &request.url) else {
            if self.state.config.warn_on_unmatched {
                warn!(method = %request.method, url = %request.url, "no stub matches call, leaving it pending");
            } else {
                debug!(method = %request.method, url = %request.url, "no stub matches call, leaving it pending");
            }
            return ResponseFuture::pending(rx);
        };

        debug!(
            method = %request.method,
            url = %request.url,
            stub_index = index,
            timeout = stub.is_timeout(),
            "stub matched"
        );
        // A fresh request has never been settled, so neither respond can fail.
        let responded = if stub.is_timeout() {
            request.respond_with_timeout()
        } else {
            request.respond_with(stub.response().clone())
        };
        if let Err(err) = responded {
            warn!(error = %err, "failed to respond to intercepted call");
        }
        stub.record_hit();

        ResponseFuture::pending(rx)
    }

    fn name(&self) -> &str {
        "stubwire"
    }
}

impl std::fmt::Debug for MockAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAdapter")
            .field("stubs", &self.state.stubs.count())
            .field("requests", &self.state.requests.count())
            .finish()
    }
}
