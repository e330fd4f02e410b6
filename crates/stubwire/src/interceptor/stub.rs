//! Stub definitions and their one-shot match signals.

use super::predicates::{method_matches, UrlMatcher};
use super::types::{EngineError, ResponseSpec};
use crate::scheduler::Scheduler;
use crate::tracker::Trackable;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

type SignalResult = Result<(), EngineError>;

/// Sender half of a stub's match signal. Only the first `fire` or `expire`
/// is delivered.
#[derive(Clone)]
pub(crate) struct StubSignal {
    sender: Arc<Mutex<Option<oneshot::Sender<SignalResult>>>>,
}

impl StubSignal {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<SignalResult>) {
        let (tx, rx) = oneshot::channel();
        let signal = Self {
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (signal, rx)
    }

    pub(crate) fn fire(&self) -> bool {
        self.send(Ok(()))
    }

    pub(crate) fn expire(&self) -> bool {
        self.send(Err(EngineError::StubNotCalled))
    }

    fn send(&self, result: SignalResult) -> bool {
        match self.sender.lock().take() {
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    fn is_spent(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// Registered stub: which calls it answers and how.
pub struct Stub {
    url: UrlMatcher,
    method: Option<String>,
    response: ResponseSpec,
    timeout: bool,
    signal: Option<StubSignal>,
    hits: AtomicUsize,
}

impl Stub {
    pub fn new(url: impl Into<UrlMatcher>, method: Option<String>, response: ResponseSpec) -> Self {
        Self {
            url: url.into(),
            method,
            response,
            timeout: false,
            signal: None,
            hits: AtomicUsize::new(0),
        }
    }

    /// Stub that answers matching calls with a timeout instead of a response.
    pub fn timeout(url: impl Into<UrlMatcher>, method: Option<String>) -> Self {
        Self {
            timeout: true,
            ..Self::new(url, method, ResponseSpec::default())
        }
    }

    pub(crate) fn with_signal(mut self, signal: StubSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn url(&self) -> &UrlMatcher {
        &self.url
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn response(&self) -> &ResponseSpec {
        &self.response
    }

    pub fn is_timeout(&self) -> bool {
        self.timeout
    }

    /// Whether a signal is attached (registered via `stub_once` or `stub_failure`)
    pub fn is_signalled(&self) -> bool {
        self.signal.is_some()
    }

    /// Number of calls this stub has answered
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Record a match and fire the signal, if still armed.
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        if let Some(signal) = &self.signal {
            signal.fire();
        }
    }

    /// True once the attached signal has fired or expired.
    pub fn is_spent(&self) -> bool {
        self.signal.as_ref().is_some_and(StubSignal::is_spent)
    }
}

impl Trackable for Stub {
    fn matches(&self, method: &str, url: &UrlMatcher) -> bool {
        method_matches(self.method(), method) && self.url.covers(url)
    }

    fn describe(&self) -> String {
        let method = self.method.as_deref().unwrap_or("any").to_lowercase();
        if self.timeout {
            return format!("{}, {}, timeout", method, self.url);
        }
        let body = match &self.response.response {
            Some(value) => value.to_string(),
            None => "{}".to_string(),
        };
        format!("{}, {}, {}, {}", method, self.url, self.response.status, body)
    }
}

impl std::fmt::Debug for Stub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stub")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("status", &self.response.status)
            .field("timeout", &self.timeout)
            .field("hits", &self.hits())
            .finish()
    }
}

/// Resolves when a signalled stub first answers a call.
///
/// A `stub_failure` handle carries a deadline: awaiting it drives the virtual
/// clock to the end of the failure window, where it rejects with
/// [`EngineError::StubNotCalled`] unless the stub matched first. A
/// `stub_once` handle has no deadline and stays pending until a match.
pub struct StubFired {
    receiver: oneshot::Receiver<SignalResult>,
    stub: Arc<Stub>,
    scheduler: Scheduler,
    deadline: Option<Duration>,
}

impl StubFired {
    pub(crate) fn new(
        receiver: oneshot::Receiver<SignalResult>,
        stub: Arc<Stub>,
        scheduler: Scheduler,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            receiver,
            stub,
            scheduler,
            deadline,
        }
    }

    pub fn stub(&self) -> &Arc<Stub> {
        &self.stub
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Signal result if it has already been delivered, without moving the clock.
    pub fn try_fired(&mut self) -> Option<SignalResult> {
        self.receiver.try_recv().ok()
    }
}

impl Future for StubFired {
    type Output = SignalResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<SignalResult> {
        let this = self.get_mut();
        if let Poll::Ready(Ok(result)) = Pin::new(&mut this.receiver).poll(cx) {
            return Poll::Ready(result);
        }

        let Some(deadline) = this.deadline else {
            return Poll::Pending;
        };
        this.scheduler.advance_to(deadline);
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            _ => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for StubFired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubFired")
            .field("stub", &self.stub)
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signal_delivers_once() {
        let (signal, mut rx) = StubSignal::channel();
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(!signal.expire());
        assert_eq!(rx.try_recv().unwrap(), Ok(()));
    }

    #[test]
    fn test_record_hit_fires_signal() {
        let (signal, rx) = StubSignal::channel();
        let stub = Arc::new(
            Stub::new("/users/1", Some("GET".into()), ResponseSpec::new(200)).with_signal(signal),
        );
        let mut fired = StubFired::new(rx, Arc::clone(&stub), Scheduler::default(), None);
        assert!(fired.try_fired().is_none());
        assert!(!stub.is_spent());

        stub.record_hit();
        stub.record_hit();
        assert_eq!(stub.hits(), 2);
        assert!(stub.is_spent());
        assert_eq!(fired.try_fired(), Some(Ok(())));
    }

    #[tokio::test]
    async fn test_deadline_drives_expiry() {
        let scheduler = Scheduler::default();
        let (signal, rx) = StubSignal::channel();
        let stub = Arc::new(Stub::new("/x", None, ResponseSpec::new(200)).with_signal(signal.clone()));
        let timer = scheduler.schedule(Duration::from_millis(500), move || {
            signal.expire();
        });

        let fired = StubFired::new(rx, stub, scheduler.clone(), Some(timer.deadline));
        assert_eq!(fired.await, Err(EngineError::StubNotCalled));
        assert_eq!(scheduler.now(), Duration::from_millis(500));
    }

    #[test]
    fn test_trackable_lookup() {
        let stub = Stub::new("/users/1", Some("PUT".into()), ResponseSpec::new(200));
        assert!(stub.matches("put", &"/users/1".into()));
        assert!(!stub.matches("GET", &"/users/1".into()));

        let any_method = Stub::new(
            UrlMatcher::pattern(r"/users/\d+").unwrap(),
            None,
            ResponseSpec::new(200),
        );
        assert!(any_method.matches("DELETE", &"/users/7".into()));
    }

    #[test]
    fn test_describe() {
        let stub = Stub::new(
            "/users/1",
            Some("PUT".into()),
            ResponseSpec::new(200).json(json!({"id": 1})),
        );
        assert_eq!(stub.describe(), r#"put, /users/1, 200, {"id":1}"#);

        let bare = Stub::new("/x", None, ResponseSpec::new(204));
        assert_eq!(bare.describe(), "any, /x, 204, {}");

        let timeout = Stub::timeout("/slow", Some("GET".into()));
        assert_eq!(timeout.describe(), "get, /slow, timeout");
    }
}
