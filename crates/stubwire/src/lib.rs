//! Deterministic interception and stubbing of HTTP client calls for tests.
//!
//! An [`Interceptor`] replaces an [`HttpClient`]'s transport with a stub
//! adapter. Calls are recorded, matched against stubs in registration
//! order, and answered on a virtual clock that only moves when the test
//! advances it.

pub mod client;
pub mod config;
pub mod interceptor;
pub mod scheduler;
pub mod tracker;

pub use client::{
    Adapter, ClientDefaults, Environment, HttpClient, Outcome, RequestConfig, ResponseFuture,
    TransportError,
};
pub use config::{EngineConfig, StubDefinition};
pub use interceptor::{
    EngineError, InstallGuard, Interceptor, Request, Response, ResponseSpec, Stub, StubFired,
    UrlMatcher,
};
pub use scheduler::{Deferred, Delivery, Scheduler, TimerRecord, Wait};
pub use tracker::{Trackable, Tracker};

/// Install a `tracing` subscriber honoring `RUST_LOG`, writing through the
/// test harness capture. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
