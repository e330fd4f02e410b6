//! HTTP call interception and stubbing.
//!
//! This module provides:
//! - `Interceptor`: install/uninstall against a client, stub registration,
//!   and the `wait` primitives
//! - `MockAdapter`: the transport installed while intercepting
//! - `Request` / `Response`: intercepted calls and the responses built for them
//!
//! Calls with no matching stub are recorded but never settle.
//!
//! ## Module Structure
//!
//! - `types`: `ResponseSpec` and `EngineError`
//! - `predicates`: URL and method matching, first-match stub scan
//! - `stub`: stub definitions and one-shot match signals
//! - `request`: intercepted calls and the respond operations
//! - `response`: synthetic responses
//! - `adapter`: the substitute transport
//! - `core`: `Interceptor` lifecycle and registration

mod adapter;
mod core;
mod predicates;
mod request;
mod response;
mod stub;
mod types;


pub use adapter::MockAdapter;
pub use self::core::{InstallGuard, Interceptor};
pub use predicates::{find_matching_stub, method_matches, stub_matches, UrlMatcher};
pub use request::Request;
pub use response::{normalize_headers, Response};
pub use stub::{Stub, StubFired};
pub use types::{EngineError, ResponseSpec};
