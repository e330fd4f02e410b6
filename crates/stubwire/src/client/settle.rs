//! Settle policy and transport errors.
//!
//! `settle` is the single place that decides whether a response fulfills or
//! rejects a call. Adapters never hardcode which statuses are errors.

use super::config::RequestConfig;
use crate::interceptor::Response;

/// Connection aborted; used for timeouts.
pub const ECONNABORTED: &str = "ECONNABORTED";
/// No transport available to carry the call.
pub const ERR_NETWORK: &str = "ERR_NETWORK";

/// Final outcome of a call as observed by the caller.
pub type Outcome = Result<Response, TransportError>;

/// Transport-level error delivered through a call's rejection path.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub code: Option<String>,
    pub config: RequestConfig,
    pub response: Option<Box<Response>>,
}

impl TransportError {
    pub fn new(
        message: impl Into<String>,
        config: RequestConfig,
        code: Option<&str>,
        response: Option<Response>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.map(str::to_string),
            config,
            response: response.map(Box::new),
        }
    }

    /// Timeout error for a call configured with `config`.
    pub fn timeout(config: RequestConfig) -> Self {
        let message = format!("timeout of {}ms exceeded", config.timeout_ms());
        Self::new(message, config, Some(ECONNABORTED), None)
    }

    pub fn is_timeout(&self) -> bool {
        self.code.as_deref() == Some(ECONNABORTED)
    }

    /// Status of the attached response, if any.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }
}

/// Invoke `resolve` or `reject` for `response` according to the status
/// policy carried by its config. A config without a validator always resolves.
pub fn settle<T>(
    response: Response,
    resolve: impl FnOnce(Response) -> T,
    reject: impl FnOnce(TransportError) -> T,
) -> T {
    let accepted = match &response.config.validate_status {
        Some(validate) => validate(response.status),
        None => true,
    };

    if accepted {
        resolve(response)
    } else {
        let message = format!("Request failed with status code {}", response.status);
        let config = response.config.clone();
        reject(TransportError::new(message, config, None, Some(response)))
    }
}
