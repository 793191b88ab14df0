//! Error types for the request layer.
//!
//! # Design
//! `Unauthorized` gets a dedicated variant with a fixed, user-facing message:
//! the server's own 401 body is dropped once the session has been torn down.
//! Every other non-2xx response lands in `Rejected` carrying the server's
//! parsed JSON payload untouched, so callers see exactly what the backend
//! said.

use serde_json::Value;
use thiserror::Error;

/// Message surfaced to callers after a 401 ended the session.
pub const REAUTHENTICATE_MESSAGE: &str = "Please re-authenticate.";

/// Errors returned by `RequestBuilder` and `ApiClient`.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server returned 401. Cache and session were already cleared.
    #[error("Please re-authenticate.")]
    Unauthorized,

    /// The server returned a non-2xx status other than 401.
    #[error("HTTP {status}: {payload}")]
    Rejected { status: u16, payload: Value },

    /// The network round-trip itself failed.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body was not valid JSON or did not match the target type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// The server-provided error payload, if this is a `Rejected` error.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            ApiError::Rejected { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// Errors raised synchronously by `AsyncOperation` on contract misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error(
        "The argument passed to run must be a future. Maybe a function that's passed isn't returning anything?"
    )]
    NotAFuture,

    #[error("run must be called from within a tokio runtime")]
    NoRuntime,
}

/// Errors loading `ClientConfig` from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
