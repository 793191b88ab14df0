//! Client-side request layer: request shaping, an authenticated API client
//! and a lifecycle controller for in-flight async actions.
//!
//! # Overview
//! `RequestBuilder` turns an endpoint plus `RequestOptions` into an
//! `HttpRequest` without touching the network. `ApiClient` executes that
//! descriptor through a `Transport`, normalizes the outcome and tears the
//! session down on a 401. `AsyncOperation` wraps any such call and exposes a
//! race-free view of its status to a view layer.
//!
//! # Design
//! - Request shaping is pure; the only I/O seam is the `Transport` trait.
//! - The session store and query cache are outward traits, invoked only on 401
//!   or by explicit per-call `MutationConfig`.
//! - `AsyncOperation` never writes state after teardown and never surfaces
//!   such suppressed writes.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod operation;
pub mod request;
pub mod session;
pub mod transport;

pub use client::{ApiClient, MutationConfig};
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, OperationError, REAUTHENTICATE_MESSAGE};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestMode};
pub use operation::{AsyncOperation, OperationState, RunHandle, Status};
pub use request::{RequestBuilder, RequestOptions};
pub use session::{MemorySession, NoopCache, QueryCache, SessionStore};
pub use transport::{ReqwestTransport, Transport};
