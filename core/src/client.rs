//! Authenticated API client: request shaping, execution and outcome
//! normalization.
//!
//! # Design
//! `ApiClient` owns a `RequestBuilder` plus three shared collaborators: the
//! `Transport` that performs the round-trip, the `SessionStore` and the
//! `QueryCache`. Nothing else is shared between calls. Each `request` makes
//! exactly one round-trip and never retries.
//!
//! A 401 is escalated locally: the cache is invalidated and the session ended
//! before the caller sees `ApiError::Unauthorized`. Every other non-2xx status
//! comes back as `ApiError::Rejected` with the server's JSON payload untouched.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::request::{RequestBuilder, RequestOptions};
use crate::session::{QueryCache, SessionStore};
use crate::transport::{ReqwestTransport, Transport};

const UNAUTHORIZED: u16 = 401;

/// Cache keys to invalidate once a mutating call settles.
///
/// Passed explicitly at each call site; there are no client-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationConfig {
    pub invalidate: Vec<String>,
}

impl MutationConfig {
    pub fn invalidating<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            invalidate: keys.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    builder: RequestBuilder,
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionStore>,
    cache: Arc<dyn QueryCache>,
    default_timeout: Option<Duration>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        transport: Arc<dyn Transport>,
        session: Arc<dyn SessionStore>,
        cache: Arc<dyn QueryCache>,
    ) -> Self {
        Self {
            builder: RequestBuilder::new(base_url),
            transport,
            session,
            cache,
            default_timeout: None,
        }
    }

    /// Client over `ReqwestTransport` using the configured base URL and timeout.
    pub fn from_config(
        config: &ClientConfig,
        session: Arc<dyn SessionStore>,
        cache: Arc<dyn QueryCache>,
    ) -> Self {
        let mut client = Self::new(
            &config.base_url,
            Arc::new(ReqwestTransport::new()),
            session,
            cache,
        );
        client.default_timeout = config.timeout;
        client
    }

    /// Execute one request and normalize its outcome.
    ///
    /// Resolves with the parsed JSON body on 2xx. On 401 the query cache is
    /// invalidated and the session ended, then `ApiError::Unauthorized` is
    /// returned. Any other status yields `ApiError::Rejected` with the parsed
    /// body.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let mut request = self.builder.build(endpoint, &options)?;
        if request.timeout.is_none() {
            request.timeout = self.default_timeout;
        }

        let method = request.method;
        let url = request.url.clone();
        debug!(%method, %url, "sending request");

        let response = self.transport.send(request).await?;
        debug!(%method, %url, status = response.status, "received response");

        if response.status == UNAUTHORIZED {
            warn!(%url, "request unauthorized, ending session");
            self.cache.invalidate_all();
            self.session.end_session();
            return Err(ApiError::Unauthorized);
        }

        let payload = parse_body(&response)?;
        if response.is_success() {
            Ok(payload)
        } else {
            Err(ApiError::Rejected {
                status: response.status,
                payload,
            })
        }
    }

    /// Like `request`, deserializing the success payload into `R`.
    pub async fn request_json<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        let payload = self.request(endpoint, options).await?;
        serde_json::from_value(payload).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Like `request`, taking the bearer token from the session store when
    /// `options` does not carry one.
    pub async fn request_authed(
        &self,
        endpoint: &str,
        mut options: RequestOptions,
    ) -> Result<Value, ApiError> {
        if options.token.is_none() {
            options.token = self.session.token();
        }
        self.request(endpoint, options).await
    }

    /// Run `request`, then invalidate the keys in `config` whether it
    /// succeeded or failed.
    pub async fn mutate(
        &self,
        endpoint: &str,
        options: RequestOptions,
        config: &MutationConfig,
    ) -> Result<Value, ApiError> {
        let result = self.request(endpoint, options).await;
        for key in &config.invalidate {
            self.cache.invalidate(key);
        }
        result
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.builder.base_url())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

/// The backend always answers with JSON; an empty body reads as `null`.
fn parse_body(response: &HttpResponse) -> Result<Value, ApiError> {
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}
