//! Pure request shaping: endpoint + options in, `HttpRequest` out.
//!
//! # Design
//! `RequestBuilder` holds only a `base_url` and never performs I/O, so the
//! same endpoint and options always produce the same descriptor. Defaults
//! are computed first and caller-supplied headers are layered on top, which
//! lets a caller replace `content-type` or any other computed header.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, RequestMode};

/// Per-call options for `RequestBuilder::build` and `ApiClient::request`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// JSON payload. Its presence switches the default method to `POST`.
    pub data: Option<Value>,
    /// Bearer credential, forwarded as-is.
    pub token: Option<String>,
    /// Explicit method; always wins over the computed default.
    pub method: Option<HttpMethod>,
    /// Merged over computed headers, caller wins.
    pub headers: Vec<(String, String)>,
    pub mode: Option<RequestMode>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `data` into the JSON payload.
    pub fn data<T: Serialize + ?Sized>(self, data: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(data).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(self.json(value))
    }

    pub fn json(mut self, value: Value) -> Self {
        self.data = Some(value);
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Turns an endpoint and `RequestOptions` into a fully resolved `HttpRequest`.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
}

impl RequestBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve method, headers and body for `endpoint`.
    ///
    /// `endpoint` is relative to the base URL; absolute URLs are not supported.
    pub fn build(&self, endpoint: &str, options: &RequestOptions) -> Result<HttpRequest, ApiError> {
        let body = options
            .data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::Serialization(e.to_string()))?;

        let method = options.method.unwrap_or(if body.is_some() {
            HttpMethod::Post
        } else {
            HttpMethod::Get
        });

        let mut headers = Vec::new();
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        if let Some(token) = &options.token {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        for (name, value) in &options.headers {
            set_header(&mut headers, name, value);
        }

        Ok(HttpRequest {
            method,
            url: format!("{}/{}", self.base_url, endpoint.trim_start_matches('/')),
            headers,
            body,
            mode: options.mode,
            timeout: options.timeout,
        })
    }
}

/// Replace a header case-insensitively, or append it.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
        Some(existing) => *existing = (name.to_string(), value.to_string()),
        None => headers.push((name.to_string(), value.to_string())),
    }
}
