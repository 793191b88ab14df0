//! Test backend for the request layer.
//!
//! Echoes requests back as JSON, answers arbitrary status codes with JSON
//! error bodies, and guards one bearer-protected endpoint. Every response
//! body is JSON, matching what the client expects from a real backend.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;

/// What `/echo` saw: method, lowercased headers and the JSON body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
}

#[derive(Clone)]
struct AppState {
    token: Arc<String>,
}

pub fn app(token: &str) -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", get(status))
        .route("/me", get(me))
        .with_state(AppState {
            token: Arc::new(token.to_string()),
        })
}

pub async fn run(listener: TcpListener, token: &str) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock server listening");
    }
    axum::serve(listener, app(token)).await
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    Json(Echo {
        method: method.as_str().to_string(),
        headers,
        body: parse_body(&body),
    })
}

async fn status(Path(code): Path<u16>) -> (StatusCode, Json<Value>) {
    let Ok(status) = StatusCode::from_u16(code) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": format!("invalid status code {code}") })),
        );
    };
    let body = if status.is_success() {
        json!({ "status": code })
    } else {
        json!({ "message": status.canonical_reason().unwrap_or("Error") })
    };
    (status, Json(body))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>, (StatusCode, Json<Value>)> {
    let expected = format!("Bearer {}", state.token);
    let authorized = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized" })),
        ));
    }
    Ok(Json(User {
        username: "tester".to_string(),
    }))
}

/// Empty bodies echo as `null`; non-JSON bodies echo as a JSON string.
fn parse_body(body: &str) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
