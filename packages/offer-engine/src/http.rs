//! PostgREST-style HTTP backend.
//!
//! Procedures go to `POST {base}/rest/v1/rpc/{name}`, table reads to
//! `GET {base}/rest/v1/{table}?{column}=eq.{value}`.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::backend::{BackendError, RemoteBackend};
use crate::config::EngineConfig;
use crate::error::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn is_transient(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn from_config(config: &EngineConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            api_key: config.backend_api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value, BackendError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("{what} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(format!("{what} body read failed: {e}")))?;

        if status.is_success() {
            return Ok(decode_body(&body, what));
        }
        if is_transient(status) {
            return Err(BackendError::Transport(format!("{what} HTTP {status}")));
        }
        Err(remote_error(status, &body))
    }
}

fn decode_body(body: &str, what: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|e| {
        warn!(what, error = %e, "Unparseable response body");
        Value::Null
    })
}

/// PostgREST errors carry `message` and `code`; fall back to the raw body.
fn remote_error(status: reqwest::StatusCode, body: &str) -> BackendError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let message = ["message", "error", "msg"]
        .iter()
        .find_map(|k| parsed.get(k).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| {
            let raw = body.trim();
            if raw.is_empty() {
                format!("HTTP {status}")
            } else {
                raw.to_string()
            }
        });
    let code = parsed.get("code").and_then(|c| match c {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    BackendError::Remote { message, code }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    async fn call(&self, procedure: &str, args: Value) -> Result<Value, BackendError> {
        let url = format!("{}/rest/v1/rpc/{procedure}", self.base_url);
        self.send(self.http.post(&url).json(&args), procedure).await
    }

    async fn select_eq(&self, table: &str, column: &str, value: &str) -> Result<Value, BackendError> {
        let url = format!("{}/rest/v1/{table}", self.base_url);
        let filter = format!("eq.{value}");
        let request = self.http.get(&url).query(&[
            ("select", "*"),
            (column, filter.as_str()),
            ("order", "created_at.desc"),
        ]);
        self.send(request, table).await
    }
}
