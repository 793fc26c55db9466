//! JSON-RPC 2.0 transport.
//!
//! [`RpcClient`](crate::RpcClient) only needs "send a method call, get its
//! `result` back". [`RpcTransport`] is that seam; [`HttpTransport`] is the
//! production implementation over blocking `reqwest`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::RpcError;

/// Sends one JSON-RPC call and returns its `result` member.
///
/// Implementations must map a JSON-RPC `error` member to
/// [`RpcError::Node`] and transport failures to [`RpcError::Network`].
pub trait RpcTransport {
    fn send(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

impl<T: RpcTransport + ?Sized> RpcTransport for &T {
    fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        (**self).send(method, params)
    }
}

impl<T: RpcTransport + ?Sized> RpcTransport for Box<T> {
    fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        (**self).send(method, params)
    }
}

/// HTTP(S) POST transport for a single endpoint.
pub struct HttpTransport {
    url: String,
    client: reqwest::blocking::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Network(format!("failed to build http client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RpcTransport for HttpTransport {
    fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = request_body(id, method, params);
        debug!(method, id, url = %self.url, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|e| RpcError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::Node {
                code: 429,
                message: "too many requests".into(),
            });
        }
        if !status.is_success() {
            return Err(RpcError::Network(format!("http status {status}")));
        }

        let envelope: Value = response
            .json()
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
        parse_response(envelope)
    }
}

/// Build the JSON-RPC 2.0 request envelope.
pub fn request_body(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

/// Extract `result` from a response envelope, or turn `error` into
/// [`RpcError::Node`].
pub fn parse_response(mut envelope: Value) -> Result<Value, RpcError> {
    if let Some(error) = envelope.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(RpcError::Node { code, message });
    }

    match envelope.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(RpcError::InvalidResponse(
            "response has neither result nor error".into(),
        )),
    }
}
