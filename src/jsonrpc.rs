//! JSON-RPC 2.0 message shape carried in request bodies and SSE frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppError, Result};

/// Protocol version tag required on every message.
pub const VERSION: &str = "2.0";

/// Handshake request returning server capabilities.
pub const METHOD_INITIALIZE: &str = "initialize";
/// Handshake-completion notification, answered with `202 Accepted`.
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
/// Tool listing request.
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// Tool invocation request.
pub const METHOD_TOOLS_CALL: &str = "tools/call";
/// Liveness probe.
pub const METHOD_PING: &str = "ping";

/// Method not found.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal handler error.
pub const INTERNAL_ERROR: i64 = -32603;

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC request, notification, or response.
///
/// A message with `method` and `id` is a request; `method` without `id` is a
/// notification; `id` with `result` or `error` is a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Always `"2.0"` on outbound messages.
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    /// Correlation id (number or string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name for requests and notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Successful response payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error response payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

fn default_version() -> String {
    VERSION.to_owned()
}

impl Message {
    /// Parse a request body into a message.
    ///
    /// The body must be a JSON object; the `jsonrpc` tag is not enforced on
    /// inbound traffic.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Json` if the body is not a JSON object.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|err| AppError::Json(format!("invalid body: {err}")))?;
        if !value.is_object() {
            return Err(AppError::Json("body is not a JSON object".into()));
        }
        serde_json::from_value(value).map_err(|err| AppError::Json(format!("invalid message: {err}")))
    }

    /// Build a request.
    #[must_use]
    pub fn request(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: default_version(),
            id: Some(id.into()),
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    /// Build a notification (no id, no response expected).
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: default_version(),
            id: None,
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    /// Build a successful response to the request with `id`.
    #[must_use]
    pub fn response(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response to the request with `id`.
    #[must_use]
    pub fn error_response(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            method: None,
            params: None,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Method name, if this is a request or notification.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Whether the message expects no response.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }
}
