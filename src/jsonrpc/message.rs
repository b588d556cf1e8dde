//! Core JSON-RPC 2.0 message types.
//!
//! These mirror the wire format exactly: a request carries a method and an
//! id, a notification carries a method and no id, a response carries
//! exactly one of `result`/`error` plus the echoed id.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait for JSON-RPC message (de)serialization, shared across request,
/// response and notification so callers don't special-case each type.
pub trait JsonRpcMessage: Serialize + for<'de> Deserialize<'de> + Sized {
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A JSON-RPC request identifier: either a string or a number.
///
/// Per JSON-RPC 2.0, `id` may also be `null`, which here is modeled by the
/// absence of an id altogether (see [`JsonRpcNotification`]) rather than a
/// third variant, since a null-id request is only ever seen on parse-error
/// responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl RequestId {
    pub fn new_string(id: impl Into<String>) -> Self {
        RequestId::String(id.into())
    }

    pub fn new_number(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
        }
    }
}

/// JSON-RPC 2.0 request: invokes `method` and expects a response keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

impl JsonRpcMessage for JsonRpcRequest {}

/// JSON-RPC 2.0 response: exactly one of `result`/`error`, echoing the
/// request's id (or `None` for a parse error, which has no request to echo).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    pub fn error(error: JsonRpcErrorObject, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

impl JsonRpcMessage for JsonRpcResponse {}

/// JSON-RPC 2.0 notification: `method` with no `id`, fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

impl JsonRpcMessage for JsonRpcNotification {}

/// The JSON-RPC 2.0 error object embedded in an error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trips() {
        let request = JsonRpcRequest::new(
            "tools/call",
            Some(json!({"name": "echo"})),
            RequestId::new_string("req-1"),
        );
        let json = request.to_json().unwrap();
        let parsed = JsonRpcRequest::from_json(&json).unwrap();
        assert_eq!(request, parsed);
    }

    #[test]
    fn response_is_mutually_exclusive() {
        let ok = JsonRpcResponse::success(json!("pong"), RequestId::new_number(1));
        assert!(ok.result.is_some() && ok.error.is_none());

        let err = JsonRpcResponse::error(
            JsonRpcErrorObject::new(-32601, "method not found"),
            Some(RequestId::new_number(1)),
        );
        assert!(err.result.is_none() && err.error.is_some());
    }

    #[test]
    fn notification_has_no_id_field() {
        let notification = JsonRpcNotification::new("notifications/progress", None);
        let json = notification.to_json().unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn numeric_and_string_ids_serialize_bare() {
        assert_eq!(serde_json::to_string(&RequestId::new_number(42)).unwrap(), "42");
        assert_eq!(
            serde_json::to_string(&RequestId::new_string("abc")).unwrap(),
            "\"abc\""
        );
    }
}
