//! The protocol error taxonomy.
//!
//! Every fallible operation above the JSON-RPC framer returns
//! [`ProtocolError`], a closed sum type that already knows its own
//! JSON-RPC error code and optional structured `data` — there is no
//! separate exception hierarchy to catch and translate at the boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jsonrpc::{codes, JsonRpcErrorObject};

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// The single error type returned by the protocol handler, registry lookups,
/// and the domain-type constructors in [`super::types`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid protocol version: {0}")]
    InvalidProtocolVersion(String),

    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error("invalid mime type: {0}")]
    InvalidMimeType(String),

    #[error("invalid base64 data")]
    InvalidBase64Data,

    #[error("invalid params: {message}")]
    InvalidParams {
        message: String,
        validation_errors: Option<Value>,
    },

    #[error("not found: {what}")]
    NotFound { what: String },

    /// A method was called on a session that hasn't completed `initialize`
    /// yet (or has already left `Ready`). Distinct from [`Self::InvalidParams`]
    /// because it's a protocol-sequencing violation, not a malformed
    /// argument, and the two must map to different JSON-RPC codes.
    #[error("session is not ready: {reason}")]
    SessionNotReady { reason: String },

    #[error("method not found: {method}")]
    MethodNotFound { method: String },

    #[error("capability not negotiated: {capability}")]
    CapabilityNotNegotiated { capability: String },

    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    /// A domain-defined server error in the `-32099..-32000` range, for
    /// callers (components, registration, rate limiting) that need a
    /// specific code/data pair this taxonomy doesn't name directly.
    #[error("server error {code}: {message}")]
    Domain {
        code: i32,
        message: String,
        data: Option<Value>,
    },
}

impl ProtocolError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
            validation_errors: None,
        }
    }

    pub fn invalid_params_with(message: impl Into<String>, validation_errors: Value) -> Self {
        Self::InvalidParams {
            message: message.into(),
            validation_errors: Some(validation_errors),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn session_not_ready(reason: impl Into<String>) -> Self {
        Self::SessionNotReady {
            reason: reason.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The code a catch-all domain failure maps to, per the open-question
    /// resolution recorded in DESIGN.md: not-found -> invalid params with
    /// `data.cause="not_found"`, unauthorized -> auth failure, everything
    /// else domain-specific falls back to internal.
    pub fn to_jsonrpc_code(&self) -> i32 {
        match self {
            ProtocolError::InvalidProtocolVersion(_)
            | ProtocolError::InvalidUri(_)
            | ProtocolError::InvalidMimeType(_)
            | ProtocolError::InvalidBase64Data
            | ProtocolError::InvalidParams { .. }
            | ProtocolError::NotFound { .. } => codes::INVALID_PARAMS,
            ProtocolError::SessionNotReady { .. } => codes::INVALID_REQUEST,
            ProtocolError::MethodNotFound { .. } | ProtocolError::CapabilityNotNegotiated { .. } => {
                codes::METHOD_NOT_FOUND
            }
            ProtocolError::Unauthorized { .. } => codes::AUTHENTICATION_FAILED,
            ProtocolError::Internal(_) => codes::INTERNAL_ERROR,
            ProtocolError::Timeout => codes::INTERNAL_ERROR,
            ProtocolError::Cancelled => codes::REQUEST_CANCELLED,
            ProtocolError::Domain { code, .. } => *code,
        }
    }

    fn data(&self) -> Option<Value> {
        match self {
            ProtocolError::InvalidParams {
                validation_errors, ..
            } => validation_errors
                .clone()
                .map(|v| serde_json::json!({ "validation_errors": v })),
            ProtocolError::NotFound { .. } => Some(serde_json::json!({ "cause": "not_found" })),
            ProtocolError::Timeout => Some(serde_json::json!({ "cause": "timeout" })),
            ProtocolError::Cancelled => Some(serde_json::json!({ "cause": "cancelled" })),
            ProtocolError::Domain { data, .. } => data.clone(),
            _ => None,
        }
    }

    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        let obj = JsonRpcErrorObject::new(self.to_jsonrpc_code(), self.to_string());
        match self.data() {
            Some(data) => obj.with_data(data),
            None => obj,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Internal(err.to_string())
    }
}

/// A JSON-serializable snapshot of a [`ProtocolError`], useful when an error
/// needs to travel through `serde_json::Value` (e.g. as an async job's
/// stored failure record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSnapshot {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

impl From<&ProtocolError> for ErrorSnapshot {
    fn from(err: &ProtocolError) -> Self {
        Self {
            code: err.to_jsonrpc_code(),
            message: err.to_string(),
            data: err.data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_invalid_params_with_cause() {
        let err = ProtocolError::not_found("tool 'x'");
        assert_eq!(err.to_jsonrpc_code(), codes::INVALID_PARAMS);
        let obj = err.to_error_object();
        assert_eq!(obj.data.unwrap()["cause"], "not_found");
    }

    #[test]
    fn unauthorized_maps_to_auth_failed_code() {
        let err = ProtocolError::unauthorized("bad api key");
        assert_eq!(err.to_jsonrpc_code(), codes::AUTHENTICATION_FAILED);
    }

    #[test]
    fn domain_error_keeps_custom_code() {
        let err = ProtocolError::Domain {
            code: -32050,
            message: "rate limited".to_string(),
            data: None,
        };
        assert_eq!(err.to_jsonrpc_code(), -32050);
    }

    #[test]
    fn cancelled_maps_to_its_own_server_error_code_not_internal() {
        let err = ProtocolError::Cancelled;
        assert_eq!(err.to_jsonrpc_code(), codes::REQUEST_CANCELLED);
        assert_ne!(err.to_jsonrpc_code(), ProtocolError::Timeout.to_jsonrpc_code());
        assert!((codes::SERVER_ERROR_MIN..=codes::SERVER_ERROR_MAX).contains(&err.to_jsonrpc_code()));
    }

    #[test]
    fn method_not_found_maps_correctly() {
        let err = ProtocolError::MethodNotFound {
            method: "frobnicate".to_string(),
        };
        assert_eq!(err.to_jsonrpc_code(), codes::METHOD_NOT_FOUND);
    }
}
