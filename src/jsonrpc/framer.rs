//! JSON-RPC 2.0 framer: turns raw bytes into a [`DecodedMessage`] and turns
//! handler output back into well-formed responses, enforcing JSON-RPC 2.0's
//! framing rules (single message, notification, or batch).

use serde_json::Value;

use super::message::{JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest, RequestId};

/// Standard JSON-RPC 2.0 error codes, plus the server-error range this
/// runtime reserves specific meanings within.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Authentication failure (reserved within the server-error range).
    pub const AUTHENTICATION_FAILED: i32 = -32001;
    /// A request was cancelled via `$/cancelRequest` before it completed
    /// (reserved within the server-error range).
    pub const REQUEST_CANCELLED: i32 = -32000;
    /// Lower/upper bounds of the server-error range.
    pub const SERVER_ERROR_MIN: i32 = -32099;
    pub const SERVER_ERROR_MAX: i32 = -32000;
}

/// One decoded unit of work: a request awaiting a response, a fire-and-forget
/// notification, or a batch mixing both.
#[derive(Debug, Clone)]
pub enum DecodedMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Batch(Vec<BatchEntry>),
}

/// One slot in a decoded batch: either a well-formed request/notification or
/// a per-entry framing failure that must still occupy its position in the
/// response array (for request entries — notifications never produce one).
#[derive(Debug, Clone)]
pub enum BatchEntry {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Invalid {
        /// The id if one could be salvaged from the malformed entry.
        id: Option<RequestId>,
        error: JsonRpcErrorObject,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum FramerError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl FramerError {
    pub fn code(&self) -> i32 {
        match self {
            FramerError::Parse(_) => codes::PARSE_ERROR,
            FramerError::InvalidRequest(_) => codes::INVALID_REQUEST,
        }
    }

    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        JsonRpcErrorObject::new(self.code(), self.to_string())
    }
}

/// Decode raw bytes into one of {request, notification, batch}.
///
/// A malformed top-level document (`not json`, or valid JSON that isn't an
/// object/array) is a parse error. A well-formed JSON object/array that
/// fails envelope validation (missing/invalid `jsonrpc`, `method`, or `id`)
/// is an invalid-request error, except inside a batch where each entry is
/// validated independently (see [`BatchEntry::Invalid`]).
pub fn decode(bytes: &[u8]) -> Result<DecodedMessage, FramerError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| FramerError::Parse(e.to_string()))?;

    match value {
        Value::Array(entries) => {
            if entries.is_empty() {
                return Err(FramerError::InvalidRequest("empty batch".to_string()));
            }
            let decoded = entries.into_iter().map(decode_batch_entry).collect();
            Ok(DecodedMessage::Batch(decoded))
        }
        Value::Object(_) => decode_single(value).map(|entry| match entry {
            SingleMessage::Request(r) => DecodedMessage::Request(r),
            SingleMessage::Notification(n) => DecodedMessage::Notification(n),
        }),
        _ => Err(FramerError::InvalidRequest(
            "top-level JSON-RPC message must be an object or array".to_string(),
        )),
    }
}

enum SingleMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

fn decode_single(value: Value) -> Result<SingleMessage, FramerError> {
    let obj = value
        .as_object()
        .ok_or_else(|| FramerError::InvalidRequest("message must be an object".to_string()))?;

    let jsonrpc_ok = matches!(obj.get("jsonrpc"), Some(Value::String(v)) if v == "2.0");
    if !jsonrpc_ok {
        return Err(FramerError::InvalidRequest(
            "missing or invalid \"jsonrpc\" field".to_string(),
        ));
    }

    let method = match obj.get("method") {
        Some(Value::String(m)) => m.clone(),
        _ => {
            return Err(FramerError::InvalidRequest(
                "missing or non-string \"method\" field".to_string(),
            ))
        }
    };

    let params = obj.get("params").cloned();
    if let Some(p) = &params {
        if !p.is_object() && !p.is_array() {
            return Err(FramerError::InvalidRequest(
                "\"params\" must be an object or array".to_string(),
            ));
        }
    }

    match obj.get("id") {
        None => Ok(SingleMessage::Notification(JsonRpcNotification::new(
            method, params,
        ))),
        Some(Value::String(s)) => Ok(SingleMessage::Request(JsonRpcRequest::new(
            method,
            params,
            RequestId::new_string(s.clone()),
        ))),
        Some(Value::Number(n)) => {
            let id = n.as_i64().ok_or_else(|| {
                FramerError::InvalidRequest("\"id\" number must be an integer".to_string())
            })?;
            Ok(SingleMessage::Request(JsonRpcRequest::new(
                method,
                params,
                RequestId::new_number(id),
            )))
        }
        Some(Value::Null) => Err(FramerError::InvalidRequest(
            "null \"id\" is only valid on parse-error responses, not requests".to_string(),
        )),
        Some(_) => Err(FramerError::InvalidRequest(
            "\"id\" must be a string or number".to_string(),
        )),
    }
}

fn decode_batch_entry(value: Value) -> BatchEntry {
    // Salvage an id for the error slot when possible, matching the JSON-RPC
    // convention that an invalid-request error still echoes a usable id.
    let salvaged_id = value.as_object().and_then(|o| match o.get("id") {
        Some(Value::String(s)) => Some(RequestId::new_string(s.clone())),
        Some(Value::Number(n)) => n.as_i64().map(RequestId::new_number),
        _ => None,
    });

    match decode_single(value) {
        Ok(SingleMessage::Request(r)) => BatchEntry::Request(r),
        Ok(SingleMessage::Notification(n)) => BatchEntry::Notification(n),
        Err(e) => BatchEntry::Invalid {
            id: salvaged_id,
            error: e.to_error_object(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn decodes_request() {
        let bytes = br#"{"jsonrpc":"2.0","method":"ping","id":1}"#;
        match decode(bytes).unwrap() {
            DecodedMessage::Request(r) => {
                assert_eq!(r.method, "ping");
                assert_eq!(r.id, RequestId::new_number(1));
            }
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn decodes_notification() {
        let bytes = br#"{"jsonrpc":"2.0","method":"$/cancelRequest","params":{"id":1}}"#;
        match decode(bytes).unwrap() {
            DecodedMessage::Notification(n) => assert_eq!(n.method, "$/cancelRequest"),
            _ => panic!("expected notification"),
        }
    }

    #[test]
    fn parse_error_on_garbage() {
        let err = decode(b"not json").unwrap_err();
        assert_eq!(err.code(), codes::PARSE_ERROR);
    }

    #[test]
    fn invalid_request_on_missing_jsonrpc() {
        let bytes = br#"{"method":"ping","id":1}"#;
        let err = decode(bytes).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_REQUEST);
    }

    #[test]
    fn empty_batch_is_invalid_request() {
        let err = decode(b"[]").unwrap_err();
        assert_eq!(err.code(), codes::INVALID_REQUEST);
    }

    #[test]
    fn batch_partial_failure_keeps_entry_slots() {
        let bytes = serde_json::to_vec(&json!([
            {"jsonrpc":"2.0","method":"initialize","params":{},"id":1},
            {"method":"broken"},
            {"jsonrpc":"2.0","method":"ping","id":2},
        ]))
        .unwrap();

        match decode(&bytes).unwrap() {
            DecodedMessage::Batch(entries) => {
                assert_eq!(entries.len(), 3);
                assert!(matches!(entries[0], BatchEntry::Request(_)));
                assert!(matches!(entries[1], BatchEntry::Invalid { .. }));
                assert!(matches!(entries[2], BatchEntry::Request(_)));
            }
            _ => panic!("expected batch"),
        }
    }

    proptest! {
        /// Any well-formed request, encoded and decoded, yields back the
        /// same method and id no matter what shape either happens to take.
        #[test]
        fn request_round_trips_through_decode(
            method in "[a-zA-Z][a-zA-Z0-9_/]{0,24}",
            id in any::<i64>(),
        ) {
            let request = JsonRpcRequest::new(method.clone(), None, RequestId::new_number(id));
            let bytes = serde_json::to_vec(&request).unwrap();
            match decode(&bytes).unwrap() {
                DecodedMessage::Request(decoded) => {
                    prop_assert_eq!(decoded.method, method);
                    prop_assert_eq!(decoded.id, RequestId::new_number(id));
                }
                other => prop_assert!(false, "expected a request, got {other:?}"),
            }
        }

        /// Same invariant for notifications, which carry no id at all.
        #[test]
        fn notification_round_trips_through_decode(method in "[a-zA-Z][a-zA-Z0-9_/]{0,24}") {
            let notification = JsonRpcNotification::new(method.clone(), None);
            let bytes = serde_json::to_vec(&notification).unwrap();
            match decode(&bytes).unwrap() {
                DecodedMessage::Notification(decoded) => prop_assert_eq!(decoded.method, method),
                other => prop_assert!(false, "expected a notification, got {other:?}"),
            }
        }

        /// A batch built from an arbitrary mix of well-formed entries never
        /// loses or reorders a slot, matching the fixed test above but over
        /// many generated shapes.
        #[test]
        fn batch_entries_keep_their_slot_and_kind(ids in proptest::collection::vec(any::<i64>(), 1..8)) {
            let values: Vec<Value> = ids
                .iter()
                .map(|id| json!({"jsonrpc": "2.0", "method": "ping", "id": id}))
                .collect();
            let bytes = serde_json::to_vec(&Value::Array(values)).unwrap();
            match decode(&bytes).unwrap() {
                DecodedMessage::Batch(entries) => {
                    prop_assert_eq!(entries.len(), ids.len());
                    for (entry, id) in entries.iter().zip(ids.iter()) {
                        match entry {
                            BatchEntry::Request(r) => prop_assert_eq!(&r.id, &RequestId::new_number(*id)),
                            other => prop_assert!(false, "expected a request entry, got {other:?}"),
                        }
                    }
                }
                other => prop_assert!(false, "expected a batch, got {other:?}"),
            }
        }
    }
}
