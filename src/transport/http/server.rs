//! POST `/mcp`: one JSON-RPC message (single or batch) in, the
//! corresponding response(s) out, synchronously, routed through axum.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use super::sse::{sse_response, SseBroadcaster};
use crate::auth::{apikey, AuthMiddleware, Credentials, NoAuth};
use crate::jsonrpc::codes;
use crate::server::config::CorsConfig;
use crate::transport::{ConnectionInfo, MessageContext, MessageHandler, Transport, TransportError};

struct HttpState {
    handler: Arc<dyn MessageHandler>,
    sse: Arc<SseBroadcaster>,
    auth: Arc<dyn AuthMiddleware>,
}

pub struct HttpTransport {
    addr: SocketAddr,
    cors: CorsConfig,
    sse: Arc<SseBroadcaster>,
    auth: Arc<dyn AuthMiddleware>,
    connected: AtomicBool,
    server_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl HttpTransport {
    pub fn new(addr: SocketAddr, cors: CorsConfig) -> Self {
        Self::with_auth(addr, cors, Arc::new(NoAuth))
    }

    pub fn with_auth(addr: SocketAddr, cors: CorsConfig, auth: Arc<dyn AuthMiddleware>) -> Self {
        Self {
            addr,
            cors,
            sse: Arc::new(SseBroadcaster::new()),
            auth,
            connected: AtomicBool::new(false),
            server_handle: tokio::sync::Mutex::new(None),
        }
    }

    pub fn sse_broadcaster(&self) -> Arc<SseBroadcaster> {
        self.sse.clone()
    }

    fn cors_layer(&self) -> CorsLayer {
        // The configured origin list drives the layer, falling back to
        // permissive only when the host asked for "*".
        if self.cors.allowed_origins.iter().any(|o| o == "*") {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            CorsLayer::new()
        }
    }

    fn router(&self, handler: Arc<dyn MessageHandler>) -> Router {
        let state = Arc::new(HttpState {
            handler,
            sse: self.sse.clone(),
            auth: self.auth.clone(),
        });

        Router::new()
            .route("/mcp", post(handle_post))
            .route("/sse/:client_id", get(handle_sse))
            .layer(self.cors_layer())
            .with_state(state)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn initialize(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<(), TransportError> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadyStarted);
        }

        let app = self.router(handler);
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;

        info!(addr = %self.addr, "http transport listening");
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                error!(%err, "http transport server exited with error");
            }
        });
        *self.server_handle.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(handle) = self.server_handle.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    /// Plain request/response HTTP has no standing connection to push into;
    /// direct server-initiated delivery on this transport goes through the
    /// SSE sibling route instead (see [`SseBroadcaster`]).
    async fn send(&self, _bytes: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            transport_tag: "http".to_string(),
            peer: Some(self.addr.to_string()),
        }
    }

    fn tag(&self) -> &str {
        "http"
    }
}

async fn handle_post(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let credentials = Credentials {
        header_value: headers
            .get(apikey::HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        query_value: query.get(apikey::QUERY_PARAM).cloned(),
    };
    if let Err(err) = state.auth.authenticate(&credentials).await {
        return (StatusCode::UNAUTHORIZED, err.to_string()).into_response();
    }

    let context = MessageContext {
        transport_tag: "http".to_string(),
        client_id: None,
    };
    match state.handler.handle_message(body.to_vec(), context).await {
        Some(response) => (
            response_status(&response),
            [("content-type", "application/json")],
            response,
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// A batch response (top-level array) always succeeded at the framing level
/// even when individual entries inside it carry errors, so it always maps to
/// 200. A single-object response's own error code decides the HTTP status:
/// malformed/invalid framing is a client error, an internal fault is a
/// server error, and a normal result or domain-level error (not found,
/// invalid params, ...) is still 200 — only the JSON-RPC envelope's framing
/// health is reflected in the HTTP status, not business outcomes.
fn response_status(body: &[u8]) -> StatusCode {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return StatusCode::OK;
    };
    if value.is_array() {
        return StatusCode::OK;
    }
    match value.get("error").and_then(|e| e.get("code")).and_then(Value::as_i64) {
        Some(code) if code == codes::PARSE_ERROR as i64 || code == codes::INVALID_REQUEST as i64 => {
            StatusCode::BAD_REQUEST
        }
        Some(code) if code == codes::INTERNAL_ERROR as i64 => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

async fn handle_sse(
    State(state): State<Arc<HttpState>>,
    Path(client_id): Path<String>,
) -> impl IntoResponse {
    sse_response(state.sse.clone(), client_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_invalid_request_errors_map_to_bad_request() {
        let parse_err = serde_json::json!({
            "jsonrpc": "2.0",
            "error": { "code": codes::PARSE_ERROR, "message": "parse error: x" },
            "id": null,
        });
        assert_eq!(
            response_status(&serde_json::to_vec(&parse_err).unwrap()),
            StatusCode::BAD_REQUEST
        );

        let invalid_request = serde_json::json!({
            "jsonrpc": "2.0",
            "error": { "code": codes::INVALID_REQUEST, "message": "invalid request" },
            "id": null,
        });
        assert_eq!(
            response_status(&serde_json::to_vec(&invalid_request).unwrap()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_error_maps_to_server_error() {
        let internal = serde_json::json!({
            "jsonrpc": "2.0",
            "error": { "code": codes::INTERNAL_ERROR, "message": "internal error: boom" },
            "id": 1,
        });
        assert_eq!(
            response_status(&serde_json::to_vec(&internal).unwrap()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_errors_and_results_stay_ok() {
        let not_found = serde_json::json!({
            "jsonrpc": "2.0",
            "error": { "code": codes::INVALID_PARAMS, "message": "not found: tool 'x'" },
            "id": 1,
        });
        assert_eq!(response_status(&serde_json::to_vec(&not_found).unwrap()), StatusCode::OK);

        let result = serde_json::json!({ "jsonrpc": "2.0", "result": {}, "id": 1 });
        assert_eq!(response_status(&serde_json::to_vec(&result).unwrap()), StatusCode::OK);
    }

    #[test]
    fn batch_response_always_ok_even_with_inner_errors() {
        let batch = serde_json::json!([
            { "jsonrpc": "2.0", "result": {}, "id": 1 },
            { "jsonrpc": "2.0", "error": { "code": codes::INVALID_REQUEST, "message": "bad" }, "id": null },
        ]);
        assert_eq!(response_status(&serde_json::to_vec(&batch).unwrap()), StatusCode::OK);
    }
}
