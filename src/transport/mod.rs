//! The transport abstraction and its manager: an async send/receive/close
//! trait with a fixed [`TransportError`] and `async_trait` object-safe
//! methods, so [`TransportManager`] can hold a named registry of
//! `Arc<dyn Transport>` rather than one concrete type per transport.

pub mod error;
pub mod http;
pub mod manager;
pub mod stdio;

pub use error::TransportError;
pub use manager::{HealthStatus, TransportManager};
pub use stdio::StdioTransport;

use std::sync::Arc;

use async_trait::async_trait;

/// Metadata about a transport's current connection, returned by
/// `getConnectionInfo`.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub transport_tag: String,
    pub peer: Option<String>,
}

/// Context threaded alongside a decoded message into the handler: which
/// transport it arrived on and, where the transport can identify one, a
/// client id (used by the notification hub to bind subscriptions).
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub transport_tag: String,
    pub client_id: Option<String>,
}

/// Receives raw bytes read off a transport and returns the raw bytes to
/// write back, if any (a notification-only exchange produces none). The
/// handler owns framing/decoding/dispatch/encoding; the transport only
/// shuttles bytes.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, bytes: Vec<u8>, context: MessageContext) -> Option<Vec<u8>>;
}

/// A transport driver: owns a connection lifecycle and the byte-level
/// framing appropriate to its medium (newline-delimited for stdio,
/// request/response for HTTP).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn initialize(&self) -> Result<(), TransportError>;
    async fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<(), TransportError>;
    async fn stop(&self) -> Result<(), TransportError>;
    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;
    fn is_connected(&self) -> bool;
    fn connection_info(&self) -> ConnectionInfo;
    fn tag(&self) -> &str;
}
