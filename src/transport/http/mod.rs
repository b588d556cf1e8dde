//! Request/response HTTP transport, plus its Server-Sent-Events streaming
//! sibling: an axum `Router` with a POST endpoint for JSON-RPC and CORS
//! applied via `tower-http`.

pub mod server;
pub mod sse;

pub use server::HttpTransport;
pub use sse::SseBroadcaster;
