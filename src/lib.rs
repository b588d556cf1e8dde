//! mcp-runtime — a server-side runtime for the Model Context Protocol.
//!
//! This crate implements the wire protocol, dispatch, and supporting
//! infrastructure an MCP server needs, independent of any particular set of
//! tools/resources/prompts: a JSON-RPC 2.0 framer, the MCP method table
//! (`initialize`, `tools/*`, `resources/*`, `prompts/*`, `ping`,
//! `$/cancelRequest`), a capability-trait component registry, a transport
//! abstraction with stdio and HTTP/SSE implementations, a notification hub
//! with retry/backoff, an out-of-band async execution pipeline, and a
//! best-effort event bus for host instrumentation.
//!
//! # Layout
//!
//! - [`jsonrpc`] — JSON-RPC 2.0 message types and the byte-level framer.
//! - [`protocol`] — MCP domain types, the error taxonomy, and payload shapes.
//! - [`registry`] — the `Callable`/`Readable`/`Renderable` capability traits
//!   and the name-keyed store components are registered under.
//! - [`transport`] — the `Transport` trait, stdio and HTTP/SSE drivers, and
//!   [`transport::TransportManager`].
//! - [`notifications`] — [`notifications::NotificationHub`]: subscribe,
//!   filter, broadcast, and track delivery across direct/queued/SSE paths.
//! - [`async_pipeline`] — background execution of an MCP call, polled by
//!   request id.
//! - [`events`] — the pluggable lifecycle event bus.
//! - [`auth`] — the pluggable authentication hook, with an api-key example.
//! - [`providers`] — sample `Callable`/`Readable`/`Renderable` components.
//! - [`server`] — [`server::Server`], the dependency-injection root tying
//!   every subsystem together.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcp_runtime::providers::MathTool;
//! use mcp_runtime::registry::{Component, ComponentKind, ComponentMetadata};
//! use mcp_runtime::server::{Server, ServerConfig};
//! use mcp_runtime::transport::StdioTransport;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::new(ServerConfig::default());
//! server
//!     .registry()
//!     .register(
//!         ComponentKind::Tool,
//!         "math",
//!         Component::Tool(Arc::new(MathTool::new())),
//!         ComponentMetadata::default(),
//!         false,
//!     )
//!     .await?;
//! server.transports().register("stdio", Arc::new(StdioTransport::new())).await;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod async_pipeline;
pub mod auth;
pub mod events;
pub mod jsonrpc;
pub mod notifications;
pub mod protocol;
pub mod providers;
pub mod registry;
pub mod server;
pub mod transport;
