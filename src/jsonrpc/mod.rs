//! JSON-RPC 2.0 message types and the framer that parses/validates them.
//!
//! This is the outermost protocol layer: it knows nothing about MCP
//! semantics, only about what a conforming JSON-RPC 2.0 exchange looks like.

pub mod framer;
pub mod message;

pub use framer::{codes, decode, BatchEntry, DecodedMessage, FramerError};
pub use message::{
    JsonRpcErrorObject, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
