//! MCP domain types, the protocol error taxonomy, and the payload shapes
//! exchanged over the `initialize`/`tools/*`/`resources/*`/`prompts/*`
//! methods. This module has no knowledge of transports or the registry —
//! it is the vocabulary the rest of the crate shares.

pub mod errors;
pub mod messages;
pub mod types;

pub use errors::{ErrorSnapshot, ProtocolError, ProtocolResult};
pub use types::{
    Base64Data, ClientCapabilities, ClientInfo, Content, LoggingCapabilities, MimeType,
    NotificationType, Prompt, PromptArgument, PromptCapabilities, PromptMessage,
    ProtocolVersion, Resource, ResourceCapabilities, RootsCapabilities, ServerCapabilities,
    ServerInfo, Tool, ToolCapabilities, Uri,
};
