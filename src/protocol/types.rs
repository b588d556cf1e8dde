//! MCP domain types: protocol version, URIs, content, capabilities, and the
//! tool/resource/prompt descriptors exchanged over JSON-RPC.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{ProtocolError, ProtocolResult};

/// A `YYYY-MM-DD` protocol version tag, validated on construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProtocolVersion(String);

impl ProtocolVersion {
    pub const CURRENT: &'static str = "2024-11-05";

    pub fn new(version: impl Into<String>) -> ProtocolResult<Self> {
        let version = version.into();
        if Self::is_valid(&version) {
            Ok(Self(version))
        } else {
            Err(ProtocolError::InvalidProtocolVersion(version))
        }
    }

    pub fn current() -> Self {
        Self(Self::CURRENT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(version: &str) -> bool {
        let bytes = version.as_bytes();
        bytes.len() == 10
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes[0..4].iter().all(u8::is_ascii_digit)
            && bytes[5..7].iter().all(u8::is_ascii_digit)
            && bytes[8..10].iter().all(u8::is_ascii_digit)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resource/component URI. Validation is intentionally shallow (non-empty,
/// has a scheme) — the core does not interpret URIs beyond routing reads to
/// the registered [`Readable`](crate::registry::Readable) component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Uri(String);

impl Uri {
    pub fn new(uri: impl Into<String>) -> ProtocolResult<Self> {
        let uri = uri.into();
        if Self::is_valid(&uri) {
            Ok(Self(uri))
        } else {
            Err(ProtocolError::InvalidUri(uri))
        }
    }

    pub fn new_unchecked(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scheme(&self) -> Option<&str> {
        self.0.split(':').next()
    }

    fn is_valid(uri: &str) -> bool {
        !uri.is_empty() && uri.contains(':') && !uri.starts_with(':')
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A MIME type, validated to have a `main/sub` shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MimeType(String);

impl MimeType {
    pub fn new(mime: impl Into<String>) -> ProtocolResult<Self> {
        let mime = mime.into();
        if mime.split('/').count() == 2 && !mime.starts_with('/') && !mime.ends_with('/') {
            Ok(Self(mime))
        } else {
            Err(ProtocolError::InvalidMimeType(mime))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Base64-encoded binary payload (images, blobs).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Base64Data(String);

impl Base64Data {
    pub fn from_encoded(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn encode(bytes: &[u8]) -> Self {
        use base64::Engine;
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn decode(&self) -> ProtocolResult<Vec<u8>> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&self.0)
            .map_err(|_| ProtocolError::InvalidBase64Data)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Multi-modal content returned by tool calls, resource reads and prompt
/// renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text {
        text: String,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<MimeType>,
    },
    #[serde(rename = "image")]
    Image {
        data: Base64Data,
        #[serde(rename = "mimeType")]
        mime_type: MimeType,
    },
    #[serde(rename = "resource")]
    Resource {
        uri: Uri,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<MimeType>,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            mime_type: None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text, .. } => Some(text),
            Content::Resource {
                text: Some(text), ..
            } => Some(text),
            _ => None,
        }
    }
}

/// A callable tool's metadata, as returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// A readable resource's metadata, as returned by `resources/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub uri: Uri,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
}

/// A prompt template's metadata, as returned by `prompts/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptArgument {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    pub role: String,
    pub content: Content,
}

impl PromptMessage {
    pub fn user(content: Content) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }

    pub fn assistant(content: Content) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
        }
    }
}

/// Capabilities advertised by the client during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientCapabilities {
    #[serde(default)]
    pub experimental: Option<serde_json::Value>,
    #[serde(default)]
    pub roots: Option<RootsCapabilities>,
}

/// Capabilities advertised by the server after negotiation: the intersection
/// of what the client asked for and what the server actually implements.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub logging: Option<LoggingCapabilities>,
    #[serde(default)]
    pub prompts: Option<PromptCapabilities>,
    #[serde(default)]
    pub resources: Option<ResourceCapabilities>,
    #[serde(default)]
    pub tools: Option<ToolCapabilities>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RootsCapabilities {
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoggingCapabilities {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptCapabilities {
    pub list_changed: Option<bool>,
}

impl Default for PromptCapabilities {
    fn default() -> Self {
        Self {
            list_changed: Some(true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceCapabilities {
    pub subscribe: Option<bool>,
    pub list_changed: Option<bool>,
}

impl Default for ResourceCapabilities {
    fn default() -> Self {
        Self {
            subscribe: Some(true),
            list_changed: Some(true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCapabilities {
    pub list_changed: Option<bool>,
}

impl Default for ToolCapabilities {
    fn default() -> Self {
        Self {
            list_changed: Some(true),
        }
    }
}

/// The MCP notification types recognized by the notification hub, plus a
/// server-defined escape hatch for host-specific events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ToolsListChanged,
    ResourcesListChanged,
    ResourcesUpdated,
    PromptsListChanged,
    LoggingMessage,
    Progress,
    /// A host-defined notification identified by name.
    Custom(String),
}

impl NotificationType {
    /// The `notifications/<type>` wire method suffix.
    pub fn as_method_suffix(&self) -> String {
        match self {
            NotificationType::ToolsListChanged => "tools/list_changed".to_string(),
            NotificationType::ResourcesListChanged => "resources/list_changed".to_string(),
            NotificationType::ResourcesUpdated => "resources/updated".to_string(),
            NotificationType::PromptsListChanged => "prompts/list_changed".to_string(),
            NotificationType::LoggingMessage => "logging/message".to_string(),
            NotificationType::Progress => "progress".to_string(),
            NotificationType::Custom(name) => name.clone(),
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_method_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_version_rejects_bad_format() {
        assert!(ProtocolVersion::new("2024-11-05").is_ok());
        assert!(ProtocolVersion::new("not-a-date").is_err());
    }

    #[test]
    fn uri_requires_scheme() {
        assert!(Uri::new("file:///a").is_ok());
        assert!(Uri::new("no-scheme").is_err());
    }

    #[test]
    fn mime_type_requires_slash() {
        assert!(MimeType::new("text/plain").is_ok());
        assert!(MimeType::new("textplain").is_err());
    }

    #[test]
    fn base64_round_trips() {
        let data = Base64Data::encode(b"hello");
        assert_eq!(data.decode().unwrap(), b"hello");
    }

    #[test]
    fn notification_type_method_suffix() {
        assert_eq!(
            NotificationType::ToolsListChanged.as_method_suffix(),
            "tools/list_changed"
        );
        assert_eq!(
            NotificationType::Custom("vendor/event".to_string()).as_method_suffix(),
            "vendor/event"
        );
    }
}
