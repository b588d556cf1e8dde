//! Capability traits implemented by host-provided components.
//!
//! The source this runtime is modeled on expresses tools/resources/prompts
//! as an inheritance hierarchy (`McpTool`/`McpResource`/`McpPrompt`). A
//! single registered thing here instead implements exactly the capability
//! traits its kind requires, and the registry stores a closed per-kind
//! variant rather than a trait object hierarchy, so dispatch stays
//! exhaustive at the match in the protocol handler.

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::{Content, Prompt, ProtocolResult, PromptMessage, Resource, Tool};

/// A tool: invoked by name with JSON arguments, returns content blocks.
#[async_trait]
pub trait Callable: Send + Sync {
    fn descriptor(&self) -> Tool;

    async fn call(&self, arguments: Value) -> ProtocolResult<Vec<Content>>;
}

/// A resource: read by URI, returns content blocks.
#[async_trait]
pub trait Readable: Send + Sync {
    fn descriptor(&self) -> Resource;

    async fn read(&self, uri: &str) -> ProtocolResult<Vec<Content>>;

    /// Returns `Some` when this resource also implements [`Subscribable`].
    /// The default `None` covers the common case of a resource that only
    /// supports reads; overriding it is how a concrete type opts into
    /// `resources/subscribe` without the registry needing `dyn Any`.
    fn as_subscribable(&self) -> Option<&dyn Subscribable> {
        None
    }
}

/// A resource that accepts `resources/subscribe` for update notifications.
/// Most resources are not subscribable; this is an additive capability a
/// [`Readable`] may also implement.
#[async_trait]
pub trait Subscribable: Send + Sync {
    async fn subscribe(&self, client_id: &str, uri: &str) -> ProtocolResult<()>;
}

/// A prompt: rendered by name with JSON arguments into a message sequence.
#[async_trait]
pub trait Renderable: Send + Sync {
    fn descriptor(&self) -> Prompt;

    async fn render(&self, arguments: Value) -> ProtocolResult<Vec<PromptMessage>>;
}

/// Marker for anything the registry can enumerate via `list` regardless of
/// kind — `descriptor()` already gives each concrete kind this for free, so
/// this trait only exists to name the shared shape in doc comments and
/// generic helpers.
pub trait Listable {
    fn name(&self) -> String;
}

impl<T: Callable + ?Sized> Listable for T {
    fn name(&self) -> String {
        self.descriptor().name
    }
}

/// The closed set of component kinds the registry stores. Matches on this
/// enum are expected to be exhaustive everywhere it is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Tool,
    Resource,
    Prompt,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Tool => "tool",
            ComponentKind::Resource => "resource",
            ComponentKind::Prompt => "prompt",
        }
    }
}

/// One registered component, tagged by kind. The registry never stores an
/// untagged trait object — every lookup and list operation matches
/// exhaustively on this variant.
#[derive(Clone)]
pub enum Component {
    Tool(std::sync::Arc<dyn Callable>),
    Resource(std::sync::Arc<dyn Readable>),
    Prompt(std::sync::Arc<dyn Renderable>),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Tool(_) => ComponentKind::Tool,
            Component::Resource(_) => ComponentKind::Resource,
            Component::Prompt(_) => ComponentKind::Prompt,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Component::Tool(t) => t.descriptor().name,
            Component::Resource(r) => r.descriptor().name,
            Component::Prompt(p) => p.descriptor().name,
        }
    }
}
