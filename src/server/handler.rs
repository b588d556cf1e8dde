//! The protocol handler: translates a decoded JSON-RPC request into MCP
//! semantics against a session and the registry, producing a JSON `result`
//! or a [`ProtocolError`] for the framer to serialize.

use std::sync::Arc;

use base64::Engine;
use dashmap::DashMap;
use serde_json::Value;
use tracing::instrument;

use crate::events::{Event, EventBus};
use crate::jsonrpc::RequestId;
use crate::notifications::{Filter, NotificationHub};
use crate::protocol::messages::{
    CallToolParams, CallToolResult, CancelRequestParams, GetPromptParams, GetPromptResult,
    InitializeParams, InitializeResult, ListPromptsResult, ListResourcesResult, ListToolsResult,
    PaginatedParams, ReadResourceParams, ReadResourceResult, SubscribeResourceParams,
};
use crate::protocol::{
    NotificationType, ProtocolError, ProtocolResult, ProtocolVersion, PromptCapabilities,
    Resource, ResourceCapabilities, ServerCapabilities, ServerInfo, ToolCapabilities,
};
use crate::registry::{Component, ComponentKind, Registry};

use super::config::ServerConfig;
use super::session::{Session, SessionState};

/// Everything the protocol handler needs beyond the session: the registry to
/// dispatch into, the configured identity/capabilities, and the event bus.
pub struct ProtocolHandler {
    registry: Arc<Registry>,
    events: Option<Arc<EventBus>>,
    notifications: Option<Arc<NotificationHub>>,
    server_info: ServerInfo,
    protocol_version: ProtocolVersion,
    page_size: usize,
    cancelled: DashMap<RequestId, ()>,
}

impl ProtocolHandler {
    pub fn new(
        registry: Arc<Registry>,
        events: Option<Arc<EventBus>>,
        notifications: Option<Arc<NotificationHub>>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            registry,
            events,
            notifications,
            server_info: config.server_info.clone(),
            protocol_version: config.protocol_version.clone(),
            page_size: config.page_size,
            cancelled: DashMap::new(),
        }
    }

    /// Capabilities are derived from what's actually registered, not
    /// declared up front — a fresh handler with no tools registered yet
    /// does not advertise `tools`.
    fn server_capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            logging: None,
            tools: (!self.registry.list(ComponentKind::Tool).is_empty())
                .then(ToolCapabilities::default),
            resources: (!self.registry.list(ComponentKind::Resource).is_empty())
                .then(ResourceCapabilities::default),
            prompts: (!self.registry.list(ComponentKind::Prompt).is_empty())
                .then(PromptCapabilities::default),
        }
    }

    #[instrument(level = "debug", skip(self, session, params))]
    pub async fn initialize(
        &self,
        session: &Session,
        params: InitializeParams,
    ) -> ProtocolResult<Value> {
        session.begin_initialize().await?;

        let client_capabilities = params.capabilities;
        let negotiated_version = if params.protocol_version == self.protocol_version.as_str() {
            ProtocolVersion::new(params.protocol_version)?
        } else {
            // Stay on the server's supported version; the client is expected
            // to detect the mismatch from the echoed value and decide
            // whether to proceed.
            self.protocol_version.clone()
        };
        let server_capabilities = self.server_capabilities();

        session
            .complete_initialize(
                negotiated_version.clone(),
                client_capabilities,
                server_capabilities.clone(),
            )
            .await;

        let result = InitializeResult {
            protocol_version: negotiated_version.to_string(),
            capabilities: server_capabilities,
            server_info: self.server_info.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    #[instrument(level = "debug", skip(self, session))]
    pub async fn list_tools(&self, session: &Session, params: PaginatedParams) -> ProtocolResult<Value> {
        session.require_ready().await?;
        let components = self.registry.list(ComponentKind::Tool);
        let (page, next_cursor) = paginate(&components, params.cursor.as_deref(), self.page_size, |c| {
            c.name()
        });
        let tools = page
            .into_iter()
            .map(|c| match c {
                Component::Tool(t) => t.descriptor(),
                _ => unreachable!("registry list(Tool) only yields Component::Tool"),
            })
            .collect();
        Ok(serde_json::to_value(ListToolsResult { tools, next_cursor })?)
    }

    #[instrument(level = "debug", skip(self, session, params))]
    pub async fn call_tool(&self, session: &Session, params: CallToolParams) -> ProtocolResult<Value> {
        session.require_ready().await?;
        let component = self
            .registry
            .get(ComponentKind::Tool, &params.name)
            .ok_or_else(|| ProtocolError::not_found(format!("tool '{}'", params.name)))?;

        let Component::Tool(tool) = component else {
            return Err(ProtocolError::internal("registry kind mismatch for tool lookup"));
        };

        let started = std::time::Instant::now();
        let content = tool.call(params.arguments).await;
        self.emit(Event::ToolExecuted {
            name: params.name.clone(),
            duration: started.elapsed(),
        })
        .await;

        let result = match content {
            Ok(content) => CallToolResult::ok(content),
            Err(err) => CallToolResult::failed(err.to_string()),
        };
        Ok(serde_json::to_value(result)?)
    }

    #[instrument(level = "debug", skip(self, session))]
    pub async fn list_resources(
        &self,
        session: &Session,
        params: PaginatedParams,
    ) -> ProtocolResult<Value> {
        session.require_ready().await?;
        let components = self.registry.list(ComponentKind::Resource);
        let (page, next_cursor) = paginate(&components, params.cursor.as_deref(), self.page_size, |c| {
            c.name()
        });
        let resources: Vec<Resource> = page
            .into_iter()
            .map(|c| match c {
                Component::Resource(r) => r.descriptor(),
                _ => unreachable!("registry list(Resource) only yields Component::Resource"),
            })
            .collect();
        Ok(serde_json::to_value(ListResourcesResult {
            resources,
            next_cursor,
        })?)
    }

    #[instrument(level = "debug", skip(self, session, params))]
    pub async fn read_resource(
        &self,
        session: &Session,
        params: ReadResourceParams,
    ) -> ProtocolResult<Value> {
        session.require_ready().await?;
        let component = self
            .registry
            .get(ComponentKind::Resource, &params.uri)
            .or_else(|| self.find_resource_by_uri(&params.uri))
            .ok_or_else(|| ProtocolError::not_found(format!("resource '{}'", params.uri)))?;

        let Component::Resource(resource) = component else {
            return Err(ProtocolError::internal(
                "registry kind mismatch for resource lookup",
            ));
        };

        let contents = resource.read(&params.uri).await?;
        self.emit(Event::ResourceAccessed {
            uri: params.uri.clone(),
        })
        .await;
        Ok(serde_json::to_value(ReadResourceResult { contents })?)
    }

    /// Resources are keyed in the registry by name, but a read targets a
    /// URI. Most providers register with `name == uri`; this fallback scans
    /// descriptors for a URI match when that's not the case.
    fn find_resource_by_uri(&self, uri: &str) -> Option<Component> {
        self.registry
            .list(ComponentKind::Resource)
            .into_iter()
            .find(|c| match c {
                Component::Resource(r) => r.descriptor().uri.as_str() == uri,
                _ => false,
            })
    }

    #[instrument(level = "debug", skip(self, session, params))]
    pub async fn subscribe_resource(
        &self,
        session: &Session,
        params: SubscribeResourceParams,
    ) -> ProtocolResult<Value> {
        session.require_ready().await?;

        let component = self
            .registry
            .get(ComponentKind::Resource, &params.uri)
            .or_else(|| self.find_resource_by_uri(&params.uri))
            .ok_or_else(|| ProtocolError::not_found(format!("resource '{}'", params.uri)))?;

        let Component::Resource(resource) = component else {
            return Err(ProtocolError::internal(
                "registry kind mismatch for resource lookup",
            ));
        };

        let subscribable = resource.as_subscribable().ok_or_else(|| {
            ProtocolError::invalid_params(format!("resource '{}' does not support subscriptions", params.uri))
        })?;

        let client_id = session
            .client_id()
            .ok_or_else(|| ProtocolError::invalid_params("subscribing transport has no client id"))?;

        subscribable.subscribe(client_id, &params.uri).await?;

        if let Some(notifications) = &self.notifications {
            let existing_transport = notifications
                .get_active_subscriptions()
                .get(client_id)
                .and_then(|sub| sub.transport.clone());
            notifications.subscribe(client_id, vec![NotificationType::ResourcesUpdated], existing_transport);
            let mut filter = Filter::new();
            filter.insert("params.uri".to_string(), serde_json::json!(params.uri));
            notifications.update_filter(client_id, filter);
        }

        Ok(serde_json::json!({}))
    }

    #[instrument(level = "debug", skip(self, session))]
    pub async fn list_prompts(
        &self,
        session: &Session,
        params: PaginatedParams,
    ) -> ProtocolResult<Value> {
        session.require_ready().await?;
        let components = self.registry.list(ComponentKind::Prompt);
        let (page, next_cursor) = paginate(&components, params.cursor.as_deref(), self.page_size, |c| {
            c.name()
        });
        let prompts = page
            .into_iter()
            .map(|c| match c {
                Component::Prompt(p) => p.descriptor(),
                _ => unreachable!("registry list(Prompt) only yields Component::Prompt"),
            })
            .collect();
        Ok(serde_json::to_value(ListPromptsResult { prompts, next_cursor })?)
    }

    #[instrument(level = "debug", skip(self, session, params))]
    pub async fn get_prompt(&self, session: &Session, params: GetPromptParams) -> ProtocolResult<Value> {
        session.require_ready().await?;
        let component = self
            .registry
            .get(ComponentKind::Prompt, &params.name)
            .ok_or_else(|| ProtocolError::not_found(format!("prompt '{}'", params.name)))?;

        let Component::Prompt(prompt) = component else {
            return Err(ProtocolError::internal(
                "registry kind mismatch for prompt lookup",
            ));
        };

        let description = prompt.descriptor().description;
        let messages = prompt.render(params.arguments).await?;
        self.emit(Event::PromptGenerated {
            name: params.name.clone(),
        })
        .await;
        Ok(serde_json::to_value(GetPromptResult {
            description,
            messages,
        })?)
    }

    pub async fn ping(&self, _session: &Session) -> ProtocolResult<Value> {
        Ok(serde_json::json!({}))
    }

    /// `$/cancelRequest` is a notification: it never produces a response,
    /// only marks the id so in-flight work can observe it via
    /// [`Self::is_cancelled`].
    pub async fn cancel_request(&self, params: CancelRequestParams) {
        self.cancelled.insert(params.id, ());
    }

    pub fn is_cancelled(&self, id: &RequestId) -> bool {
        self.cancelled.contains_key(id)
    }

    pub fn clear_cancelled(&self, id: &RequestId) {
        self.cancelled.remove(id);
    }

    async fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event).await;
        }
    }

    /// Routes a bare JSON-RPC method name + params to the matching typed
    /// entry point above. Shared by the transport-facing `MessageHandler`
    /// and the async pipeline, which both need "method name in, JSON value
    /// out" rather than a typed call.
    pub async fn dispatch(
        &self,
        session: &Session,
        method: &str,
        params: Value,
    ) -> ProtocolResult<Value> {
        // Sessions that haven't finished `initialize` yet have no negotiated
        // capabilities at all; that's a sequencing violation every method's
        // own `require_ready` already rejects with the correct -32600, so
        // the capability check below only applies once a session is `Ready`
        // and a negotiation outcome actually exists to check against.
        if session.state().await == SessionState::Ready {
            self.check_capability(session, method).await?;
        }

        match method {
            "initialize" => self.initialize(session, serde_json::from_value(params)?).await,
            "tools/list" => self.list_tools(session, parse_paginated(params)?).await,
            "tools/call" => self.call_tool(session, serde_json::from_value(params)?).await,
            "resources/list" => self.list_resources(session, parse_paginated(params)?).await,
            "resources/read" => self.read_resource(session, serde_json::from_value(params)?).await,
            "resources/subscribe" => {
                self.subscribe_resource(session, serde_json::from_value(params)?).await
            }
            "prompts/list" => self.list_prompts(session, parse_paginated(params)?).await,
            "prompts/get" => self.get_prompt(session, serde_json::from_value(params)?).await,
            "ping" => self.ping(session).await,
            other => Err(ProtocolError::MethodNotFound {
                method: other.to_string(),
            }),
        }
    }

    /// A `Ready` session must have negotiated the capability its method
    /// touches; `initialize` and `ping` carry no such requirement.
    async fn check_capability(&self, session: &Session, method: &str) -> ProtocolResult<()> {
        let Some(capability) = required_capability(method) else {
            return Ok(());
        };
        let granted = match session.server_capabilities().await {
            Some(caps) => match capability {
                "tools" => caps.tools.is_some(),
                "resources" => caps.resources.is_some(),
                "prompts" => caps.prompts.is_some(),
                _ => true,
            },
            None => false,
        };
        if granted {
            Ok(())
        } else {
            Err(ProtocolError::CapabilityNotNegotiated {
                capability: capability.to_string(),
            })
        }
    }
}

/// The capability a method prefix requires, or `None` for methods that carry
/// no capability requirement of their own.
fn required_capability(method: &str) -> Option<&'static str> {
    if method.starts_with("tools/") {
        Some("tools")
    } else if method.starts_with("resources/") {
        Some("resources")
    } else if method.starts_with("prompts/") {
        Some("prompts")
    } else {
        None
    }
}

fn parse_paginated(params: Value) -> ProtocolResult<PaginatedParams> {
    if params.is_null() {
        return Ok(PaginatedParams { cursor: None });
    }
    Ok(serde_json::from_value(params)?)
}

/// Encode a page boundary as an opaque cursor: base64 of the last item's
/// name. Decoding only ever needs the name to resume past; any mutation of
/// the backing set between pages still makes forward progress because the
/// comparison is against a concrete name, never a positional index.
fn paginate<T>(
    items: &[T],
    cursor: Option<&str>,
    page_size: usize,
    name_of: impl Fn(&T) -> String,
) -> (Vec<T>, Option<String>)
where
    T: Clone,
{
    let resume_after = cursor.and_then(decode_cursor);

    let start = match resume_after {
        Some(after) => items
            .iter()
            .position(|item| name_of(item) > after)
            .unwrap_or(items.len()),
        None => 0,
    };

    let end = (start + page_size).min(items.len());
    let page = items[start..end].to_vec();
    let next_cursor = if end < items.len() {
        page.last().map(|item| encode_cursor(&name_of(item)))
    } else {
        None
    };
    (page, next_cursor)
}

fn encode_cursor(name: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(name)
}

fn decode_cursor(cursor: &str) -> Option<String> {
    base64::engine::general_purpose::STANDARD
        .decode(cursor)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
