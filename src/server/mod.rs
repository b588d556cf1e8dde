//! The dependency-injection root: one `Server` value owns the registry,
//! transport manager, notification hub, async pipeline and event bus, and
//! is passed into every transport as its [`MessageHandler`]. No global
//! mutable state, no service locator — no container/facade pair either.

pub mod config;
pub mod handler;
pub mod session;

pub use config::{DefaultTransport, ServerConfig};
pub use handler::ProtocolHandler;
pub use session::{Session, SessionState};

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::async_pipeline::{AsyncPipeline, InMemoryCache, SharedCache};
use crate::events::{Event, EventBus, TracingEventListener};
use crate::jsonrpc::{
    decode, BatchEntry, DecodedMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
use crate::notifications::{InProcessQueue, NotificationHub};
use crate::protocol::messages::CancelRequestParams;
use crate::protocol::ProtocolError;
use crate::registry::Registry;
use crate::transport::{MessageContext, MessageHandler, TransportError, TransportManager};

/// Holds every long-lived subsystem. Construct one, register components and
/// transports on it, then call [`Server::run`].
pub struct Server {
    config: ServerConfig,
    registry: Arc<Registry>,
    events: Option<Arc<EventBus>>,
    handler: Arc<ProtocolHandler>,
    transports: Arc<TransportManager>,
    notifications: Option<Arc<NotificationHub>>,
    async_pipeline: Arc<AsyncPipeline>,
    sessions: DashMap<String, Arc<Session>>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let events = config.events_enabled.then(|| {
            let bus = Arc::new(EventBus::synchronous());
            bus.subscribe(Arc::new(TracingEventListener));
            bus
        });

        let registry = match &events {
            Some(events) => Arc::new(Registry::with_events(events.clone())),
            None => Arc::new(Registry::new()),
        };

        // `notifications_enabled = false` means the host doesn't want the
        // hub standing at all, not just that it starts with no subscribers —
        // `subscribe_resource` and `$/cancelRequest`-adjacent notification
        // paths then see `None` and skip delivery entirely.
        let notifications = config.notifications_enabled.then(|| {
            let hub = Arc::new(NotificationHub::new(
                config.notification_defaults.clone(),
                events.clone(),
            ));
            if config.queue.enabled {
                let hub_for_retries = hub.clone();
                let (queue, _handle) = InProcessQueue::new(move |job| {
                    let hub = hub_for_retries.clone();
                    async move { hub.handle_retry(job).await }
                });
                hub.set_queue(Arc::new(queue));
            }
            hub
        });

        let handler = Arc::new(ProtocolHandler::new(
            registry.clone(),
            events.clone(),
            notifications.clone(),
            &config,
        ));

        let cache: SharedCache = Arc::new(InMemoryCache::new());
        let async_pipeline = Arc::new(AsyncPipeline::new(handler.clone(), cache, events.clone()));

        Arc::new(Self {
            config,
            registry,
            events,
            handler,
            transports: Arc::new(TransportManager::new()),
            notifications,
            async_pipeline,
            sessions: DashMap::new(),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn transports(&self) -> &Arc<TransportManager> {
        &self.transports
    }

    pub fn notifications(&self) -> Option<&Arc<NotificationHub>> {
        self.notifications.as_ref()
    }

    pub fn async_pipeline(&self) -> &Arc<AsyncPipeline> {
        &self.async_pipeline
    }

    pub fn events(&self) -> Option<&Arc<EventBus>> {
        self.events.as_ref()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts every registered transport with this server wired in as the
    /// message handler. The configured default is applied before any
    /// transport starts accepting work; an unregistered default is a host
    /// configuration mistake, logged rather than failing startup over.
    pub async fn run(self: &Arc<Self>) -> Result<(), TransportError> {
        let default_tag = match self.config.default_transport {
            DefaultTransport::Stdio => "stdio",
            DefaultTransport::Http => "http",
        };
        if let Err(err) = self.transports.set_default(default_tag).await {
            warn!(%err, tag = default_tag, "configured default transport is not registered");
        }

        let handler: Arc<dyn MessageHandler> = self.clone();
        self.transports.start_all(handler).await
    }

    pub async fn shutdown(&self) -> Result<(), TransportError> {
        self.transports.stop_all().await
    }

    /// One session per distinct `(transport, client)` pair; a stdio
    /// transport never supplies a client id so it resolves to a single
    /// session for its whole lifetime, matching a real stdio connection.
    fn session_for(&self, context: &MessageContext) -> Arc<Session> {
        let key = context
            .client_id
            .clone()
            .unwrap_or_else(|| context.transport_tag.clone());
        self.sessions
            .entry(key)
            .or_insert_with(|| Arc::new(Session::new_with_client_id(context.client_id.clone())))
            .clone()
    }

    async fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event).await;
        }
    }

    #[instrument(level = "debug", skip(self, session, request))]
    async fn dispatch_request(
        &self,
        session: &Session,
        request: JsonRpcRequest,
        transport: &str,
    ) -> JsonRpcResponse {
        self.emit(Event::RequestReceived {
            method: request.method.clone(),
            transport: transport.to_string(),
        })
        .await;

        let started = Instant::now();

        if self.handler.is_cancelled(&request.id) {
            self.handler.clear_cancelled(&request.id);
            self.emit(Event::RequestProcessed {
                method: request.method.clone(),
                transport: transport.to_string(),
                duration: started.elapsed(),
                succeeded: false,
            })
            .await;
            return JsonRpcResponse::error(
                ProtocolError::Cancelled.to_error_object(),
                Some(request.id),
            );
        }

        let params = request.params.clone().unwrap_or(Value::Null);
        let outcome = self.handler.dispatch(session, &request.method, params).await;
        let succeeded = outcome.is_ok();

        self.emit(Event::RequestProcessed {
            method: request.method.clone(),
            transport: transport.to_string(),
            duration: started.elapsed(),
            succeeded,
        })
        .await;

        match outcome {
            Ok(value) => JsonRpcResponse::success(value, request.id),
            Err(err) => JsonRpcResponse::error(err.to_error_object(), Some(request.id)),
        }
    }

    async fn dispatch_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "$/cancelRequest" => {
                if let Some(params) = notification.params {
                    if let Ok(params) = serde_json::from_value::<CancelRequestParams>(params) {
                        self.handler.cancel_request(params).await;
                    }
                }
            }
            other => {
                info!(method = other, "unhandled notification, ignored");
            }
        }
    }
}

#[async_trait]
impl MessageHandler for Server {
    async fn handle_message(&self, bytes: Vec<u8>, context: MessageContext) -> Option<Vec<u8>> {
        let session = self.session_for(&context);

        match decode(&bytes) {
            Ok(DecodedMessage::Request(request)) => {
                let response = self
                    .dispatch_request(&session, request, &context.transport_tag)
                    .await;
                serde_json::to_vec(&response).ok()
            }
            Ok(DecodedMessage::Notification(notification)) => {
                self.dispatch_notification(notification).await;
                None
            }
            Ok(DecodedMessage::Batch(entries)) => {
                let mut responses = Vec::new();
                for entry in entries {
                    match entry {
                        BatchEntry::Request(request) => {
                            responses.push(
                                self.dispatch_request(&session, request, &context.transport_tag)
                                    .await,
                            );
                        }
                        BatchEntry::Notification(notification) => {
                            self.dispatch_notification(notification).await;
                        }
                        BatchEntry::Invalid { id, error } => {
                            responses.push(JsonRpcResponse::error(error, id));
                        }
                    }
                }
                if responses.is_empty() {
                    None
                } else {
                    serde_json::to_vec(&responses).ok()
                }
            }
            Err(err) => serde_json::to_vec(&JsonRpcResponse::error(err.to_error_object(), None)).ok(),
        }
    }
}
