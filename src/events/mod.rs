//! The event hook bus: a best-effort, fire-and-forget publish/subscribe
//! mechanism the rest of the runtime emits lifecycle events on. Modeled on
//! the notification-broadcaster shape used elsewhere in the corpus, but
//! scoped to in-process listeners rather than wire notifications — this is
//! for host instrumentation (metrics, audit logs), not MCP clients.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, instrument, warn};

use crate::registry::ComponentKind;

/// A lifecycle event emitted by the registry, protocol handler, notification
/// hub, or async pipeline. Carries just enough structured data for a
/// listener to act on without reaching back into the emitting component.
#[derive(Debug, Clone)]
pub enum Event {
    ComponentRegistered { kind: ComponentKind, name: String },
    ComponentUnregistered { kind: ComponentKind, name: String },
    RequestReceived { method: String, transport: String },
    RequestProcessed {
        method: String,
        transport: String,
        duration: Duration,
        succeeded: bool,
    },
    ToolExecuted { name: String, duration: Duration },
    ResourceAccessed { uri: String },
    PromptGenerated { name: String },
    NotificationQueued { notification_id: String },
    NotificationSent { notification_id: String, client_id: String },
    NotificationDelivered { notification_id: String, client_id: String },
    NotificationFailed {
        notification_id: String,
        client_id: String,
        reason: String,
    },
    AsyncJobCompleted { request_id: String, duration: Duration },
    AsyncJobFailed { request_id: String, error: String },
}

impl Event {
    /// The name used for matching against listener filters and for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Event::ComponentRegistered { .. } => "component-registered",
            Event::ComponentUnregistered { .. } => "component-unregistered",
            Event::RequestReceived { .. } => "request-received",
            Event::RequestProcessed { .. } => "request-processed",
            Event::ToolExecuted { .. } => "tool-executed",
            Event::ResourceAccessed { .. } => "resource-accessed",
            Event::PromptGenerated { .. } => "prompt-generated",
            Event::NotificationQueued { .. } => "notification-queued",
            Event::NotificationSent { .. } => "notification-sent",
            Event::NotificationDelivered { .. } => "notification-delivered",
            Event::NotificationFailed { .. } => "notification-failed",
            Event::AsyncJobCompleted { .. } => "async-job-completed",
            Event::AsyncJobFailed { .. } => "async-job-failed",
        }
    }

    /// Per the open-question resolution on `wasSuccessful`: success means the
    /// handler produced a `result` envelope, failure means it produced an
    /// `error` envelope. Only meaningful for request-processed events.
    pub fn was_successful(&self) -> Option<bool> {
        match self {
            Event::RequestProcessed { succeeded, .. } => Some(*succeeded),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({ "event": self.name() })
    }
}

/// A pluggable event listener. Implementations must not be able to abort
/// the operation that produced the event — `on_event` has no way to signal
/// anything back, and any error inside an implementation is swallowed by
/// [`EventBus::emit`].
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &Event);
}

enum Dispatch {
    Synchronous,
    Background(mpsc::UnboundedSender<Event>),
}

/// Fans an [`Event`] out to every registered listener. Emission is
/// best-effort: a listener panicking or erroring never propagates back to
/// the caller of `emit`.
pub struct EventBus {
    listeners: Arc<std::sync::RwLock<Vec<Arc<dyn EventListener>>>>,
    dispatch: Dispatch,
}

impl EventBus {
    /// Listeners run inline, on the caller's task, in registration order.
    pub fn synchronous() -> Self {
        Self {
            listeners: Arc::new(std::sync::RwLock::new(Vec::new())),
            dispatch: Dispatch::Synchronous,
        }
    }

    /// Listeners run on a dedicated background task; `emit` only enqueues.
    /// Returns the bus plus the background task's join handle so the host
    /// can await a clean shutdown.
    pub fn background() -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let listeners: Arc<std::sync::RwLock<Vec<Arc<dyn EventListener>>>> =
            Arc::new(std::sync::RwLock::new(Vec::new()));
        let worker_listeners = listeners.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let snapshot: Vec<_> = worker_listeners.read().unwrap().clone();
                for listener in snapshot {
                    listener.on_event(&event).await;
                }
            }
        });
        (
            Self {
                listeners,
                dispatch: Dispatch::Background(tx),
            },
            handle,
        )
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    #[instrument(level = "debug", skip(self, event), fields(event = event.name()))]
    pub async fn emit(&self, event: Event) {
        match &self.dispatch {
            Dispatch::Synchronous => {
                let snapshot: Vec<_> = self.listeners.read().unwrap().clone();
                for listener in snapshot {
                    listener.on_event(&event).await;
                }
            }
            Dispatch::Background(tx) => {
                if tx.send(event).is_err() {
                    warn!("event bus background worker is gone, dropping event");
                }
            }
        }
    }
}

/// A listener that forwards events into `tracing`, matching the rest of the
/// runtime's diagnostics story rather than a bespoke log sink.
pub struct TracingEventListener;

#[async_trait]
impl EventListener for TracingEventListener {
    async fn on_event(&self, event: &Event) {
        match event {
            Event::AsyncJobFailed { request_id, error } => {
                error!(request_id, error, "async job failed")
            }
            other => tracing::info!(event = other.name(), "{:?}", other),
        }
    }
}
