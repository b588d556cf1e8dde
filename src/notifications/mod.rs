//! The notification hub: subscribe/filter/broadcast with three delivery
//! paths (direct, queued, SSE) and per-`(notification_id, client_id)`
//! delivery tracking.

pub mod queue;

pub use queue::{InProcessQueue, NotificationQueue, RetryJob};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::events::{Event, EventBus};
use crate::protocol::NotificationType;
use crate::server::config::NotificationDefaults;
use crate::transport::http::SseBroadcaster;
use crate::transport::{Transport, TransportError};

/// How a notification reaches a given subscriber.
#[derive(Clone)]
pub enum TransportHandle {
    Direct(Arc<dyn Transport>),
    Sse(Arc<SseBroadcaster>, String),
}

impl TransportHandle {
    async fn push(&self, payload: &[u8]) -> Result<(), TransportError> {
        match self {
            TransportHandle::Direct(transport) => transport.send(payload).await,
            TransportHandle::Sse(broadcaster, client_id) => {
                let text = String::from_utf8_lossy(payload).into_owned();
                broadcaster.push(client_id, text)
            }
        }
    }

    fn is_sse(&self) -> bool {
        matches!(self, TransportHandle::Sse(..))
    }
}

#[derive(Debug, Clone)]
pub struct NotificationOptions {
    pub priority: String,
    pub tries: u32,
    pub backoff_multiplier: u32,
    pub queue: bool,
    pub result_ttl: Duration,
}

impl NotificationOptions {
    pub fn from_defaults(defaults: &NotificationDefaults) -> Self {
        Self {
            priority: defaults.priority.clone(),
            tries: defaults.tries,
            backoff_multiplier: defaults.backoff_multiplier,
            queue: false,
            result_ttl: defaults.result_ttl,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub id: String,
    pub notification_type: NotificationType,
    pub params: Value,
    pub timestamp: DateTime<Utc>,
    pub options: NotificationOptions,
    pub client_id: Option<String>,
}

impl NotificationRecord {
    fn as_filter_target(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "type": self.notification_type.as_method_suffix(),
            "params": self.params,
            "options": { "priority": self.options.priority },
            "client_id": self.client_id,
        })
    }

    fn encode(&self) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": format!("notifications/{}", self.notification_type.as_method_suffix()),
            "params": self.params,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Queued,
    Sent,
    Delivered,
    Failed,
    FailedExhausted,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::FailedExhausted)
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryStatus {
    pub state: DeliveryState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub last_transition: DateTime<Utc>,
}

impl DeliveryStatus {
    fn new(state: DeliveryState) -> Self {
        Self {
            state,
            attempts: 0,
            last_error: None,
            last_transition: Utc::now(),
        }
    }

    fn transition(&mut self, state: DeliveryState, error: Option<String>) {
        self.state = state;
        self.last_error = error;
        self.last_transition = Utc::now();
    }
}

/// A dotted-path -> expected-value filter, matched against the notification
/// record's JSON projection (`as_filter_target`).
pub type Filter = HashMap<String, Value>;

#[derive(Clone)]
pub struct Subscription {
    pub client_id: String,
    pub types: Vec<NotificationType>,
    pub filter: Filter,
    pub transport: Option<TransportHandle>,
}

impl Subscription {
    fn matches(&self, record: &NotificationRecord) -> bool {
        let type_matches =
            self.types.is_empty() || self.types.contains(&record.notification_type);
        type_matches && filter_matches(&self.filter, &record.as_filter_target())
    }
}

fn filter_matches(filter: &Filter, target: &Value) -> bool {
    filter.iter().all(|(path, expected)| {
        resolve_path(target, path)
            .map(|actual| actual == expected)
            .unwrap_or(false)
    })
}

fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

const BACKPRESSURE_QUEUE_DEPTH: usize = 256;

pub struct NotificationHub {
    subscriptions: DashMap<String, Subscription>,
    delivery_status: DashMap<(String, String), DeliveryStatus>,
    pending: DashMap<String, tokio::sync::Mutex<VecDeque<String>>>,
    in_flight: DashMap<String, NotificationRecord>,
    queue: std::sync::OnceLock<Arc<dyn NotificationQueue>>,
    events: Option<Arc<EventBus>>,
    defaults: NotificationDefaults,
}

impl NotificationHub {
    pub fn new(defaults: NotificationDefaults, events: Option<Arc<EventBus>>) -> Self {
        Self {
            subscriptions: DashMap::new(),
            delivery_status: DashMap::new(),
            pending: DashMap::new(),
            in_flight: DashMap::new(),
            queue: std::sync::OnceLock::new(),
            events,
            defaults,
        }
    }

    /// Binds the retry queue after construction — the queue's own retry
    /// callback needs a handle to this hub, so the hub must exist first.
    pub fn set_queue(&self, queue: Arc<dyn NotificationQueue>) {
        let _ = self.queue.set(queue);
    }

    /// Invoked by the retry queue's callback when a delayed redelivery comes
    /// due. Looks up the still-pending record and subscription by id.
    pub async fn handle_retry(&self, job: RetryJob) {
        let Some((_, record)) = self.in_flight.remove(&job.notification_id) else {
            return;
        };
        let Some(subscription) = self.subscriptions.get(&job.client_id).map(|e| e.clone()) else {
            return;
        };
        let attempt = self
            .delivery_status
            .get(&(job.notification_id.clone(), job.client_id.clone()))
            .map(|s| s.attempts + 1)
            .unwrap_or(1);
        self.in_flight.insert(job.notification_id.clone(), record.clone());
        self.deliver_sync(&subscription, record, attempt).await;
    }

    pub fn subscribe(
        &self,
        client_id: impl Into<String>,
        types: Vec<NotificationType>,
        transport: Option<TransportHandle>,
    ) -> Subscription {
        let client_id = client_id.into();
        let subscription = Subscription {
            client_id: client_id.clone(),
            types,
            filter: Filter::new(),
            transport,
        };
        self.subscriptions.insert(client_id, subscription.clone());
        subscription
    }

    pub fn unsubscribe(&self, client_id: &str) {
        self.subscriptions.remove(client_id);
        self.pending.remove(client_id);
    }

    pub fn update_filter(&self, client_id: &str, filter: Filter) -> bool {
        match self.subscriptions.get_mut(client_id) {
            Some(mut sub) => {
                sub.filter = filter;
                true
            }
            None => false,
        }
    }

    pub fn get_active_subscriptions(&self) -> HashMap<String, Subscription> {
        self.subscriptions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn get_delivery_status(&self, notification_id: &str) -> HashMap<String, DeliveryStatus> {
        self.delivery_status
            .iter()
            .filter(|entry| entry.key().0 == notification_id)
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect()
    }

    /// Target exactly one client, bypassing filter matching (the caller
    /// already knows who it's for).
    #[instrument(level = "debug", skip(self, params))]
    pub async fn notify(
        &self,
        client_id: &str,
        notification_type: NotificationType,
        params: Value,
        options: Option<NotificationOptions>,
    ) -> String {
        let record = NotificationRecord {
            id: Uuid::new_v4().to_string(),
            notification_type,
            params,
            timestamp: Utc::now(),
            options: options.unwrap_or_else(|| NotificationOptions::from_defaults(&self.defaults)),
            client_id: Some(client_id.to_string()),
        };

        if let Some(subscription) = self.subscriptions.get(client_id).map(|e| e.clone()) {
            self.deliver_to(&subscription, record.clone()).await;
        }
        record.id
    }

    /// Snapshot subscriptions, deliver to every match, sharing one id.
    #[instrument(level = "debug", skip(self, params))]
    pub async fn broadcast(
        &self,
        notification_type: NotificationType,
        params: Value,
        options: Option<NotificationOptions>,
    ) -> String {
        let record = NotificationRecord {
            id: Uuid::new_v4().to_string(),
            notification_type,
            params,
            timestamp: Utc::now(),
            options: options.unwrap_or_else(|| NotificationOptions::from_defaults(&self.defaults)),
            client_id: None,
        };

        self.emit(Event::NotificationQueued {
            notification_id: record.id.clone(),
        })
        .await;

        let matching: Vec<Subscription> = self
            .subscriptions
            .iter()
            .map(|e| e.value().clone())
            .filter(|sub| sub.matches(&record))
            .collect();

        for subscription in matching {
            self.deliver_to(&subscription, record.clone()).await;
        }

        record.id
    }

    async fn deliver_to(&self, subscription: &Subscription, record: NotificationRecord) {
        let key = (record.id.clone(), subscription.client_id.clone());
        self.delivery_status
            .insert(key.clone(), DeliveryStatus::new(DeliveryState::Queued));
        self.in_flight.insert(record.id.clone(), record.clone());
        self.deliver_sync(subscription, record, 1).await;
    }

    /// The synchronous delivery path a retry job calls back into directly
    /// (no reflection into hub internals — first-class entry point).
    pub async fn deliver_sync(&self, subscription: &Subscription, record: NotificationRecord, attempt: u32) {
        let key = (record.id.clone(), subscription.client_id.clone());

        let Some(transport) = &subscription.transport else {
            self.mark(&key, DeliveryState::FailedExhausted, Some("no bound transport".to_string())).await;
            return;
        };

        if let Some(dropped_id) = self
            .push_respecting_backpressure(&subscription.client_id, &record.id)
            .await
        {
            self.in_flight.remove(&dropped_id);
            self.mark(
                &(dropped_id.clone(), subscription.client_id.clone()),
                DeliveryState::FailedExhausted,
                Some("backpressure overflow".to_string()),
            )
            .await;
            self.emit(Event::NotificationFailed {
                notification_id: dropped_id.clone(),
                client_id: subscription.client_id.clone(),
                reason: "overflow".to_string(),
            })
            .await;
            if dropped_id == record.id {
                // This delivery's own record was the one dropped to make
                // room; there's nothing left to push.
                return;
            }
        }

        let payload = serde_json::to_vec(&record.encode()).unwrap_or_default();
        match transport.push(&payload).await {
            Ok(()) => {
                let state = if transport.is_sse() {
                    DeliveryState::Sent
                } else {
                    DeliveryState::Delivered
                };
                self.mark(&key, state.clone(), None).await;
                if state == DeliveryState::Delivered {
                    self.in_flight.remove(&record.id);
                    self.dequeue(&subscription.client_id, &record.id).await;
                    self.emit(Event::NotificationDelivered {
                        notification_id: record.id.clone(),
                        client_id: subscription.client_id.clone(),
                    })
                    .await;
                } else {
                    self.emit(Event::NotificationSent {
                        notification_id: record.id.clone(),
                        client_id: subscription.client_id.clone(),
                    })
                    .await;
                }
            }
            Err(err) => {
                if attempt >= record.options.tries {
                    self.in_flight.remove(&record.id);
                    self.mark(&key, DeliveryState::FailedExhausted, Some(err.to_string())).await;
                    self.dequeue(&subscription.client_id, &record.id).await;
                    self.emit(Event::NotificationFailed {
                        notification_id: record.id.clone(),
                        client_id: subscription.client_id.clone(),
                        reason: err.to_string(),
                    })
                    .await;
                } else {
                    self.mark(&key, DeliveryState::Failed, Some(err.to_string())).await;
                    self.schedule_retry(&subscription.client_id, &record, attempt).await;
                }
            }
        }
    }

    async fn schedule_retry(&self, client_id: &str, record: &NotificationRecord, attempt: u32) {
        let Some(queue) = self.queue.get() else {
            warn!("no retry queue configured, dropping failed delivery");
            return;
        };
        let delay = Duration::from_secs(
            record.options.backoff_multiplier.pow(attempt) as u64,
        );
        queue
            .enqueue(RetryJob {
                notification_id: record.id.clone(),
                client_id: client_id.to_string(),
                delay,
            })
            .await;
    }

    /// Bounded per-subscription queue of outstanding (non-terminal) notification
    /// ids: queues `notification_id` for real, and on overflow pops and
    /// returns the oldest entry for the caller to fail. The returned id may
    /// be `notification_id` itself, if the queue was already at depth.
    async fn push_respecting_backpressure(&self, client_id: &str, notification_id: &str) -> Option<String> {
        let queue = self
            .pending
            .entry(client_id.to_string())
            .or_insert_with(|| tokio::sync::Mutex::new(VecDeque::new()));
        let mut queue = queue.lock().await;
        queue.push_back(notification_id.to_string());
        if queue.len() > BACKPRESSURE_QUEUE_DEPTH {
            queue.pop_front()
        } else {
            None
        }
    }

    /// Removes a notification id from its client's outstanding queue once
    /// delivery reaches a terminal state, so the queue's length reflects
    /// what's actually still in flight rather than every id ever queued.
    async fn dequeue(&self, client_id: &str, notification_id: &str) {
        if let Some(queue) = self.pending.get(client_id) {
            queue.lock().await.retain(|id| id != notification_id);
        }
    }

    async fn mark(&self, key: &(String, String), state: DeliveryState, error: Option<String>) {
        if let Some(mut status) = self.delivery_status.get_mut(key) {
            status.attempts += 1;
            status.transition(state, error);
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ConnectionInfo, MessageHandler};

    fn options() -> NotificationOptions {
        NotificationOptions::from_defaults(&NotificationDefaults::default())
    }

    struct AlwaysErrTransport;

    #[async_trait::async_trait]
    impl Transport for AlwaysErrTransport {
        async fn initialize(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn start(&self, _handler: Arc<dyn MessageHandler>) -> Result<(), TransportError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn send(&self, _bytes: &[u8]) -> Result<(), TransportError> {
            Err(TransportError::NotConnected)
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn connection_info(&self) -> ConnectionInfo {
            ConnectionInfo {
                transport_tag: "test".to_string(),
                peer: None,
            }
        }
        fn tag(&self) -> &str {
            "test"
        }
    }

    /// Reproduces a sustained backlog of never-acknowledged deliveries for
    /// one subscriber and checks that the depth limit actually bites: the
    /// oldest outstanding notification is failed out once the real
    /// outstanding count exceeds [`BACKPRESSURE_QUEUE_DEPTH`], and later
    /// ones keep retrying rather than silently vanishing.
    #[tokio::test]
    async fn backpressure_overflow_fails_the_oldest_outstanding_notification() {
        let hub = NotificationHub::new(NotificationDefaults::default(), None);
        hub.subscribe(
            "client",
            vec![],
            Some(TransportHandle::Direct(Arc::new(AlwaysErrTransport))),
        );

        let mut ids = Vec::new();
        for _ in 0..=BACKPRESSURE_QUEUE_DEPTH {
            let id = hub
                .broadcast(
                    NotificationType::ToolsListChanged,
                    serde_json::json!({}),
                    Some(NotificationOptions {
                        tries: 1000,
                        ..options()
                    }),
                )
                .await;
            ids.push(id);
        }

        let first_status = hub.get_delivery_status(&ids[0]);
        assert_eq!(
            first_status.get("client").unwrap().state,
            DeliveryState::FailedExhausted
        );

        let last_status = hub.get_delivery_status(ids.last().unwrap());
        assert_eq!(last_status.get("client").unwrap().state, DeliveryState::Failed);
    }

    #[tokio::test]
    async fn broadcast_to_two_filtered_subscribers() {
        let hub = NotificationHub::new(NotificationDefaults::default(), None);

        hub.subscribe("A", vec![NotificationType::ToolsListChanged], None);
        let sub_b = hub.subscribe("B", vec![], None);
        hub.update_filter("B", {
            let mut f = Filter::new();
            f.insert("options.priority".to_string(), serde_json::json!("high"));
            f
        });
        let _ = sub_b;

        let id = hub
            .broadcast(
                NotificationType::ToolsListChanged,
                serde_json::json!({}),
                Some(NotificationOptions {
                    priority: "low".to_string(),
                    ..options()
                }),
            )
            .await;

        let statuses = hub.get_delivery_status(&id);
        // A matches by type (no bound transport -> failed-exhausted, still
        // a terminal entry); B is filtered out entirely and has no entry.
        assert_eq!(statuses.len(), 1);
        assert!(statuses.contains_key("A"));
        assert!(statuses.get("A").unwrap().state.is_terminal());
    }

    #[test]
    fn filter_matches_nested_path() {
        let mut filter = Filter::new();
        filter.insert("options.priority".to_string(), serde_json::json!("high"));
        let target = serde_json::json!({ "options": { "priority": "high" } });
        assert!(filter_matches(&filter, &target));

        let mismatched = serde_json::json!({ "options": { "priority": "low" } });
        assert!(!filter_matches(&filter, &mismatched));
    }
}
