//! The external work queue the notification hub enqueues retries onto.
//! Modeled as a trait so a host can back it with a real queue; the runtime
//! ships only an in-process default.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

/// One unit of retry work: redeliver `notification_id` to `client_id` after
/// `delay`.
#[derive(Debug, Clone)]
pub struct RetryJob {
    pub notification_id: String,
    pub client_id: String,
    pub delay: Duration,
}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, job: RetryJob);
}

/// The in-process default: a background task that sleeps `job.delay` then
/// invokes a callback supplied at construction (the hub's `deliver_sync`).
pub struct InProcessQueue {
    sender: mpsc::UnboundedSender<RetryJob>,
}

impl InProcessQueue {
    pub fn new<F, Fut>(on_due: F) -> (Self, tokio::task::JoinHandle<()>)
    where
        F: Fn(RetryJob) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<RetryJob>();
        let on_due = Arc::new(on_due);
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let on_due = on_due.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(job.delay).await;
                    on_due(job).await;
                });
            }
        });
        (Self { sender: tx }, handle)
    }
}

#[async_trait]
impl NotificationQueue for InProcessQueue {
    async fn enqueue(&self, job: RetryJob) {
        if self.sender.send(job).is_err() {
            warn!("notification retry queue worker is gone, dropping retry");
        }
    }
}
