//! Out-of-band execution of an MCP method: `async` submits a job, the
//! worker executes it against the same [`ProtocolHandler`] dispatch the
//! in-band path uses, and `asyncStatus`/`asyncResult` poll the cache-backed
//! record by request id.

pub mod cache;

pub use cache::{AsyncCache, InMemoryCache, SharedCache};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::events::{Event, EventBus};
use crate::protocol::{ErrorSnapshot, ProtocolError};
use crate::server::handler::ProtocolHandler;
use crate::server::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncStatusRecord {
    pub request_id: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub queued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncResultRecord {
    pub request_id: String,
    pub result: Option<Value>,
    pub error: Option<ErrorSnapshot>,
    pub execution_time_ms: u64,
}

/// Per-attempt timeout.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(300);
/// Total wall-clock retry horizon, independent of per-attempt timeouts.
const RETRY_UNTIL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct AsyncJobOptions {
    pub result_ttl: Duration,
}

impl Default for AsyncJobOptions {
    fn default() -> Self {
        Self {
            result_ttl: Duration::from_secs(3600),
        }
    }
}

/// Status records live for a fixed, short window regardless of the job's
/// own result TTL — a caller that never polls shouldn't keep it alive.
const STATUS_TTL: Duration = Duration::from_secs(300);

pub struct AsyncPipeline {
    handler: Arc<ProtocolHandler>,
    cache: SharedCache,
    events: Option<Arc<EventBus>>,
    system_session: Arc<Session>,
}

impl AsyncPipeline {
    pub fn new(handler: Arc<ProtocolHandler>, cache: SharedCache, events: Option<Arc<EventBus>>) -> Self {
        Self {
            handler,
            cache,
            events,
            system_session: Arc::new(ready_session()),
        }
    }

    /// Accepts an MCP call for background execution, returning immediately
    /// with the request id the caller polls by.
    #[instrument(level = "debug", skip(self, params))]
    pub async fn submit(&self, method: String, params: Value, options: Option<AsyncJobOptions>) -> String {
        let request_id = Uuid::new_v4().to_string();
        let options = options.unwrap_or_default();
        let queued_at = Utc::now();

        self.write_status(&request_id, JobStatus::Queued, 0, queued_at, None)
            .await;

        let handler = self.handler.clone();
        let cache = self.cache.clone();
        let events = self.events.clone();
        let session = self.system_session.clone();
        let id_for_task = request_id.clone();

        tokio::spawn(async move {
            run_job(handler, cache, events, session, id_for_task, method, params, options, queued_at).await;
        });

        request_id
    }

    pub async fn status(&self, request_id: &str) -> Option<AsyncStatusRecord> {
        let value = self.cache.get(&cache::status_key(request_id)).await?;
        serde_json::from_value(value).ok()
    }

    pub async fn result(&self, request_id: &str) -> Option<AsyncResultRecord> {
        let value = self.cache.get(&cache::result_key(request_id)).await?;
        serde_json::from_value(value).ok()
    }

    async fn write_status(
        &self,
        request_id: &str,
        status: JobStatus,
        attempts: u32,
        queued_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) {
        let record = AsyncStatusRecord {
            request_id: request_id.to_string(),
            status,
            attempts,
            queued_at,
            updated_at: Utc::now(),
            completed_at,
        };
        self.cache
            .set(
                cache::status_key(request_id),
                serde_json::to_value(&record).unwrap_or_default(),
                STATUS_TTL,
            )
            .await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    handler: Arc<ProtocolHandler>,
    cache: SharedCache,
    events: Option<Arc<EventBus>>,
    session: Arc<Session>,
    request_id: String,
    method: String,
    params: Value,
    options: AsyncJobOptions,
    queued_at: DateTime<Utc>,
) {
    let deadline = Instant::now() + RETRY_UNTIL;
    let mut attempts = 0u32;

    set_status(&cache, &request_id, JobStatus::Processing, attempts, queued_at, None).await;

    loop {
        attempts += 1;
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            ATTEMPT_TIMEOUT,
            handler.dispatch(&session, &method, params.clone()),
        )
        .await;

        match outcome {
            Ok(Ok(result)) => {
                let execution_time_ms = started.elapsed().as_millis() as u64;
                let completed_at = Utc::now();
                set_status(
                    &cache,
                    &request_id,
                    JobStatus::Completed,
                    attempts,
                    queued_at,
                    Some(completed_at),
                )
                .await;
                cache
                    .set(
                        cache::result_key(&request_id),
                        serde_json::to_value(AsyncResultRecord {
                            request_id: request_id.clone(),
                            result: Some(result),
                            error: None,
                            execution_time_ms,
                        })
                        .unwrap_or_default(),
                        options.result_ttl,
                    )
                    .await;

                if let Some(events) = &events {
                    events
                        .emit(Event::AsyncJobCompleted {
                            request_id: request_id.clone(),
                            duration: started.elapsed(),
                        })
                        .await;
                    events
                        .emit(Event::RequestProcessed {
                            method: method.clone(),
                            transport: "async".to_string(),
                            duration: started.elapsed(),
                            succeeded: true,
                        })
                        .await;
                }
                return;
            }
            Ok(Err(err)) => {
                if !is_retryable(&err) || Instant::now() >= deadline {
                    fail_job(&cache, &events, &request_id, queued_at, attempts, err).await;
                    return;
                }
                warn!(request_id, attempt = attempts, error = %err, "async job attempt failed, retrying");
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempts.min(6)))).await;
            }
            Err(_elapsed) => {
                let err = ProtocolError::Timeout;
                if Instant::now() >= deadline {
                    fail_job(&cache, &events, &request_id, queued_at, attempts, err).await;
                    return;
                }
                warn!(request_id, attempt = attempts, "async job attempt timed out, retrying");
            }
        }
    }
}

async fn fail_job(
    cache: &SharedCache,
    events: &Option<Arc<EventBus>>,
    request_id: &str,
    queued_at: DateTime<Utc>,
    attempts: u32,
    err: ProtocolError,
) {
    let completed_at = Utc::now();
    set_status(cache, request_id, JobStatus::Failed, attempts, queued_at, Some(completed_at)).await;
    cache
        .set(
            cache::result_key(request_id),
            serde_json::to_value(AsyncResultRecord {
                request_id: request_id.to_string(),
                result: None,
                error: Some(ErrorSnapshot::from(&err)),
                execution_time_ms: 0,
            })
            .unwrap_or_default(),
            Duration::from_secs(3600),
        )
        .await;
    if let Some(events) = events {
        events
            .emit(Event::AsyncJobFailed {
                request_id: request_id.to_string(),
                error: err.to_string(),
            })
            .await;
    }
}

async fn set_status(
    cache: &SharedCache,
    request_id: &str,
    status: JobStatus,
    attempts: u32,
    queued_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
) {
    let record = AsyncStatusRecord {
        request_id: request_id.to_string(),
        status,
        attempts,
        queued_at,
        updated_at: Utc::now(),
        completed_at,
    };
    cache
        .set(
            cache::status_key(request_id),
            serde_json::to_value(&record).unwrap_or_default(),
            STATUS_TTL,
        )
        .await;
}

/// Only failures plausibly caused by transient conditions are retried;
/// a malformed request or an unknown method will never succeed on replay.
fn is_retryable(err: &ProtocolError) -> bool {
    matches!(err, ProtocolError::Internal(_) | ProtocolError::Timeout)
}

fn ready_session() -> Session {
    // Async jobs run against a standing internal session that never went
    // through the wire `initialize` handshake: capability negotiation is a
    // concern for transport-facing clients, not for work the server itself
    // already accepted as a submitted job. It still has to start `Ready`,
    // or every session-gated method (tools/call included) would fail before
    // the job ever runs.
    Session::ready_with_defaults()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::server::config::ServerConfig;

    fn handler() -> Arc<ProtocolHandler> {
        Arc::new(ProtocolHandler::new(
            Arc::new(Registry::new()),
            None,
            None,
            &ServerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn submit_and_poll_until_completed() {
        let pipeline = AsyncPipeline::new(handler(), Arc::new(InMemoryCache::new()), None);
        let id = pipeline.submit("ping".to_string(), serde_json::json!(null), None).await;

        let mut status = pipeline.status(&id).await;
        let mut attempts = 0;
        while !matches!(status.as_ref().map(|s| s.status), Some(JobStatus::Completed) | Some(JobStatus::Failed)) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = pipeline.status(&id).await;
            attempts += 1;
            assert!(attempts < 500, "job never settled");
        }

        assert_eq!(status.unwrap().status, JobStatus::Completed);
        let result = pipeline.result(&id).await.unwrap();
        assert_eq!(result.result, Some(serde_json::json!({})));
    }

    #[tokio::test]
    async fn submit_against_an_unknown_tool_fails_fast() {
        let pipeline = AsyncPipeline::new(handler(), Arc::new(InMemoryCache::new()), None);
        let id = pipeline
            .submit(
                "tools/call".to_string(),
                serde_json::json!({"name": "missing", "arguments": {}}),
                None,
            )
            .await;

        let mut status = pipeline.status(&id).await;
        let mut attempts = 0;
        while !matches!(status.as_ref().map(|s| s.status), Some(JobStatus::Completed) | Some(JobStatus::Failed)) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = pipeline.status(&id).await;
            attempts += 1;
            assert!(attempts < 500, "job never settled");
        }

        assert_eq!(status.unwrap().status, JobStatus::Failed);
        let result = pipeline.result(&id).await.unwrap();
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn async_tool_call_round_trips_through_the_registry() {
        use crate::providers::EchoTool;
        use crate::registry::{Component, ComponentKind, ComponentMetadata};

        let registry = Arc::new(Registry::new());
        registry
            .register(
                ComponentKind::Tool,
                "echo",
                Component::Tool(Arc::new(EchoTool::new())),
                ComponentMetadata::default(),
                false,
            )
            .await
            .unwrap();
        let handler = Arc::new(ProtocolHandler::new(registry, None, None, &ServerConfig::default()));
        let pipeline = AsyncPipeline::new(handler, Arc::new(InMemoryCache::new()), None);

        let id = pipeline
            .submit(
                "tools/call".to_string(),
                serde_json::json!({"name": "echo", "arguments": {"s": "hi"}}),
                None,
            )
            .await;

        let mut status = pipeline.status(&id).await;
        let mut attempts = 0;
        while !matches!(status.as_ref().map(|s| s.status), Some(JobStatus::Completed) | Some(JobStatus::Failed)) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = pipeline.status(&id).await;
            attempts += 1;
            assert!(attempts < 500, "job never settled");
        }

        assert_eq!(status.unwrap().status, JobStatus::Completed);
        let result = pipeline.result(&id).await.unwrap();
        let text = result.result.unwrap()["content"][0]["text"].as_str().unwrap().to_string();
        assert_eq!(text, "hi");
    }
}
