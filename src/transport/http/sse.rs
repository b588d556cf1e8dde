//! Server-Sent-Events streaming: one long-lived GET per subscriber, notified
//! payloads pushed as `data:` lines, heartbeat comments at least every 30s,
//! and the bound subscription cleared on disconnect.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, KeepAliveStream, Sse};
use dashmap::DashMap;
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::transport::TransportError;

/// Registry of open SSE streams keyed by client id. The notification hub
/// pushes a serialized notification payload to a specific client through
/// here when a subscription was opened over SSE.
#[derive(Default)]
pub struct SseBroadcaster {
    streams: DashMap<String, mpsc::UnboundedSender<String>>,
}

impl SseBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new stream for `client_id`, replacing any prior one (a
    /// client reconnecting supersedes its earlier stream). The returned
    /// stream owns a clone of this broadcaster and closes `client_id`'s
    /// entry automatically when it's dropped (the client disconnected, or
    /// axum tore the body down for any other reason), so a subscription
    /// never outlives its connection.
    pub fn open(
        self: Arc<Self>,
        client_id: impl Into<String>,
    ) -> impl Stream<Item = Result<SseEvent, std::convert::Infallible>> {
        let client_id = client_id.into();
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        self.streams.insert(client_id.clone(), tx);
        let inner = UnboundedReceiverStream::new(rx).map(|payload| Ok(SseEvent::default().data(payload)));
        GuardedStream {
            inner,
            _guard: SseGuard {
                broadcaster: self,
                client_id,
            },
        }
    }

    pub fn push(&self, client_id: &str, payload: String) -> Result<(), TransportError> {
        match self.streams.get(client_id) {
            Some(sender) => sender
                .send(payload)
                .map_err(|_| TransportError::NotConnected),
            None => Err(TransportError::NotConnected),
        }
    }

    pub fn close(&self, client_id: &str) {
        if self.streams.remove(client_id).is_some() {
            debug!(client_id, "sse stream closed, subscription will be cleared");
        }
    }

    pub fn is_open(&self, client_id: &str) -> bool {
        self.streams.contains_key(client_id)
    }
}

use futures::StreamExt;

struct SseGuard {
    broadcaster: Arc<SseBroadcaster>,
    client_id: String,
}

impl Drop for SseGuard {
    fn drop(&mut self) {
        self.broadcaster.close(&self.client_id);
    }
}

/// Wraps an inner stream with a value that only matters for its `Drop`.
/// Both `S` and `SseGuard` are `Unpin`, so polling through a `&mut Self`
/// obtained from `get_mut` is sound without structural pinning.
struct GuardedStream<S> {
    inner: S,
    _guard: SseGuard,
}

impl<S: Stream + Unpin> Stream for GuardedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(Duration::from_secs(25)).text("")
}

pub type SseResponse = Sse<KeepAliveStream<std::pin::Pin<Box<dyn Stream<Item = Result<SseEvent, std::convert::Infallible>> + Send>>>>;

pub fn sse_response(
    broadcaster: Arc<SseBroadcaster>,
    client_id: String,
) -> SseResponse {
    let stream = broadcaster.open(client_id);
    Sse::new(Box::pin(stream) as std::pin::Pin<Box<dyn Stream<Item = _> + Send>>).keep_alive(keep_alive())
}
