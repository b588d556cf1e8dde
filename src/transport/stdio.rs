//! Newline-delimited stdio transport: one JSON-RPC message per line on
//! stdin, one per line on stdout. Single-producer/single-consumer, preserves
//! request order end-to-end, stops cleanly on EOF.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ConnectionInfo, MessageContext, MessageHandler, Transport, TransportError};

pub struct StdioTransport {
    connected: AtomicBool,
    writer: Arc<Mutex<tokio::io::Stdout>>,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            writer: Arc::new(Mutex::new(tokio::io::stdout())),
            task_handle: Mutex::new(None),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn initialize(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<(), TransportError> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadyStarted);
        }

        let writer = self.writer.clone();
        let task = tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let mut lines = BufReader::new(stdin).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let context = MessageContext {
                            transport_tag: "stdio".to_string(),
                            client_id: None,
                        };
                        if let Some(response) =
                            handler.handle_message(line.into_bytes(), context).await
                        {
                            // Shares the same mutex-guarded writer as `send`
                            // so an in-band response can never interleave
                            // mid-frame with a concurrent out-of-band push.
                            let mut stdout = writer.lock().await;
                            if let Err(err) = write_frame(&mut *stdout, &response).await {
                                warn!(%err, "failed writing stdio response frame");
                            }
                        }
                    }
                    Ok(None) => {
                        debug!("stdio transport reached EOF");
                        break;
                    }
                    Err(err) => {
                        warn!(%err, "stdio transport read error");
                        break;
                    }
                }
            }
        });

        *self.task_handle.lock().await = Some(task);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(task) = self.task_handle.lock().await.take() {
            task.abort();
        }
        Ok(())
    }

    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, bytes).await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            transport_tag: "stdio".to_string(),
            peer: None,
        }
    }

    fn tag(&self) -> &str {
        "stdio"
    }
}

async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, bytes: &[u8]) -> Result<(), TransportError> {
    writer.write_all(bytes).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle_message(&self, _bytes: Vec<u8>, _context: MessageContext) -> Option<Vec<u8>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    #[tokio::test]
    async fn start_marks_connected_and_rejects_double_start() {
        let transport = StdioTransport::new();
        let handler = Arc::new(CountingHandler(Arc::new(AtomicUsize::new(0))));
        transport.start(handler.clone()).await.unwrap();
        assert!(transport.is_connected());
        assert!(transport.start(handler).await.is_err());
        transport.stop().await.unwrap();
    }
}
