//! Per-connection session state: the `uninitialized -> initializing -> ready
//! -> shutting-down` machine every transport's message handler consults
//! before dispatching a method.

use tokio::sync::RwLock;

use crate::protocol::{
    ClientCapabilities, LoggingCapabilities, PromptCapabilities, ProtocolError, ProtocolResult,
    ProtocolVersion, ResourceCapabilities, ServerCapabilities, ToolCapabilities,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
}

struct Negotiated {
    protocol_version: ProtocolVersion,
    client_capabilities: ClientCapabilities,
    server_capabilities: ServerCapabilities,
}

/// One client connection's state. A stdio transport has exactly one session
/// for its lifetime; an HTTP transport's notion of "session" is whatever the
/// host chooses to key by (a header, a connection) — this type doesn't care,
/// it just holds the state machine.
pub struct Session {
    state: RwLock<SessionState>,
    negotiated: RwLock<Option<Negotiated>>,
    client_id: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SessionState::Uninitialized),
            negotiated: RwLock::new(None),
            client_id: None,
        }
    }

    /// A session bound to a transport-supplied client identifier, used by
    /// operations (resource subscriptions) that need somewhere to route a
    /// later push back to.
    pub fn new_with_client_id(client_id: Option<String>) -> Self {
        Self {
            client_id,
            ..Self::new()
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// A session that starts in `Ready` with every capability already
    /// granted, for work that was accepted server-side and never goes
    /// through the wire `initialize` handshake (the async pipeline's
    /// internal jobs) — there is no client to negotiate against, so it is
    /// trusted with everything the handler exposes.
    pub fn ready_with_defaults() -> Self {
        Self {
            state: RwLock::new(SessionState::Ready),
            negotiated: RwLock::new(Some(Negotiated {
                protocol_version: ProtocolVersion::current(),
                client_capabilities: ClientCapabilities::default(),
                server_capabilities: ServerCapabilities {
                    logging: Some(LoggingCapabilities::default()),
                    tools: Some(ToolCapabilities::default()),
                    resources: Some(ResourceCapabilities::default()),
                    prompts: Some(PromptCapabilities::default()),
                },
            })),
            client_id: None,
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Begin `initialize`: only legal from `Uninitialized`. A second
    /// `initialize` on a session that already reached `Ready` is rejected,
    /// surfaced by the caller as an invalid-request error.
    pub async fn begin_initialize(&self) -> ProtocolResult<()> {
        let mut state = self.state.write().await;
        match *state {
            SessionState::Uninitialized => {
                *state = SessionState::Initializing;
                Ok(())
            }
            _ => Err(ProtocolError::session_not_ready(
                "initialize is only valid on an uninitialized session",
            )),
        }
    }

    pub async fn complete_initialize(
        &self,
        protocol_version: ProtocolVersion,
        client_capabilities: ClientCapabilities,
        server_capabilities: ServerCapabilities,
    ) {
        *self.negotiated.write().await = Some(Negotiated {
            protocol_version,
            client_capabilities,
            server_capabilities,
        });
        *self.state.write().await = SessionState::Ready;
    }

    /// Every non-initialize, non-internal method must pass this check first.
    pub async fn require_ready(&self) -> ProtocolResult<()> {
        match self.state().await {
            SessionState::Ready => Ok(()),
            _ => Err(ProtocolError::session_not_ready(
                "session is not initialized",
            )),
        }
    }

    pub async fn begin_shutdown(&self) {
        *self.state.write().await = SessionState::ShuttingDown;
    }

    pub async fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.negotiated
            .read()
            .await
            .as_ref()
            .map(|n| n.server_capabilities.clone())
    }

    pub async fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.negotiated
            .read()
            .await
            .as_ref()
            .map(|n| n.client_capabilities.clone())
    }

    pub async fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.negotiated
            .read()
            .await
            .as_ref()
            .map(|n| n.protocol_version.clone())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_uninitialized_and_rejects_non_initialize() {
        let session = Session::new();
        assert_eq!(session.state().await, SessionState::Uninitialized);
        assert!(session.require_ready().await.is_err());
    }

    #[tokio::test]
    async fn initialize_transitions_to_ready() {
        let session = Session::new();
        session.begin_initialize().await.unwrap();
        session
            .complete_initialize(
                ProtocolVersion::current(),
                ClientCapabilities::default(),
                ServerCapabilities::default(),
            )
            .await;
        assert_eq!(session.state().await, SessionState::Ready);
        assert!(session.require_ready().await.is_ok());
    }

    #[tokio::test]
    async fn second_initialize_on_ready_session_fails() {
        let session = Session::new();
        session.begin_initialize().await.unwrap();
        session
            .complete_initialize(
                ProtocolVersion::current(),
                ClientCapabilities::default(),
                ServerCapabilities::default(),
            )
            .await;
        assert!(session.begin_initialize().await.is_err());
    }
}
