use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport is not connected")]
    NotConnected,
    #[error("transport already started")]
    AlreadyStarted,
    #[error("unknown transport driver: {0}")]
    UnknownDriver(String),
    #[error("failed to bind transport: {0}")]
    BindFailed(String),
    #[error("message framing error: {0}")]
    Framing(String),
}
