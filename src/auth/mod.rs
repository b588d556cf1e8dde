//! Pluggable authentication: a single middleware hook the host can swap or
//! stack, shipped with one concrete example (api-key) — no OAuth2/JWT
//! scheme is built in.

pub mod apikey;

pub use apikey::ApiKeyAuth;

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::ProtocolError;

#[derive(Debug, Error, Clone)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,
    #[error("invalid credentials")]
    Invalid,
}

impl From<AuthError> for ProtocolError {
    fn from(err: AuthError) -> Self {
        ProtocolError::unauthorized(err.to_string())
    }
}

/// Credentials as lifted from a transport-specific request, header and
/// query forms both supported since the HTTP transport accepts either.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub header_value: Option<String>,
    pub query_value: Option<String>,
}

#[async_trait]
pub trait AuthMiddleware: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), AuthError>;
}

/// The no-op middleware used when `auth.enabled` is false.
pub struct NoAuth;

#[async_trait]
impl AuthMiddleware for NoAuth {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<(), AuthError> {
        Ok(())
    }
}
