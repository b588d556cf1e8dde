//! Named transport driver registry, with cached instances, a default
//! selection, and liveness aggregation across everything started.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::instrument;

use super::{MessageHandler, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Stopped,
    Unreachable,
}

pub struct TransportManager {
    drivers: RwLock<HashMap<String, Arc<dyn Transport>>>,
    default_driver: RwLock<Option<String>>,
}

impl TransportManager {
    pub fn new() -> Self {
        Self {
            drivers: RwLock::new(HashMap::new()),
            default_driver: RwLock::new(None),
        }
    }

    /// Register a transport under `name`. The transport contract is already
    /// enforced by the `Transport` bound, so there is nothing left to reject
    /// at runtime beyond a duplicate name.
    pub async fn register(&self, name: impl Into<String>, transport: Arc<dyn Transport>) {
        let name = name.into();
        let mut default = self.default_driver.write().await;
        if default.is_none() {
            *default = Some(name.clone());
        }
        self.drivers.write().await.insert(name, transport);
    }

    pub async fn set_default(&self, name: impl Into<String>) -> Result<(), TransportError> {
        let name = name.into();
        if !self.drivers.read().await.contains_key(&name) {
            return Err(TransportError::UnknownDriver(name));
        }
        *self.default_driver.write().await = Some(name);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.drivers.read().await.get(name).cloned()
    }

    pub async fn default_transport(&self) -> Option<Arc<dyn Transport>> {
        let name = self.default_driver.read().await.clone()?;
        self.get(&name).await
    }

    #[instrument(level = "info", skip(self, handler))]
    pub async fn start_all(&self, handler: Arc<dyn MessageHandler>) -> Result<(), TransportError> {
        for (name, transport) in self.drivers.read().await.iter() {
            transport.initialize().await?;
            transport.start(handler.clone()).await.map_err(|err| {
                TransportError::BindFailed(format!("{name}: {err}"))
            })?;
        }
        Ok(())
    }

    pub async fn stop_all(&self) -> Result<(), TransportError> {
        for transport in self.drivers.read().await.values() {
            transport.stop().await?;
        }
        Ok(())
    }

    /// Per-transport health plus a rolled-up view: `Healthy` only if every
    /// registered transport is connected.
    pub async fn health(&self) -> (HashMap<String, HealthStatus>, HealthStatus) {
        let drivers = self.drivers.read().await;
        let mut statuses = HashMap::with_capacity(drivers.len());
        let mut overall = HealthStatus::Healthy;
        for (name, transport) in drivers.iter() {
            let status = if transport.is_connected() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Stopped
            };
            if status != HealthStatus::Healthy {
                overall = HealthStatus::Unreachable;
            }
            statuses.insert(name.clone(), status);
        }
        (statuses, overall)
    }
}

impl Default for TransportManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stdio::StdioTransport;

    #[tokio::test]
    async fn first_registered_becomes_default() {
        let manager = TransportManager::new();
        manager
            .register("stdio", Arc::new(StdioTransport::new()))
            .await;
        assert!(manager.default_transport().await.is_some());
    }

    #[tokio::test]
    async fn set_default_rejects_unknown_driver() {
        let manager = TransportManager::new();
        let err = manager.set_default("missing").await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownDriver(_)));
    }
}
