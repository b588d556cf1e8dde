//! A `Readable` resource backed by an in-process map, standing in for a
//! filesystem-backed resource provider without taking a dependency on one.

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::protocol::{Content, MimeType, ProtocolError, ProtocolResult, Resource, Uri};
use crate::registry::{Readable, Subscribable};

pub struct InMemoryResource {
    uri: Uri,
    name: String,
    description: Option<String>,
    mime_type: MimeType,
    body: RwLock<String>,
    subscribers: DashSet<String>,
}

impl InMemoryResource {
    pub fn new(uri: Uri, name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            uri,
            name: name.into(),
            description: None,
            mime_type: MimeType::new("text/plain").expect("static mime type is valid"),
            body: RwLock::new(body.into()),
            subscribers: DashSet::new(),
        }
    }

    /// Loads the initial body from a file on disk, for a host that wants a
    /// static resource backed by something it already has written down
    /// rather than a literal in code.
    pub fn from_file(uri: Uri, name: impl Into<String>, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let body = std::fs::read_to_string(path)?;
        Ok(Self::new(uri, name, body))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn replace(&self, body: impl Into<String>) {
        *self.body.write().unwrap() = body.into();
    }
}

#[async_trait]
impl Readable for InMemoryResource {
    fn descriptor(&self) -> Resource {
        Resource {
            uri: self.uri.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime_type: Some(self.mime_type.clone()),
        }
    }

    async fn read(&self, uri: &str) -> ProtocolResult<Vec<Content>> {
        if uri != self.uri.as_str() {
            return Err(ProtocolError::not_found(format!("resource '{uri}'")));
        }
        let body = self.body.read().unwrap().clone();
        Ok(vec![Content::Text {
            text: body,
            mime_type: Some(self.mime_type.clone()),
        }])
    }

    fn as_subscribable(&self) -> Option<&dyn Subscribable> {
        Some(self)
    }
}

#[async_trait]
impl Subscribable for InMemoryResource {
    async fn subscribe(&self, client_id: &str, uri: &str) -> ProtocolResult<()> {
        if uri != self.uri.as_str() {
            return Err(ProtocolError::not_found(format!("resource '{uri}'")));
        }
        self.subscribers.insert(client_id.to_string());
        Ok(())
    }
}

/// A name-keyed collection of [`InMemoryResource`]s, for hosts that want to
/// register a whole directory's worth of static content under one component
/// family rather than one registration per file.
#[derive(Default)]
pub struct InMemoryResourceSet {
    resources: DashMap<String, std::sync::Arc<InMemoryResource>>,
}

impl InMemoryResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource: std::sync::Arc<InMemoryResource>) {
        self.resources.insert(resource.uri.as_str().to_string(), resource);
    }

    pub fn get(&self, uri: &str) -> Option<std::sync::Arc<InMemoryResource>> {
        self.resources.get(uri).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_back_stored_body() {
        let resource = InMemoryResource::new(
            Uri::new("memory://notes/todo").unwrap(),
            "todo",
            "buy milk",
        );
        let content = resource.read("memory://notes/todo").await.unwrap();
        assert_eq!(content[0].as_text(), Some("buy milk"));
    }

    #[tokio::test]
    async fn rejects_mismatched_uri() {
        let resource = InMemoryResource::new(Uri::new("memory://notes/todo").unwrap(), "todo", "x");
        let err = resource.read("memory://notes/other").await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotFound { .. }));
    }

    #[tokio::test]
    async fn replace_updates_subsequent_reads() {
        let resource = InMemoryResource::new(Uri::new("memory://notes/todo").unwrap(), "todo", "old");
        resource.replace("new");
        let content = resource.read("memory://notes/todo").await.unwrap();
        assert_eq!(content[0].as_text(), Some("new"));
    }

    #[tokio::test]
    async fn loads_initial_body_from_a_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.txt");
        std::fs::write(&path, "buy milk\n").unwrap();

        let resource = InMemoryResource::from_file(Uri::new("memory://notes/todo").unwrap(), "todo", &path).unwrap();
        let content = resource.read("memory://notes/todo").await.unwrap();
        assert_eq!(content[0].as_text(), Some("buy milk\n"));
    }

    #[tokio::test]
    async fn subscribe_records_the_client_and_rejects_the_wrong_uri() {
        let resource = InMemoryResource::new(Uri::new("memory://notes/todo").unwrap(), "todo", "buy milk");

        resource.subscribe("client-1", "memory://notes/todo").await.unwrap();
        assert!(resource.subscribers.contains("client-1"));

        let err = resource
            .subscribe("client-1", "memory://notes/other")
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::NotFound { .. }));
    }

    #[tokio::test]
    async fn as_subscribable_resolves_to_self() {
        let resource = InMemoryResource::new(Uri::new("memory://notes/todo").unwrap(), "todo", "x");
        let subscribable = Readable::as_subscribable(&resource).expect("resource is subscribable");
        subscribable.subscribe("client-1", "memory://notes/todo").await.unwrap();
        assert!(resource.subscribers.contains("client-1"));
    }
}
