//! The component registry: three independent name-keyed maps (tools,
//! resources, prompts) with single-writer/many-reader discipline so `list`
//! snapshots are never visible mid-mutation.

pub mod component;

pub use component::{Callable, Component, ComponentKind, Listable, Readable, Renderable, Subscribable};

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::events::{Event, EventBus};

/// Metadata recorded alongside a component at registration time, independent
/// of the component's own descriptor (which is owned by its capability
/// trait impl).
#[derive(Debug, Clone, Default)]
pub struct ComponentMetadata {
    pub middleware: Vec<String>,
    pub auth_required: bool,
    pub extra: Option<Value>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{kind:?} '{name}' is already registered")]
    AlreadyRegistered { kind: ComponentKind, name: String },
    #[error("{kind:?} '{name}' is not registered")]
    NotRegistered { kind: ComponentKind, name: String },
}

struct Entry {
    component: Component,
    metadata: ComponentMetadata,
}

/// Name -> component map for one [`ComponentKind`], plus the metadata that
/// rides along with each registration.
struct KindTable {
    entries: DashMap<String, Entry>,
}

impl KindTable {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

/// Holds the three kind-scoped tables and an optional event bus; entry point
/// for everything the protocol handler needs to resolve a method call to a
/// component.
pub struct Registry {
    tools: KindTable,
    resources: KindTable,
    prompts: KindTable,
    events: Option<Arc<EventBus>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            tools: KindTable::new(),
            resources: KindTable::new(),
            prompts: KindTable::new(),
            events: None,
        }
    }

    pub fn with_events(events: Arc<EventBus>) -> Self {
        Self {
            events: Some(events),
            ..Self::new()
        }
    }

    fn table(&self, kind: ComponentKind) -> &KindTable {
        match kind {
            ComponentKind::Tool => &self.tools,
            ComponentKind::Resource => &self.resources,
            ComponentKind::Prompt => &self.prompts,
        }
    }

    /// Register a component under `name`. Fails if `(kind, name)` is already
    /// taken unless `force` is set, in which case the prior entry is
    /// silently replaced (still firing the registered event, never the
    /// unregistered one for the replaced entry — replacement is not removal).
    #[instrument(level = "debug", skip(self, name, component, metadata))]
    pub async fn register(
        &self,
        kind: ComponentKind,
        name: impl Into<String>,
        component: Component,
        metadata: ComponentMetadata,
        force: bool,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let table = self.table(kind);

        if !force && table.entries.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered { kind, name });
        }

        table.entries.insert(
            name.clone(),
            Entry {
                component,
                metadata,
            },
        );

        if let Some(events) = &self.events {
            events.emit(Event::ComponentRegistered { kind, name }).await;
        }

        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn unregister(&self, kind: ComponentKind, name: &str) -> Result<(), RegistryError> {
        let table = self.table(kind);
        if table.entries.remove(name).is_none() {
            return Err(RegistryError::NotRegistered {
                kind,
                name: name.to_string(),
            });
        }

        if let Some(events) = &self.events {
            events
                .emit(Event::ComponentUnregistered {
                    kind,
                    name: name.to_string(),
                })
                .await;
        }

        Ok(())
    }

    pub fn has(&self, kind: ComponentKind, name: &str) -> bool {
        self.table(kind).entries.contains_key(name)
    }

    pub fn get(&self, kind: ComponentKind, name: &str) -> Option<Component> {
        self.table(kind)
            .entries
            .get(name)
            .map(|entry| entry.component.clone())
    }

    pub fn get_metadata(&self, kind: ComponentKind, name: &str) -> Option<ComponentMetadata> {
        self.table(kind)
            .entries
            .get(name)
            .map(|entry| entry.metadata.clone())
    }

    /// A name-ascending snapshot of every registered component of `kind`.
    /// DashMap's iterator already reflects a point-in-time view per shard;
    /// sorting afterward gives us the total order the protocol handler's
    /// list methods require.
    pub fn list(&self, kind: ComponentKind) -> Vec<Component> {
        let table = self.table(kind);
        let mut components: Vec<(String, Component)> = table
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().component.clone()))
            .collect();
        components.sort_by(|a, b| a.0.cmp(&b.0));
        components.into_iter().map(|(_, c)| c).collect()
    }

    /// Host-driven bulk registration, standing in for discovering components
    /// from paths on disk — this runtime does not walk a filesystem for
    /// component definitions, so discovery is just registering a batch the
    /// host already constructed in code. Returns the number of components
    /// actually registered (skips and warns on duplicates rather than
    /// aborting the batch).
    #[instrument(level = "debug", skip(self, components))]
    pub async fn discover(
        &self,
        components: Vec<(ComponentKind, String, Component, ComponentMetadata)>,
    ) -> usize {
        let mut registered = 0;
        for (kind, name, component, metadata) in components {
            match self
                .register(kind, name.clone(), component, metadata, false)
                .await
            {
                Ok(()) => registered += 1,
                Err(err) => warn!(%name, %err, "skipping duplicate component during discovery"),
            }
        }
        registered
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::protocol::{Content, ProtocolResult, Tool};
    use proptest::prelude::*;

    struct Echo(String);

    #[async_trait]
    impl Callable for Echo {
        fn descriptor(&self) -> Tool {
            Tool {
                name: self.0.clone(),
                description: None,
                input_schema: serde_json::json!({}),
            }
        }

        async fn call(&self, arguments: Value) -> ProtocolResult<Vec<Content>> {
            Ok(vec![Content::text(arguments.to_string())])
        }
    }

    #[tokio::test]
    async fn register_then_has_and_get() {
        let registry = Registry::new();
        registry
            .register(
                ComponentKind::Tool,
                "echo",
                Component::Tool(Arc::new(Echo("echo".to_string()))),
                ComponentMetadata::default(),
                false,
            )
            .await
            .unwrap();

        assert!(registry.has(ComponentKind::Tool, "echo"));
        assert!(registry.get(ComponentKind::Tool, "echo").is_some());
    }

    #[tokio::test]
    async fn duplicate_register_without_force_fails() {
        let registry = Registry::new();
        registry
            .register(
                ComponentKind::Tool,
                "echo",
                Component::Tool(Arc::new(Echo("echo".to_string()))),
                ComponentMetadata::default(),
                false,
            )
            .await
            .unwrap();

        let err = registry
            .register(
                ComponentKind::Tool,
                "echo",
                Component::Tool(Arc::new(Echo("echo".to_string()))),
                ComponentMetadata::default(),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
    }

    #[tokio::test]
    async fn unregister_then_has_is_false() {
        let registry = Registry::new();
        registry
            .register(
                ComponentKind::Tool,
                "echo",
                Component::Tool(Arc::new(Echo("echo".to_string()))),
                ComponentMetadata::default(),
                false,
            )
            .await
            .unwrap();

        registry.unregister(ComponentKind::Tool, "echo").await.unwrap();
        assert!(!registry.has(ComponentKind::Tool, "echo"));
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let registry = Registry::new();
        for name in ["zebra", "alpha", "mango"] {
            registry
                .register(
                    ComponentKind::Tool,
                    name,
                    Component::Tool(Arc::new(Echo(name.to_string()))),
                    ComponentMetadata::default(),
                    false,
                )
                .await
                .unwrap();
        }

        let names: Vec<String> = registry
            .list(ComponentKind::Tool)
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(names, vec!["alpha", "mango", "zebra"]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(String),
        Unregister(String),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let name = "[a-z]{1,8}";
        prop_oneof![
            name.prop_map(Op::Register),
            name.prop_map(Op::Unregister),
        ]
    }

    proptest! {
        /// Whatever sequence of registrations and unregistrations ran
        /// against it, `list` always comes back sorted and only ever
        /// contains names that are actually currently registered.
        #[test]
        fn list_stays_sorted_and_consistent_under_arbitrary_mutation(
            ops in proptest::collection::vec(op_strategy(), 0..40),
        ) {
            let registry = Registry::new();
            let mut expected = std::collections::BTreeSet::new();

            tokio_test::block_on(async {
                for op in &ops {
                    match op {
                        Op::Register(name) => {
                            if registry
                                .register(
                                    ComponentKind::Tool,
                                    name.clone(),
                                    Component::Tool(Arc::new(Echo(name.clone()))),
                                    ComponentMetadata::default(),
                                    false,
                                )
                                .await
                                .is_ok()
                            {
                                expected.insert(name.clone());
                            }
                        }
                        Op::Unregister(name) => {
                            if registry.unregister(ComponentKind::Tool, name).await.is_ok() {
                                expected.remove(name);
                            }
                        }
                    }
                }
            });

            let names: Vec<String> = registry.list(ComponentKind::Tool).iter().map(|c| c.name()).collect();
            let mut sorted = names.clone();
            sorted.sort();
            prop_assert_eq!(&names, &sorted);
            prop_assert_eq!(names.into_iter().collect::<std::collections::BTreeSet<_>>(), expected);
        }
    }
}
