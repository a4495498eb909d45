//! Server feature implementations.
//!
//! The capability registry: three independent key→descriptor catalogs for
//! resources, tools and prompts, plus the client-facing logging channel.
//! Catalogs hold descriptors and the provider bound to each key; content is
//! only ever produced by the provider at call time.

pub mod logging;
pub mod prompts;
pub mod resources;
pub mod tools;

// Re-export main types
pub use logging::LoggingManager;
pub use prompts::{PromptManager, PromptProvider};
pub use resources::{ResourceManager, ResourceProvider};
pub use tools::{ToolManager, ToolProvider};

use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::FeatureConfig;
use crate::protocol::{
    PromptsCapability, ResourcesCapability, ServerCapabilities, ToolsCapability,
};

/// Capacity of the list-changed event channel
const EVENT_CAPACITY: usize = 16;

/// Which catalog changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListChangedEvent {
    Resources,
    Tools,
    Prompts,
}

impl ListChangedEvent {
    /// Notification method announcing this change to the client
    pub fn method(self) -> &'static str {
        match self {
            ListChangedEvent::Resources => "notifications/resources/list_changed",
            ListChangedEvent::Tools => "notifications/tools/list_changed",
            ListChangedEvent::Prompts => "notifications/prompts/list_changed",
        }
    }

    /// Whether the given capabilities advertise `listChanged` for this catalog
    pub fn is_advertised(self, capabilities: &ServerCapabilities) -> bool {
        let flag = match self {
            ListChangedEvent::Resources => {
                capabilities.resources.as_ref().and_then(|c| c.list_changed)
            }
            ListChangedEvent::Tools => capabilities.tools.as_ref().and_then(|c| c.list_changed),
            ListChangedEvent::Prompts => {
                capabilities.prompts.as_ref().and_then(|c| c.list_changed)
            }
        };
        flag.unwrap_or(false)
    }
}

struct Entry<D, P: ?Sized> {
    descriptor: D,
    provider: Arc<P>,
}

/// Insertion-ordered, last-write-wins map of descriptors to their providers.
///
/// Critical sections never await, so a plain `RwLock` is enough; readers get
/// a snapshot taken at call time.
pub(crate) struct Catalog<D, P: ?Sized> {
    kind: ListChangedEvent,
    entries: RwLock<IndexMap<String, Entry<D, P>>>,
    events: broadcast::Sender<ListChangedEvent>,
}

impl<D: Clone, P: ?Sized> Catalog<D, P> {
    pub(crate) fn new(kind: ListChangedEvent, events: broadcast::Sender<ListChangedEvent>) -> Self {
        Self {
            kind,
            entries: RwLock::new(IndexMap::new()),
            events,
        }
    }

    /// Insert or replace; a replaced key keeps its original position.
    /// Returns true when an existing entry was replaced.
    pub(crate) fn register(&self, key: String, descriptor: D, provider: Arc<P>) -> bool {
        let replaced = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries
                .insert(key, Entry { descriptor, provider })
                .is_some()
        };
        self.notify();
        replaced
    }

    pub(crate) fn remove(&self, key: &str) -> Option<D> {
        let removed = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries.shift_remove(key).map(|entry| entry.descriptor)
        };
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    pub(crate) fn get(&self, key: &str) -> Option<D> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).map(|entry| entry.descriptor.clone())
    }

    pub(crate) fn resolve(&self, key: &str) -> Option<(D, Arc<P>)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .map(|entry| (entry.descriptor.clone(), Arc::clone(&entry.provider)))
    }

    pub(crate) fn list(&self) -> Vec<D> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().map(|entry| entry.descriptor.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn notify(&self) {
        // No subscriber is not an error: events are fire-and-forget.
        if self.events.send(self.kind).is_err() {
            debug!("No listeners for {:?} list change", self.kind);
        }
    }
}

/// Combined registry for all server primitives
pub struct CapabilityRegistry {
    /// Resource catalog
    pub resources: ResourceManager,

    /// Tool catalog
    pub tools: ToolManager,

    /// Prompt catalog
    pub prompts: PromptManager,

    events: broadcast::Sender<ListChangedEvent>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            resources: ResourceManager::new(events.clone()),
            tools: ToolManager::new(events.clone()),
            prompts: PromptManager::new(events.clone()),
            events,
        }
    }

    /// Subscribe to list-changed events. Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<ListChangedEvent> {
        self.events.subscribe()
    }

    /// Descriptor counts as (resources, tools, prompts)
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.resources.len(), self.tools.len(), self.prompts.len())
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the advertised capabilities from the enabled feature set
pub fn build_capabilities(features: &FeatureConfig) -> ServerCapabilities {
    let list_changed = Some(features.list_changed);

    ServerCapabilities {
        experimental: None,
        logging: features.logging.then(|| serde_json::json!({})),
        prompts: features.prompts.then(|| PromptsCapability { list_changed }),
        resources: features.resources.then(|| ResourcesCapability {
            subscribe: Some(features.subscribe),
            list_changed,
        }),
        tools: features.tools.then(|| ToolsCapability { list_changed }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Tool;
    use serde_json::json;

    struct NoProvider;

    struct Silent;

    #[async_trait::async_trait]
    impl ToolProvider for Silent {
        async fn execute(
            &self,
            _name: &str,
            _arguments: serde_json::Map<String, serde_json::Value>,
        ) -> crate::Result<crate::protocol::CallToolResult> {
            Ok(crate::protocol::CallToolResult::text(""))
        }
    }

    fn tool(name: &str, description: &str) -> Tool {
        Tool::new(name, description, json!({"type": "object"}))
    }

    #[test]
    fn test_catalog_last_write_wins_keeps_position() {
        let (tx, _) = broadcast::channel(4);
        let catalog: Catalog<Tool, NoProvider> = Catalog::new(ListChangedEvent::Tools, tx);
        let provider = Arc::new(NoProvider);

        assert!(!catalog.register("a".into(), tool("a", "first"), provider.clone()));
        catalog.register("b".into(), tool("b", "b"), provider.clone());
        assert!(catalog.register("a".into(), tool("a", "second"), provider));

        let listed = catalog.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "a");
        assert_eq!(listed[0].description.as_deref(), Some("second"));
        assert_eq!(listed[1].name, "b");
    }

    #[test]
    fn test_catalog_remove_preserves_order() {
        let (tx, _) = broadcast::channel(4);
        let catalog: Catalog<Tool, NoProvider> = Catalog::new(ListChangedEvent::Tools, tx);
        let provider = Arc::new(NoProvider);
        for name in ["x", "y", "z"] {
            catalog.register(name.into(), tool(name, name), provider.clone());
        }

        assert!(catalog.remove("y").is_some());
        assert!(catalog.remove("y").is_none());
        let names: Vec<String> = catalog.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["x", "z"]);
    }

    #[tokio::test]
    async fn test_registration_emits_event() {
        let registry = CapabilityRegistry::new();
        let mut events = registry.subscribe();

        registry
            .tools
            .register(tool("noop", "does nothing"), Arc::new(Silent));

        assert_eq!(events.recv().await.unwrap(), ListChangedEvent::Tools);
    }

    #[test]
    fn test_registration_without_subscriber() {
        let registry = CapabilityRegistry::new();
        registry
            .tools
            .register(tool("noop", "does nothing"), Arc::new(Silent));
        assert_eq!(registry.counts(), (0, 1, 0));
    }

    #[test]
    fn test_build_capabilities() {
        let mut features = FeatureConfig::default();
        features.resources = false;
        features.list_changed = false;

        let caps = build_capabilities(&features);
        assert!(caps.resources.is_none());
        assert_eq!(caps.tools.unwrap().list_changed, Some(false));
        assert!(caps.prompts.is_some());
        assert!(caps.logging.is_some());
    }

    #[test]
    fn test_event_advertisement() {
        let caps = build_capabilities(&FeatureConfig::default());
        assert!(ListChangedEvent::Tools.is_advertised(&caps));
        assert_eq!(
            ListChangedEvent::Prompts.method(),
            "notifications/prompts/list_changed"
        );
    }
}
