//! Resource management for MCP server.
//!
//! Resources are readable content addressed by URI. The manager keeps the
//! descriptors; reading is delegated to the [`ResourceProvider`] bound to
//! each URI.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{McpError, Result};
use crate::protocol::validation::{validate_mime_type, validate_uri};
use crate::protocol::{Resource, ResourceContents};
use crate::server::features::{Catalog, ListChangedEvent};

/// Supplies resource content on demand
#[async_trait::async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Read the content behind `uri`
    async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>>;
}

/// Resource manager for handling MCP resources
pub struct ResourceManager {
    catalog: Catalog<Resource, dyn ResourceProvider>,
}

impl ResourceManager {
    pub(crate) fn new(events: broadcast::Sender<ListChangedEvent>) -> Self {
        Self {
            catalog: Catalog::new(ListChangedEvent::Resources, events),
        }
    }

    /// Register a resource, replacing any resource with the same URI
    pub fn register(&self, resource: Resource, provider: Arc<dyn ResourceProvider>) -> Result<()> {
        validate_uri(&resource.uri)?;
        if let Some(mime_type) = &resource.mime_type {
            validate_mime_type(mime_type)?;
        }

        let uri = resource.uri.clone();
        if self.catalog.register(uri.clone(), resource, provider) {
            info!("Replaced resource: {}", uri);
        } else {
            info!("Registered resource: {}", uri);
        }
        Ok(())
    }

    /// Unregister a resource
    pub fn unregister(&self, uri: &str) -> Option<Resource> {
        let removed = self.catalog.remove(uri);
        if removed.is_some() {
            info!("Unregistered resource: {}", uri);
        }
        removed
    }

    /// Get a resource by URI
    pub fn get(&self, uri: &str) -> Option<Resource> {
        self.catalog.get(uri)
    }

    /// All resources in registration order
    pub fn list(&self) -> Vec<Resource> {
        self.catalog.list()
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a resource's contents
    pub async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let (_, provider) = self
            .catalog
            .resolve(uri)
            .ok_or_else(|| McpError::not_found("Resource", uri))?;

        let contents = provider.read(uri).await?;
        debug!("Read resource: {} -> {} items", uri, contents.len());
        Ok(contents)
    }
}
