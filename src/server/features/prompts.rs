//! Prompt management for MCP server.
//!
//! Prompts are named, argument-driven message templates. The manager checks
//! required arguments against the descriptor before asking the bound
//! [`PromptProvider`] to render.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{McpError, Result};
use crate::protocol::{GetPromptResult, Prompt};
use crate::server::features::{Catalog, ListChangedEvent};

/// Renders prompts into messages
#[async_trait::async_trait]
pub trait PromptProvider: Send + Sync {
    async fn render(&self, name: &str, arguments: HashMap<String, String>) -> Result<GetPromptResult>;
}

/// Prompt manager for handling MCP prompts
pub struct PromptManager {
    catalog: Catalog<Prompt, dyn PromptProvider>,
}

impl PromptManager {
    pub(crate) fn new(events: broadcast::Sender<ListChangedEvent>) -> Self {
        Self {
            catalog: Catalog::new(ListChangedEvent::Prompts, events),
        }
    }

    /// Register a prompt, replacing any prompt with the same name
    pub fn register(&self, prompt: Prompt, provider: Arc<dyn PromptProvider>) -> Result<()> {
        if prompt.name.is_empty() {
            return Err(McpError::invalid_params("Prompt name cannot be empty"));
        }

        let name = prompt.name.clone();
        if self.catalog.register(name.clone(), prompt, provider) {
            info!("Replaced prompt: {}", name);
        } else {
            info!("Registered prompt: {}", name);
        }
        Ok(())
    }

    /// Unregister a prompt
    pub fn unregister(&self, name: &str) -> Option<Prompt> {
        let removed = self.catalog.remove(name);
        if removed.is_some() {
            info!("Unregistered prompt: {}", name);
        }
        removed
    }

    /// Get a prompt descriptor by name
    pub fn get(&self, name: &str) -> Option<Prompt> {
        self.catalog.get(name)
    }

    /// All prompts in registration order
    pub fn list(&self) -> Vec<Prompt> {
        self.catalog.list()
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render a prompt with arguments applied
    pub async fn render(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResult> {
        let (prompt, provider) = self
            .catalog
            .resolve(name)
            .ok_or_else(|| McpError::not_found("Prompt", name))?;

        let arguments = arguments.unwrap_or_default();
        let missing: Vec<&str> = prompt
            .arguments
            .iter()
            .filter(|arg| arg.required && !arguments.contains_key(&arg.name))
            .map(|arg| arg.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(McpError::invalid_params(format!(
                "Missing required arguments for prompt '{}': {}",
                name,
                missing.join(", ")
            )));
        }

        let result = provider.render(name, arguments).await?;
        debug!("Rendered prompt: {} -> {} messages", name, result.messages.len());
        Ok(result)
    }
}
