//! Tool management for MCP server.
//!
//! Tools are named operations with a JSON Schema describing their arguments.
//! The schema is declarative: the manager resolves the descriptor and hands
//! the arguments to the bound [`ToolProvider`] as they are, unless argument
//! validation has been switched on with [`ToolManager::set_argument_validation`].

use jsonschema::JSONSchema;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{McpError, Result};
use crate::protocol::{CallToolResult, Tool};
use crate::server::features::{Catalog, ListChangedEvent};

/// Executes tools on behalf of the dispatcher.
///
/// A handled failure (bad input the tool itself understands) is returned as
/// `Ok(CallToolResult::error(..))`. An `Err` is a fault and is reported to the
/// client as an internal error unless it is protocol-shaped.
#[async_trait::async_trait]
pub trait ToolProvider: Send + Sync {
    async fn execute(&self, name: &str, arguments: Map<String, Value>) -> Result<CallToolResult>;
}

/// Tool manager for handling MCP tools
pub struct ToolManager {
    catalog: Catalog<Tool, dyn ToolProvider>,
    validate_arguments: AtomicBool,
}

impl ToolManager {
    pub(crate) fn new(events: broadcast::Sender<ListChangedEvent>) -> Self {
        Self {
            catalog: Catalog::new(ListChangedEvent::Tools, events),
            validate_arguments: AtomicBool::new(false),
        }
    }

    /// Check `tools/call` arguments against each tool's `inputSchema` before
    /// the provider runs. Off by default.
    pub fn set_argument_validation(&self, enabled: bool) {
        self.validate_arguments.store(enabled, Ordering::Relaxed);
    }

    pub fn argument_validation(&self) -> bool {
        self.validate_arguments.load(Ordering::Relaxed)
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&self, tool: Tool, provider: Arc<dyn ToolProvider>) {
        let name = tool.name.clone();
        if self.catalog.register(name.clone(), tool, provider) {
            info!("Replaced tool: {}", name);
        } else {
            info!("Registered tool: {}", name);
        }
    }

    /// Unregister a tool
    pub fn unregister(&self, name: &str) -> Option<Tool> {
        let removed = self.catalog.remove(name);
        if removed.is_some() {
            info!("Unregistered tool: {}", name);
        }
        removed
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Tool> {
        self.catalog.get(name)
    }

    /// All tools in registration order
    pub fn list(&self) -> Vec<Tool> {
        self.catalog.list()
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execute a tool
    pub async fn call(&self, name: &str, arguments: Option<Map<String, Value>>) -> Result<CallToolResult> {
        let (tool, provider) = self
            .catalog
            .resolve(name)
            .ok_or_else(|| McpError::not_found("Tool", name))?;

        let arguments = arguments.unwrap_or_default();
        if self.argument_validation() {
            validate_arguments(&tool, &arguments)?;
        }

        debug!("Executing tool: {}", name);
        let result = provider.execute(name, arguments).await?;

        info!(
            "Executed tool: {} -> {} content items{}",
            name,
            result.content.len(),
            if result.is_error() { " (isError)" } else { "" }
        );
        Ok(result)
    }
}

/// Check arguments against the tool's input schema. A schema that is not
/// valid JSON Schema is left to the provider.
fn validate_arguments(tool: &Tool, arguments: &Map<String, Value>) -> Result<()> {
    let schema = match JSONSchema::compile(&tool.input_schema) {
        Ok(schema) => schema,
        Err(e) => {
            warn!("Skipping argument validation for tool '{}': {}", tool.name, e);
            return Ok(());
        }
    };

    let instance = Value::Object(arguments.clone());
    let outcome = schema.validate(&instance).map_err(|errors| {
        errors
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    });

    outcome.map_err(|detail| {
        McpError::invalid_params(format!(
            "Invalid arguments for tool '{}': {}",
            tool.name, detail
        ))
    })
}
