//! MCP Server implementation.
//!
//! [`McpServer`] owns the configuration and the capability registry shared
//! by every session, and wires a [`ProtocolHandler`] to the configured
//! transport.

pub mod features;
pub mod session;

use std::sync::Arc;
use tracing::info;

use crate::config::{Config, ErrorPosture, TransportType};
use crate::error::Result;
use crate::protocol::ProtocolHandler;
use crate::providers::register_builtins;
use crate::server::features::CapabilityRegistry;
use crate::transport::{Transport, TransportFactory, TransportInfo};

/// Main MCP server implementation
pub struct McpServer {
    /// Server configuration
    config: Config,

    /// Primitives visible to every session
    registry: Arc<CapabilityRegistry>,
}

impl McpServer {
    /// Create a new MCP server with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(CapabilityRegistry::new());
        registry
            .tools
            .set_argument_validation(config.features.validate_tool_arguments);
        register_builtins(&registry, &config)?;

        Ok(Self { config, registry })
    }

    /// Get server configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared registry, for adding application primitives
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// A fresh session bound to the shared registry
    pub fn handler(&self) -> Arc<ProtocolHandler> {
        Arc::new(ProtocolHandler::new(self.registry.clone(), &self.config))
    }

    /// Get transport information for the configured transport
    pub fn transport_info(&self) -> TransportInfo {
        TransportFactory::create(&self.config.transport).info()
    }

    /// Serve on the configured transport until it stops
    pub async fn run(&self) -> Result<()> {
        let transport = TransportFactory::create(&self.config.transport);
        self.serve(transport).await
    }

    /// Serve over stdio regardless of the configured transport
    pub async fn run_stdio(&self) -> Result<()> {
        let mut transport = self.config.transport.clone();
        transport.transport_type = TransportType::Stdio;
        self.serve(TransportFactory::create(&transport)).await
    }

    /// Serve over HTTP regardless of the configured transport
    pub async fn run_http(&self) -> Result<()> {
        let mut transport = self.config.transport.clone();
        transport.transport_type = TransportType::Http;
        self.serve(TransportFactory::create(&transport)).await
    }

    /// Serve on a caller-supplied transport
    pub async fn serve(&self, transport: Arc<dyn Transport>) -> Result<()> {
        let info = transport.info();
        let (resources, tools, prompts) = self.registry.counts();
        info!(
            "Starting {} v{} on {:?} ({}): {} tools, {} resources, {} prompts",
            self.config.server.name,
            self.config.server.version,
            info.transport_type,
            info.address,
            tools,
            resources,
            prompts
        );

        transport.run(self.handler()).await?;

        info!("MCP server stopped");
        Ok(())
    }
}

/// Server builder for easier configuration
pub struct McpServerBuilder {
    config: Config,
}

impl McpServerBuilder {
    /// Create a new server builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the server configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the server name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.server.name = name.into();
        self
    }

    /// Set the server version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.server.version = version.into();
        self
    }

    /// Set server instructions
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.server.instructions = Some(instructions.into());
        self
    }

    /// Set how internal faults are reported to clients
    pub fn posture(mut self, posture: ErrorPosture) -> Self {
        self.config.server.posture = posture;
        self
    }

    /// Build the server
    pub fn build(self) -> Result<McpServer> {
        McpServer::new(self.config)
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
