//! # MCP Dispatch
//!
//! A JSON-RPC 2.0 method-dispatch engine for the Model Context Protocol (MCP).
//!
//! The engine parses and validates JSON-RPC envelopes, runs the MCP
//! initialization lifecycle, and routes requests to resources, tools and
//! prompts held in an in-memory capability registry. Content, execution and
//! rendering live behind provider traits, so the built-in samples can be
//! replaced without touching the dispatcher.
//!
//! ## Features
//!
//! - **Strict codec**: ParseError / InvalidRequest classification at the edge
//! - **Lifecycle gate**: methods are refused until `initialize` succeeds
//! - **Pluggable router**: built-in routes plus last-write-wins extensions
//! - **Transports**: line-delimited stdio and HTTP with batching
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mcp_dispatch::{Config, McpServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = McpServer::new(Config::default())?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod providers;
pub mod server;
pub mod transport;
pub mod utils;

// Re-export main types for convenience
pub use crate::config::Config;
pub use error::{ErrorCode, JsonRpcError, McpError, Result};
pub use protocol::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ProtocolHandler,
};
pub use server::{McpServer, McpServerBuilder};

/// Preferred MCP protocol version
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Protocol versions accepted during `initialize`, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

/// JSON-RPC version used by MCP
pub const JSONRPC_VERSION: &str = "2.0";

/// Default server information
pub const SERVER_NAME: &str = "mcp-dispatch";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
