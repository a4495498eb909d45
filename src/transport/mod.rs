//! Transport layer for MCP server.
//!
//! Transports own framing and I/O only. Every decoded message is handed to a
//! [`ProtocolHandler`], and whatever it returns is written back.

pub mod http;
pub mod stdio;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{TransportConfig, TransportType};
use crate::error::Result;
use crate::protocol::ProtocolHandler;

/// Transport trait for different communication methods
#[async_trait]
pub trait Transport: Send + Sync {
    /// Serve messages until the peer disconnects or shutdown is requested
    async fn run(&self, handler: Arc<ProtocolHandler>) -> Result<()>;

    /// Get transport information
    fn info(&self) -> TransportInfo;
}

/// Transport information
#[derive(Debug, Clone)]
pub struct TransportInfo {
    /// Transport type
    pub transport_type: TransportType,

    /// Transport address/endpoint
    pub address: String,

    /// Maximum message size
    pub max_message_size: Option<usize>,
}

/// Transport factory for creating transport instances
pub struct TransportFactory;

impl TransportFactory {
    /// Create the transport selected by configuration
    pub fn create(config: &TransportConfig) -> Arc<dyn Transport> {
        match config.transport_type {
            TransportType::Stdio => Arc::new(stdio::StdioTransport::new(config.stdio.clone())),
            TransportType::Http => Arc::new(http::HttpTransport::new(config.http.clone())),
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
