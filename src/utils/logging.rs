//! Logging utilities for the MCP server.
//!
//! Diagnostics always go to stderr; stdout belongs to the stdio transport.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{McpError, Result};

/// Initialize logging with the specified configuration.
///
/// `RUST_LOG` wins over everything; otherwise `level_override` (from the
/// command line) wins over the configured level.
pub fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_override.unwrap_or(&config.level)))
        .map_err(|e| McpError::Config(format!("Invalid log level: {}", e)))?;

    let subscriber = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| McpError::Config(format!("Failed to initialize logging: {}", e)))
}
