//! MCP dispatch server CLI.
//!
//! Logs go to stderr; in stdio mode stdout carries protocol traffic only.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use mcp_dispatch::config::TransportType;
use mcp_dispatch::utils::logging::init_logging;
use mcp_dispatch::{Config, McpServer};

/// MCP dispatch server CLI
#[derive(Parser)]
#[command(name = "mcp-dispatch")]
#[command(about = "A Model Context Protocol (MCP) JSON-RPC dispatch server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (same as --log-level debug)
    #[arg(short, long)]
    verbose: bool,

    /// Log level, overriding the configuration file
    #[arg(long)]
    log_level: Option<String>,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve over stdin/stdout
    Stdio,

    /// Serve over HTTP
    Http {
        /// HTTP bind address
        #[arg(long)]
        bind: Option<String>,

        /// HTTP port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Generate a default configuration file
    Config {
        /// Output file path
        #[arg(short, long, default_value = "mcp-dispatch.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file to validate
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show server information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let level_override = if cli.verbose {
        Some("debug")
    } else {
        cli.log_level.as_deref()
    };
    init_logging(&config.logging, level_override)?;

    match cli.command {
        Some(Commands::Stdio) => {
            config.transport.transport_type = TransportType::Stdio;
            serve(config).await
        }
        Some(Commands::Http { bind, port }) => {
            config.transport.transport_type = TransportType::Http;
            if let Some(bind) = bind {
                config.transport.http.bind_address = bind;
            }
            if let Some(port) = port {
                config.transport.http.port = port;
            }
            serve(config).await
        }
        Some(Commands::Config { output, force }) => generate_config(output, force),
        Some(Commands::Validate { file }) => validate_config(file),
        Some(Commands::Info) => {
            show_info(&config);
            Ok(())
        }
        None => serve(config).await,
    }
}

/// Run the server on the configured transport
async fn serve(config: Config) -> anyhow::Result<()> {
    let server = McpServer::new(config)?;

    info!("Server configuration:");
    info!("  Name: {}", server.config().server.name);
    info!("  Version: {}", server.config().server.version);
    info!("  Error posture: {:?}", server.config().server.posture);

    server.run().await?;
    Ok(())
}

/// Generate a default configuration file
fn generate_config(output: PathBuf, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        bail!(
            "Configuration file already exists: {} (use --force to overwrite)",
            output.display()
        );
    }

    Config::default().to_file(&output)?;

    info!("Generated configuration file: {}", output.display());
    Ok(())
}

/// Validate a configuration file
fn validate_config(file: PathBuf) -> anyhow::Result<()> {
    info!("Validating configuration file: {}", file.display());

    Config::from_file(&file)
        .and_then(|config| config.validate())
        .with_context(|| format!("Invalid configuration file: {}", file.display()))?;

    info!("Configuration file is valid");
    Ok(())
}

/// Show server information
fn show_info(config: &Config) {
    info!("{} {}", config.server.name, config.server.version);
    info!("Protocol versions: {}", mcp_dispatch::SUPPORTED_PROTOCOL_VERSIONS.join(", "));
    info!("Default transport: {:?}", config.transport.transport_type);
    info!(
        "Features: resources={} tools={} prompts={} logging={}",
        config.features.resources,
        config.features.tools,
        config.features.prompts,
        config.features.logging
    );
    info!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
}
