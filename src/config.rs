//! Configuration management for the dispatch engine.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `MCP__`-prefixed environment variables (`MCP__SERVER__POSTURE=production`).

use crate::error::{McpError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server identity and lifecycle policy
    #[serde(default)]
    pub server: ServerConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Feature configuration
    #[serde(default)]
    pub features: FeatureConfig,

    /// Built-in provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name reported in `serverInfo`
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Server version reported in `serverInfo`
    #[serde(default = "default_server_version")]
    pub version: String,

    /// Instructions returned from `initialize`
    #[serde(default)]
    pub instructions: Option<String>,

    /// How much of an internal fault is exposed to clients
    #[serde(default)]
    pub posture: ErrorPosture,

    /// Whether a repeated `initialize` re-succeeds (true) or is rejected (false)
    #[serde(default = "default_true")]
    pub allow_reinitialize: bool,

    /// Reject non-lifecycle methods until `initialize` has succeeded
    #[serde(default = "default_true")]
    pub require_initialization: bool,
}

/// Error exposure posture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPosture {
    /// Internal fault messages are attached as `data`
    #[default]
    Development,
    /// Internal faults are reported generically
    Production,
}

/// Transport layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport used when no subcommand selects one
    #[serde(default = "default_transport_type")]
    pub transport_type: TransportType,

    /// HTTP-specific configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// stdio-specific configuration
    #[serde(default)]
    pub stdio: StdioConfig,
}

/// Transport type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Stdio,
    Http,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port number
    #[serde(default = "default_port")]
    pub port: u16,

    /// MCP endpoint path
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// CORS allowed origins (`*` allows any)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

/// stdio transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdioConfig {
    /// Maximum accepted line length in bytes
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

/// Log format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Feature configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Enable resources feature
    #[serde(default = "default_true")]
    pub resources: bool,

    /// Enable tools feature
    #[serde(default = "default_true")]
    pub tools: bool,

    /// Enable prompts feature
    #[serde(default = "default_true")]
    pub prompts: bool,

    /// Enable logging feature
    #[serde(default = "default_true")]
    pub logging: bool,

    /// Advertise `listChanged` on the enabled primitives
    #[serde(default = "default_true")]
    pub list_changed: bool,

    /// Advertise resource `subscribe` (the method itself is not served)
    #[serde(default)]
    pub subscribe: bool,

    /// Reject `tools/call` arguments that violate the tool's `inputSchema`
    /// before the provider runs
    #[serde(default)]
    pub validate_tool_arguments: bool,
}

/// Built-in provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Register the sample tools (echo, calculate, ...)
    #[serde(default = "default_true")]
    pub builtin_tools: bool,

    /// Register the sample resources
    #[serde(default = "default_true")]
    pub builtin_resources: bool,

    /// Register the sample prompts
    #[serde(default = "default_true")]
    pub builtin_prompts: bool,

    /// Sandbox root for the `list_files` tool
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Files exposed as `file://` resources
    #[serde(default)]
    pub files: Vec<FileResourceConfig>,
}

/// A single file exposed as a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResourceConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// Default value functions
fn default_server_name() -> String {
    crate::SERVER_NAME.to_string()
}
fn default_server_version() -> String {
    crate::SERVER_VERSION.to_string()
}
fn default_transport_type() -> TransportType {
    TransportType::Stdio
}
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_endpoint_path() -> String {
    "/mcp".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_max_body_size() -> usize {
    4 * 1024 * 1024
}
fn default_max_line_length() -> usize {
    4 * 1024 * 1024
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            version: default_server_version(),
            instructions: None,
            posture: ErrorPosture::default(),
            allow_reinitialize: default_true(),
            require_initialization: default_true(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transport_type: default_transport_type(),
            http: HttpConfig::default(),
            stdio: StdioConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            endpoint_path: default_endpoint_path(),
            enable_cors: default_true(),
            cors_origins: default_cors_origins(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            max_line_length: default_max_line_length(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            resources: default_true(),
            tools: default_true(),
            prompts: default_true(),
            logging: default_true(),
            list_changed: default_true(),
            subscribe: false,
            validate_tool_arguments: false,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            builtin_tools: default_true(),
            builtin_resources: default_true(),
            builtin_prompts: default_true(),
            root_dir: None,
            files: Vec::new(),
        }
    }
}

impl From<::config::ConfigError> for McpError {
    fn from(err: ::config::ConfigError) -> Self {
        McpError::Config(err.to_string())
    }
}

impl Config {
    /// Load layered configuration: defaults, optional file, then environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(McpError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(
                ::config::File::from(path.to_path_buf()).format(::config::FileFormat::Toml),
            );
        }

        let config: Config = builder
            .add_source(
                ::config::Environment::with_prefix("MCP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single TOML file, without environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| McpError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| McpError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| McpError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| McpError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.name.trim().is_empty() {
            return Err(McpError::Config("server.name must not be empty".to_string()));
        }

        let http = &self.transport.http;
        if http.port == 0 {
            return Err(McpError::Config("transport.http.port must be non-zero".to_string()));
        }
        if !http.endpoint_path.starts_with('/') {
            return Err(McpError::Config(format!(
                "transport.http.endpoint_path must start with '/': {}",
                http.endpoint_path
            )));
        }
        if http.max_body_size == 0 {
            return Err(McpError::Config(
                "transport.http.max_body_size must be non-zero".to_string(),
            ));
        }
        if self.transport.stdio.max_line_length == 0 {
            return Err(McpError::Config(
                "transport.stdio.max_line_length must be non-zero".to_string(),
            ));
        }

        if let Some(root) = &self.providers.root_dir {
            if !root.is_dir() {
                return Err(McpError::Config(format!(
                    "providers.root_dir is not a directory: {}",
                    root.display()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transport.transport_type, TransportType::Stdio);
        assert_eq!(config.transport.http.endpoint_path, "/mcp");
        assert_eq!(config.server.posture, ErrorPosture::Development);
        assert!(config.server.allow_reinitialize);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.toml");

        let mut config = Config::default();
        config.server.name = "file-server".to_string();
        config.server.posture = ErrorPosture::Production;
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.server.name, "file-server");
        assert_eq!(loaded.server.posture, ErrorPosture::Production);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[transport]\ntransport_type = \"http\"\n\n[transport.http]\nport = 9090\n",
        )
        .unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.transport.transport_type, TransportType::Http);
        assert_eq!(loaded.transport.http.port, 9090);
        assert_eq!(loaded.transport.http.endpoint_path, "/mcp");
        assert!(loaded.features.tools);
    }

    #[test]
    fn test_missing_file_rejected() {
        let result = Config::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(McpError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.transport.http.endpoint_path = "mcp".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transport.stdio.max_line_length = 0;
        assert!(config.validate().is_err());
    }
}
