//! Built-in tools.
//!
//! Each tool is a [`ToolHandler`]; [`BuiltinToolProvider`] owns the set and
//! answers `tools/call` for all of them.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use indexmap::IndexMap;
use rand::Rng;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{McpError, Result};
use crate::protocol::{CallToolResult, Tool};
use crate::providers::calculator;
use crate::server::features::{ToolManager, ToolProvider};
use crate::utils::truncate_for_log;

/// A single tool implementation
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments
    fn input_schema(&self) -> Value;

    /// Get the tool definition
    fn tool_definition(&self) -> Tool {
        Tool::new(self.name(), self.description(), self.input_schema())
    }

    /// Execute the tool. Arguments arrive unchecked against the schema.
    async fn execute(&self, arguments: &Map<String, Value>) -> Result<CallToolResult>;
}

/// Provider backing every built-in tool
pub struct BuiltinToolProvider {
    handlers: IndexMap<String, Arc<dyn ToolHandler>>,
}

impl BuiltinToolProvider {
    /// The standard tool set. `list_files` is sandboxed to `root_dir` and
    /// reports an error result when no root is configured.
    pub fn new(root_dir: Option<PathBuf>) -> Self {
        let handlers: Vec<Arc<dyn ToolHandler>> = vec![
            Arc::new(EchoTool),
            Arc::new(CalculateTool),
            Arc::new(UuidTool),
            Arc::new(TimestampTool),
            Arc::new(Base64Tool),
            Arc::new(WeatherTool),
            Arc::new(ListFilesTool { root: root_dir }),
        ];

        Self {
            handlers: handlers
                .into_iter()
                .map(|handler| (handler.name().to_string(), handler))
                .collect(),
        }
    }

    /// Definitions for every tool, in registration order
    pub fn definitions(&self) -> Vec<Tool> {
        self.handlers.values().map(|h| h.tool_definition()).collect()
    }

    /// Register every tool with `tools`, bound to this provider
    pub fn register_all(self: Arc<Self>, tools: &ToolManager) {
        for tool in self.definitions() {
            tools.register(tool, self.clone());
        }
    }
}

#[async_trait::async_trait]
impl ToolProvider for BuiltinToolProvider {
    async fn execute(&self, name: &str, arguments: Map<String, Value>) -> Result<CallToolResult> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| McpError::not_found("Tool", name))?;
        handler.execute(&arguments).await
    }
}

fn string_arg<'a>(arguments: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::invalid_params(format!("Missing or invalid '{}' argument", key)))
}

/// Echo tool: returns its input unchanged
pub struct EchoTool;

#[async_trait::async_trait]
impl ToolHandler for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo back the input text"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "Text to echo back"}
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<CallToolResult> {
        let text = string_arg(arguments, "text")?;
        Ok(CallToolResult::text(text))
    }
}

/// Calculator tool for arithmetic expressions
pub struct CalculateTool;

#[async_trait::async_trait]
impl ToolHandler for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression (+ - * / % ^ and parentheses)"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Expression to evaluate, e.g. \"(2 + 3) * 4\""
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<CallToolResult> {
        let expression = string_arg(arguments, "expression")?;
        match calculator::evaluate(expression) {
            Ok(value) => Ok(CallToolResult::text(calculator::format_number(value))),
            Err(e) => {
                debug!("Rejected expression {:?}: {}", truncate_for_log(expression, 80), e);
                Ok(CallToolResult::error(format!("Calculation error: {}", e)))
            }
        }
    }
}

/// UUID v4 generator
pub struct UuidTool;

const MAX_UUIDS: u64 = 100;

#[async_trait::async_trait]
impl ToolHandler for UuidTool {
    fn name(&self) -> &str {
        "uuid"
    }

    fn description(&self) -> &str {
        "Generate random UUIDs"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "count": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_UUIDS,
                    "description": "How many UUIDs to generate (default 1)"
                }
            }
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<CallToolResult> {
        let count = arguments.get("count").and_then(Value::as_u64).unwrap_or(1);
        let ids: Vec<String> = (0..count.min(MAX_UUIDS))
            .map(|_| uuid::Uuid::new_v4().to_string())
            .collect();
        Ok(CallToolResult::text(ids.join("\n")))
    }
}

/// Current time in a chosen format
pub struct TimestampTool;

#[async_trait::async_trait]
impl ToolHandler for TimestampTool {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn description(&self) -> &str {
        "Get the current UTC time"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "enum": ["iso", "unix", "rfc2822"],
                    "description": "Output format (default iso)"
                }
            }
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<CallToolResult> {
        let now = Utc::now();
        let text = match arguments.get("format").and_then(Value::as_str).unwrap_or("iso") {
            "unix" => now.timestamp().to_string(),
            "rfc2822" => now.to_rfc2822(),
            _ => now.to_rfc3339(),
        };
        Ok(CallToolResult::text(text))
    }
}

/// Base64 encoder/decoder
pub struct Base64Tool;

#[async_trait::async_trait]
impl ToolHandler for Base64Tool {
    fn name(&self) -> &str {
        "base64"
    }

    fn description(&self) -> &str {
        "Encode text to base64 or decode base64 to text"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["encode", "decode"]},
                "text": {"type": "string"}
            },
            "required": ["operation", "text"]
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<CallToolResult> {
        let text = string_arg(arguments, "text")?;
        match string_arg(arguments, "operation")? {
            "encode" => Ok(CallToolResult::text(STANDARD.encode(text))),
            "decode" => {
                let decoded = STANDARD
                    .decode(text.trim())
                    .map_err(|e| e.to_string())
                    .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()));
                Ok(match decoded {
                    Ok(text) => CallToolResult::text(text),
                    Err(e) => CallToolResult::error(format!("Decode error: {}", e)),
                })
            }
            other => Ok(CallToolResult::error(format!(
                "Unknown operation '{}', expected encode or decode",
                other
            ))),
        }
    }
}

/// Simulated weather report
pub struct WeatherTool;

const CONDITIONS: [&str; 5] = ["Sunny", "Partly cloudy", "Cloudy", "Rainy", "Windy"];

#[async_trait::async_trait]
impl ToolHandler for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get a simulated weather report for a location"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {"type": "string", "minLength": 1},
                "units": {"type": "string", "enum": ["metric", "imperial"]}
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<CallToolResult> {
        let location = string_arg(arguments, "location")?;
        let imperial = arguments.get("units").and_then(Value::as_str) == Some("imperial");
        Ok(CallToolResult::text(weather_report(location, imperial)))
    }
}

// ThreadRng is not Send, so sampling stays out of the async body.
fn weather_report(location: &str, imperial: bool) -> String {
    let mut rng = rand::thread_rng();
    let celsius: f64 = rng.gen_range(-10.0..35.0);
    let humidity: u32 = rng.gen_range(20..95);
    let condition = CONDITIONS[rng.gen_range(0..CONDITIONS.len())];

    let temperature = if imperial {
        format!("{:.1}°F", celsius * 9.0 / 5.0 + 32.0)
    } else {
        format!("{:.1}°C", celsius)
    };

    format!(
        "Weather for {}: {}, {}, humidity {}% (simulated)",
        location, condition, temperature, humidity
    )
}

/// Directory listing confined to a root directory
pub struct ListFilesTool {
    root: Option<PathBuf>,
}

#[async_trait::async_trait]
impl ToolHandler for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the entries of a directory under the configured root"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory relative to the root (default: the root)"
                }
            }
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<CallToolResult> {
        let Some(root) = &self.root else {
            return Ok(CallToolResult::error("No root directory is configured"));
        };
        let relative = arguments.get("path").and_then(Value::as_str).unwrap_or(".");

        let dir = match resolve_in_root(root, relative).await {
            Ok(dir) => dir,
            Err(message) => {
                warn!("list_files rejected {:?}: {}", relative, message);
                return Ok(CallToolResult::error(message));
            }
        };

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) => return Ok(CallToolResult::error(format!("Cannot read directory: {}", e))),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            Ok(CallToolResult::text("(empty directory)"))
        } else {
            Ok(CallToolResult::text(entries.join("\n")))
        }
    }
}

/// Resolve `relative` under `root`, refusing anything that escapes it
async fn resolve_in_root(root: &Path, relative: &str) -> std::result::Result<PathBuf, String> {
    let root = tokio::fs::canonicalize(root)
        .await
        .map_err(|e| format!("Root directory unavailable: {}", e))?;
    let target = tokio::fs::canonicalize(root.join(relative.trim_start_matches('/')))
        .await
        .map_err(|_| format!("Path not found: {}", relative))?;

    if !target.starts_with(&root) {
        return Err(format!("Path is outside the root directory: {}", relative));
    }
    if !target.is_dir() {
        return Err(format!("Not a directory: {}", relative));
    }
    Ok(target)
}
