//! Error handling for the dispatch engine.
//!
//! Every fault that can reach a client is classified here into one of the
//! JSON-RPC 2.0 error codes. Protocol-shaped faults keep their code and
//! message; everything else collapses into `-32603 Internal error`, with the
//! diagnostic text exposed only in the development posture.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ErrorPosture;

/// Result type alias for MCP operations
pub type Result<T> = std::result::Result<T, McpError>;

/// The fixed JSON-RPC error code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Reserved range for server-defined errors.
    ServerError,
    /// Reserved range for application-defined errors.
    ApplicationError,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::ServerError => -32000,
            ErrorCode::ApplicationError => -32500,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(ErrorCode::ParseError),
            -32600 => Some(ErrorCode::InvalidRequest),
            -32601 => Some(ErrorCode::MethodNotFound),
            -32602 => Some(ErrorCode::InvalidParams),
            -32603 => Some(ErrorCode::InternalError),
            -32000 => Some(ErrorCode::ServerError),
            -32500 => Some(ErrorCode::ApplicationError),
            _ => None,
        }
    }

    /// Canonical short message for the code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::ServerError => "Server error",
            ErrorCode::ApplicationError => "Application error",
        }
    }
}

/// JSON-RPC error object as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Main error type for dispatch operations
#[derive(Error, Debug)]
pub enum McpError {
    /// JSON-RPC parse error (-32700)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON-RPC invalid request (-32600)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON-RPC method not found (-32601)
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// JSON-RPC invalid params (-32602)
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// JSON-RPC internal error (-32603)
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Server-defined error (-32000)
    #[error("{0}")]
    ServerError(String),

    /// Application-defined error (-32500)
    #[error("Application error: {0}")]
    Application(String),

    /// A fully-formed rejection that is forwarded to the client unchanged
    #[error("{0}")]
    Rpc(JsonRpcError),

    /// Transport-related errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider faults that are not protocol-level rejections
    #[error("Provider error: {0}")]
    Provider(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl McpError {
    /// The protocol code this fault carries, if it is protocol-shaped.
    pub fn protocol_code(&self) -> Option<ErrorCode> {
        match self {
            McpError::ParseError(_) => Some(ErrorCode::ParseError),
            McpError::InvalidRequest(_) => Some(ErrorCode::InvalidRequest),
            McpError::MethodNotFound(_) => Some(ErrorCode::MethodNotFound),
            McpError::InvalidParams(_) => Some(ErrorCode::InvalidParams),
            McpError::InternalError(_) => Some(ErrorCode::InternalError),
            McpError::ServerError(_) => Some(ErrorCode::ServerError),
            McpError::Application(_) => Some(ErrorCode::ApplicationError),
            McpError::Rpc(err) => ErrorCode::from_code(err.code),
            _ => None,
        }
    }

    /// Whether the fault is an explicit protocol rejection that is forwarded as-is.
    pub fn is_protocol_fault(&self) -> bool {
        match self {
            McpError::Rpc(_) => true,
            McpError::InternalError(_) => false,
            other => other.protocol_code().is_some(),
        }
    }

    /// Convert to JSON-RPC error code
    pub fn to_json_rpc_code(&self) -> i32 {
        match self {
            McpError::Rpc(err) => err.code,
            other => other
                .protocol_code()
                .unwrap_or(ErrorCode::InternalError)
                .code(),
        }
    }

    /// Convert to the wire error object.
    ///
    /// Internal faults are normalized to `-32603 Internal error`; the
    /// original message is carried in `data` only in the development posture.
    pub fn to_json_rpc_error(&self, posture: ErrorPosture) -> JsonRpcError {
        if let McpError::Rpc(err) = self {
            return err.clone();
        }

        if self.is_protocol_fault() {
            return JsonRpcError {
                code: self.to_json_rpc_code(),
                message: self.to_string(),
                data: None,
            };
        }

        let error = JsonRpcError::new(
            ErrorCode::InternalError,
            ErrorCode::InternalError.message(),
        );
        match posture {
            ErrorPosture::Development => error.with_data(Value::String(self.detail())),
            ErrorPosture::Production => error,
        }
    }

    fn detail(&self) -> String {
        match self {
            McpError::InternalError(msg) | McpError::Provider(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Create a parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        McpError::ParseError(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        McpError::InvalidRequest(msg.into())
    }

    /// Create a method not found error for `method`
    pub fn method_not_found(method: impl Into<String>) -> Self {
        McpError::MethodNotFound(method.into())
    }

    /// Create an invalid params error
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        McpError::InvalidParams(msg.into())
    }

    /// Create an internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        McpError::InternalError(msg.into())
    }

    /// Create a provider fault
    pub fn provider(msg: impl Into<String>) -> Self {
        McpError::Provider(msg.into())
    }

    /// Create a "not found" rejection for a registry lookup miss
    pub fn not_found(kind: &str, key: &str) -> Self {
        McpError::InvalidParams(format!("{} not found: {}", kind, key))
    }
}

impl From<JsonRpcError> for McpError {
    fn from(err: JsonRpcError) -> Self {
        McpError::Rpc(err)
    }
}
