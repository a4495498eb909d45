//! Message validation for MCP protocol compliance.
//!
//! Envelope checks operate on raw JSON values so that shape errors are
//! caught before anything is deserialized into typed messages.

use crate::error::{McpError, Result};
use crate::JSONRPC_VERSION;
use serde_json::{Map, Value};

/// Validate the `jsonrpc` tag: must be literally the string "2.0"
pub fn validate_jsonrpc_tag(envelope: &Map<String, Value>) -> Result<()> {
    match envelope.get("jsonrpc") {
        Some(Value::String(tag)) if tag == JSONRPC_VERSION => Ok(()),
        Some(other) => Err(McpError::invalid_request(format!(
            "Invalid JSON-RPC version: expected '{}', got {}",
            JSONRPC_VERSION, other
        ))),
        None => Err(McpError::invalid_request("Missing 'jsonrpc' field")),
    }
}

/// Validate a request id: string, number or null
pub fn validate_id(id: &Value) -> Result<()> {
    match id {
        Value::String(_) | Value::Number(_) | Value::Null => Ok(()),
        other => Err(McpError::invalid_request(format!(
            "Request ID must be a string, number or null, got {}",
            type_name(other)
        ))),
    }
}

/// Validate the method field and return it as a string slice
pub fn validate_method(method: Option<&Value>) -> Result<&str> {
    match method {
        Some(Value::String(name)) if !name.is_empty() => Ok(name),
        Some(Value::String(_)) => Err(McpError::invalid_request("Method name cannot be empty")),
        Some(other) => Err(McpError::invalid_request(format!(
            "Method must be a string, got {}",
            type_name(other)
        ))),
        None => Err(McpError::invalid_request("Missing 'method' field")),
    }
}

/// Validate `params`: an object or array when present; null counts as absent
pub fn validate_params(params: Option<&Value>) -> Result<Option<Value>> {
    match params {
        None | Some(Value::Null) => Ok(None),
        Some(value @ (Value::Object(_) | Value::Array(_))) => Ok(Some(value.clone())),
        Some(other) => Err(McpError::invalid_request(format!(
            "Params must be an object or array, got {}",
            type_name(other)
        ))),
    }
}

/// Validate URI format
pub fn validate_uri(uri: &str) -> Result<()> {
    if uri.is_empty() {
        return Err(McpError::invalid_params("URI cannot be empty"));
    }

    url::Url::parse(uri)
        .map_err(|e| McpError::invalid_params(format!("Invalid URI '{}': {}", uri, e)))?;

    Ok(())
}

/// Validate MIME type format
pub fn validate_mime_type(mime_type: &str) -> Result<()> {
    let mut parts = mime_type.splitn(2, '/');
    match (parts.next(), parts.next()) {
        (Some(kind), Some(subtype)) if !kind.is_empty() && !subtype.is_empty() => Ok(()),
        _ => Err(McpError::invalid_params(format!(
            "Invalid MIME type format: {}",
            mime_type
        ))),
    }
}

/// Validate pagination cursor. Cursors are opaque; only emptiness is rejected.
pub fn validate_cursor(cursor: &str) -> Result<()> {
    if cursor.is_empty() {
        return Err(McpError::invalid_params("Cursor cannot be empty"));
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_jsonrpc_tag_literal() {
        assert!(validate_jsonrpc_tag(&envelope(json!({"jsonrpc": "2.0"}))).is_ok());
        assert!(validate_jsonrpc_tag(&envelope(json!({"jsonrpc": "1.0"}))).is_err());
        assert!(validate_jsonrpc_tag(&envelope(json!({"jsonrpc": 2.0}))).is_err());
        assert!(validate_jsonrpc_tag(&envelope(json!({}))).is_err());
    }

    #[test]
    fn test_validate_id_types() {
        assert!(validate_id(&json!("abc")).is_ok());
        assert!(validate_id(&json!(7)).is_ok());
        assert!(validate_id(&json!(null)).is_ok());
        assert!(validate_id(&json!(true)).is_err());
        assert!(validate_id(&json!({"id": 1})).is_err());
        assert!(validate_id(&json!([1])).is_err());
    }

    #[test]
    fn test_validate_method() {
        assert_eq!(validate_method(Some(&json!("ping"))).unwrap(), "ping");
        assert!(validate_method(Some(&json!(""))).is_err());
        assert!(validate_method(Some(&json!(42))).is_err());
        assert!(validate_method(None).is_err());
    }

    #[test]
    fn test_validate_params() {
        assert_eq!(validate_params(None).unwrap(), None);
        assert_eq!(validate_params(Some(&json!(null))).unwrap(), None);
        assert!(validate_params(Some(&json!({"a": 1}))).unwrap().is_some());
        assert!(validate_params(Some(&json!([1, 2]))).unwrap().is_some());
        assert!(validate_params(Some(&json!("nope"))).is_err());
    }

    #[test]
    fn test_validate_uri() {
        assert!(validate_uri("https://example.com/resource").is_ok());
        assert!(validate_uri("file:///path/to/file").is_ok());
        assert!(validate_uri("info://server/about").is_ok());
        assert!(validate_uri("").is_err());
        assert!(validate_uri("invalid-uri").is_err());
    }

    #[test]
    fn test_validate_mime_type() {
        assert!(validate_mime_type("text/plain").is_ok());
        assert!(validate_mime_type("application/json").is_ok());
        assert!(validate_mime_type("").is_err());
        assert!(validate_mime_type("invalid").is_err());
        assert!(validate_mime_type("text/").is_err());
        assert!(validate_mime_type("/plain").is_err());
    }
}
