//! JSON-RPC message codec.
//!
//! Turns raw bytes into validated [`JsonRpcMessage`]s. Syntactically broken
//! input is a ParseError; well-formed JSON with the wrong shape is an
//! InvalidRequest. Either way the caller gets a [`Rejection`] that already
//! knows which `id` to echo.

use crate::config::ErrorPosture;
use crate::error::{JsonRpcError, McpError};
use crate::protocol::validation::{
    validate_id, validate_jsonrpc_tag, validate_method, validate_params,
};
use crate::protocol::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};
use serde::Serialize;
use serde_json::Value;

/// A message the codec refused, with the id to echo in the error response
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub id: RequestId,
    pub error: JsonRpcError,
}

impl Rejection {
    fn new(id: RequestId, error: McpError) -> Self {
        Self {
            id,
            // Codec faults are always protocol-shaped, so posture has no effect.
            error: error.to_json_rpc_error(ErrorPosture::Production),
        }
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(Value::Null, McpError::parse_error(detail.to_string()))
    }

    /// An input refused before any id could be read
    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(Value::Null, McpError::invalid_request(detail.to_string()))
    }

    pub fn code(&self) -> i32 {
        self.error.code
    }

    pub fn into_response(self) -> JsonRpcResponse {
        JsonRpcResponse::error(self.id, self.error)
    }
}

/// Top-level HTTP payload: one message or a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Single(Value),
    Batch(Vec<Value>),
}

/// Parse a single line or body into a validated message
pub fn parse_message(raw: &str) -> Result<JsonRpcMessage, Rejection> {
    let value: Value = serde_json::from_str(raw).map_err(Rejection::parse_error)?;
    decode_message(value)
}

/// Parse a top-level payload that may be a batch
pub fn parse_payload(raw: &[u8]) -> Result<Payload, Rejection> {
    let value: Value = serde_json::from_slice(raw).map_err(Rejection::parse_error)?;
    Ok(match value {
        Value::Array(items) => Payload::Batch(items),
        other => Payload::Single(other),
    })
}

/// Classify an already-parsed JSON value
pub fn decode_message(value: Value) -> Result<JsonRpcMessage, Rejection> {
    let envelope = match value {
        Value::Object(envelope) => envelope,
        _ => {
            return Err(Rejection::new(
                Value::Null,
                McpError::invalid_request("Message must be a JSON object"),
            ))
        }
    };

    // The id is echoed only when it has a legal type.
    let raw_id = envelope.get("id");
    let echo_id = raw_id
        .filter(|id| validate_id(id).is_ok())
        .cloned()
        .unwrap_or(Value::Null);
    let reject = |error: McpError| Rejection::new(echo_id.clone(), error);

    validate_jsonrpc_tag(&envelope).map_err(reject)?;
    if let Some(id) = raw_id {
        validate_id(id).map_err(reject)?;
    }

    let is_response = !envelope.contains_key("method")
        && (envelope.contains_key("result") || envelope.contains_key("error"));

    if is_response {
        let id = raw_id
            .cloned()
            .ok_or_else(|| reject(McpError::invalid_request("Response must carry an 'id'")))?;
        return match (envelope.get("result"), envelope.get("error")) {
            (Some(_), Some(_)) => Err(reject(McpError::invalid_request(
                "Response cannot have both result and error",
            ))),
            (Some(result), None) => Ok(JsonRpcMessage::Response(JsonRpcResponse::success(
                id,
                result.clone(),
            ))),
            (None, Some(error)) => {
                let error: JsonRpcError = serde_json::from_value(error.clone()).map_err(|e| {
                    reject(McpError::invalid_request(format!(
                        "Malformed error object: {}",
                        e
                    )))
                })?;
                Ok(JsonRpcMessage::Response(JsonRpcResponse::error(id, error)))
            }
            (None, None) => Err(reject(McpError::invalid_request(
                "Response must have either result or error",
            ))),
        };
    }

    let method = validate_method(envelope.get("method")).map_err(reject)?;
    let params = validate_params(envelope.get("params")).map_err(reject)?;

    // Presence of the field, not its value, marks a request.
    Ok(match raw_id {
        Some(id) => JsonRpcMessage::Request(JsonRpcRequest::new(id.clone(), method, params)),
        None => JsonRpcMessage::Notification(JsonRpcNotification::new(method, params)),
    })
}

/// Serialize any protocol value to a single line of JSON
pub fn serialize_message<T: Serialize>(message: &T) -> crate::Result<String> {
    serde_json::to_string(message).map_err(McpError::Serialization)
}
