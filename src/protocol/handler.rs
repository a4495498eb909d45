//! Protocol message handler for MCP server.
//!
//! The dispatcher: a route table from method name to either a built-in
//! [`Method`] or an extension [`MethodHandler`], the initialization gate,
//! and the fault classification that turns handler errors into JSON-RPC
//! error objects. One `ProtocolHandler` is one session; it is shared behind
//! an `Arc` by every in-flight request of that session.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::{Config, ErrorPosture, ServerConfig};
use crate::error::{ErrorCode, JsonRpcError, McpError, Result};
use crate::protocol::codec::{decode_message, parse_message};
use crate::protocol::validation::validate_cursor;
use crate::protocol::{
    CallToolParams, GetPromptParams, Implementation, InitializeRequest, InitializeResult,
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListPromptsResult,
    ListResourcesResult, ListToolsResult, PaginationParams, ReadResourceParams,
    ReadResourceResult, ServerCapabilities, SetLevelParams,
};
use crate::server::features::{build_capabilities, CapabilityRegistry, LoggingManager};
use crate::server::session::{Negotiated, ServerSession};
use crate::SUPPORTED_PROTOCOL_VERSIONS;

/// Built-in methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Initialize,
    Initialized,
    Ping,
    ResourcesList,
    ResourcesRead,
    ToolsList,
    ToolsCall,
    PromptsList,
    PromptsGet,
    LoggingSetLevel,
}

impl Method {
    /// Wire names served by this method
    pub fn names(self) -> &'static [&'static str] {
        match self {
            Method::Initialize => &["initialize"],
            Method::Initialized => &["initialized", "notifications/initialized"],
            Method::Ping => &["ping"],
            Method::ResourcesList => &["resources/list"],
            Method::ResourcesRead => &["resources/read"],
            Method::ToolsList => &["tools/list"],
            Method::ToolsCall => &["tools/call"],
            Method::PromptsList => &["prompts/list"],
            Method::PromptsGet => &["prompts/get"],
            Method::LoggingSetLevel => &["logging/setLevel"],
        }
    }
}

/// Method names legal before `initialize` has succeeded
const LIFECYCLE_METHODS: &[&str] = &["initialize", "initialized", "notifications/initialized", "ping"];

/// Handler for a method added at runtime
#[async_trait::async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>) -> Result<Value>;
}

/// Route table entry
#[derive(Clone)]
pub enum Route {
    Builtin(Method),
    Extension(Arc<dyn MethodHandler>),
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Builtin(method) => write!(f, "Builtin({:?})", method),
            Route::Extension(_) => write!(f, "Extension"),
        }
    }
}

/// Protocol handler for processing MCP messages
pub struct ProtocolHandler {
    /// Shared capability registry
    registry: Arc<CapabilityRegistry>,

    /// Lifecycle state for this session
    session: ServerSession,

    /// Client-facing log channel
    logging: LoggingManager,

    /// Method name → route
    routes: RwLock<HashMap<String, Route>>,

    /// Server identity and policy
    settings: ServerConfig,
}

impl ProtocolHandler {
    /// Create a handler for one session, with routes for the enabled features
    pub fn new(registry: Arc<CapabilityRegistry>, config: &Config) -> Self {
        let capabilities = build_capabilities(&config.features);
        let server_info = Implementation {
            name: config.server.name.clone(),
            version: config.server.version.clone(),
        };

        let mut methods = vec![Method::Initialize, Method::Initialized, Method::Ping];
        if config.features.resources {
            methods.extend([Method::ResourcesList, Method::ResourcesRead]);
        }
        if config.features.tools {
            methods.extend([Method::ToolsList, Method::ToolsCall]);
        }
        if config.features.prompts {
            methods.extend([Method::PromptsList, Method::PromptsGet]);
        }
        if config.features.logging {
            methods.push(Method::LoggingSetLevel);
        }

        let routes = methods
            .into_iter()
            .flat_map(|method| {
                method
                    .names()
                    .iter()
                    .map(move |name| (name.to_string(), Route::Builtin(method)))
            })
            .collect();

        Self {
            registry,
            session: ServerSession::new(capabilities, server_info),
            logging: LoggingManager::new(),
            routes: RwLock::new(routes),
            settings: config.server.clone(),
        }
    }

    /// Register or replace a method. The last registration for a name wins.
    pub fn register_method(&self, name: impl Into<String>, handler: Arc<dyn MethodHandler>) -> Option<Route> {
        let name = name.into();
        let previous = self
            .routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), Route::Extension(handler));
        if previous.is_some() {
            info!("Replaced handler for method: {}", name);
        } else {
            info!("Registered handler for method: {}", name);
        }
        previous
    }

    /// Look up a route
    pub fn route(&self, method: &str) -> Option<Route> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned()
    }

    /// Served method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    pub fn logging(&self) -> &LoggingManager {
        &self.logging
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        self.session.capabilities()
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_initialized()
    }

    pub fn posture(&self) -> ErrorPosture {
        self.settings.posture
    }

    /// Handle one raw line or body holding a single message
    pub async fn handle_raw(&self, raw: &str) -> Option<JsonRpcResponse> {
        match parse_message(raw) {
            Ok(message) => self.handle_message(message).await,
            Err(rejection) => {
                warn!("Rejected message: {}", rejection.error);
                Some(rejection.into_response())
            }
        }
    }

    /// Handle one already-parsed JSON value
    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        match decode_message(value) {
            Ok(message) => self.handle_message(message).await,
            Err(rejection) => {
                warn!("Rejected message: {}", rejection.error);
                Some(rejection.into_response())
            }
        }
    }

    /// Handle a validated message. Only requests produce a response.
    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await;
                None
            }
            JsonRpcMessage::Response(response) => {
                debug!("Ignoring client response for id {}", response.id);
                None
            }
        }
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!("Handling request: {} (id: {})", request.method, request.id);

        match self.dispatch(&request.method, request.params, true).await {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(err) => {
                self.report_fault(&request.method, &err);
                JsonRpcResponse::error(request.id, err.to_json_rpc_error(self.posture()))
            }
        }
    }

    /// Handle a JSON-RPC notification. Failures are logged, never answered.
    pub async fn handle_notification(&self, notification: JsonRpcNotification) {
        debug!("Handling notification: {}", notification.method);

        if self.route(&notification.method).is_none() {
            debug!("Ignoring notification for unknown method: {}", notification.method);
            return;
        }

        if let Err(err) = self
            .dispatch(&notification.method, notification.params, false)
            .await
        {
            self.report_fault(&notification.method, &err);
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>, is_request: bool) -> Result<Value> {
        let route = self
            .route(method)
            .ok_or_else(|| McpError::method_not_found(method))?;

        if self.settings.require_initialization
            && !self.session.is_initialized()
            && !LIFECYCLE_METHODS.contains(&method)
        {
            return Err(McpError::ServerError("Server not initialized".to_string()));
        }

        match route {
            Route::Builtin(builtin) => self.call_builtin(builtin, params, is_request).await,
            Route::Extension(handler) => handler.handle(params).await,
        }
    }

    async fn call_builtin(&self, method: Method, params: Option<Value>, is_request: bool) -> Result<Value> {
        match method {
            Method::Initialize => {
                if !is_request {
                    return Err(McpError::invalid_request(
                        "'initialize' must be sent as a request",
                    ));
                }
                self.handle_initialize(params)
            }
            Method::Initialized => {
                if is_request {
                    return Err(McpError::invalid_request(
                        "'initialized' is a notification and must not carry an id",
                    ));
                }
                info!("Client confirmed initialization");
                Ok(Value::Null)
            }
            Method::Ping => Ok(json!({})),
            Method::ResourcesList => {
                check_pagination(params)?;
                Ok(serde_json::to_value(ListResourcesResult {
                    resources: self.registry.resources.list(),
                    next_cursor: None,
                })?)
            }
            Method::ResourcesRead => {
                let params: ReadResourceParams = parse_params("resources/read", params)?;
                let contents = self.registry.resources.read(&params.uri).await?;
                Ok(serde_json::to_value(ReadResourceResult { contents })?)
            }
            Method::ToolsList => {
                check_pagination(params)?;
                Ok(serde_json::to_value(ListToolsResult {
                    tools: self.registry.tools.list(),
                    next_cursor: None,
                })?)
            }
            Method::ToolsCall => {
                let params: CallToolParams = parse_params("tools/call", params)?;
                let result = self.registry.tools.call(&params.name, params.arguments).await?;
                Ok(serde_json::to_value(result)?)
            }
            Method::PromptsList => {
                check_pagination(params)?;
                Ok(serde_json::to_value(ListPromptsResult {
                    prompts: self.registry.prompts.list(),
                    next_cursor: None,
                })?)
            }
            Method::PromptsGet => {
                let params: GetPromptParams = parse_params("prompts/get", params)?;
                let result = self
                    .registry
                    .prompts
                    .render(&params.name, params.arguments)
                    .await?;
                Ok(serde_json::to_value(result)?)
            }
            Method::LoggingSetLevel => {
                let params: SetLevelParams = parse_params("logging/setLevel", params)?;
                self.logging.set_level(params.level);
                Ok(json!({}))
            }
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let request: InitializeRequest = parse_params("initialize", params)?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&request.protocol_version.as_str()) {
            return Err(JsonRpcError::new(
                ErrorCode::InvalidParams,
                format!("Unsupported protocol version: {}", request.protocol_version),
            )
            .with_data(json!({
                "supported": SUPPORTED_PROTOCOL_VERSIONS,
                "requested": request.protocol_version,
            }))
            .into());
        }

        let client = request.client_info.clone();
        let negotiated = Negotiated {
            protocol_version: request.protocol_version.clone(),
            client_info: request.client_info,
            client_capabilities: request.capabilities,
        };

        if self.settings.allow_reinitialize {
            if let Some(previous) = self.session.initialize(negotiated) {
                warn!(
                    "Session re-initialized; replacing client {} {}",
                    previous.client_info.name, previous.client_info.version
                );
            }
        } else if !self.session.initialize_once(negotiated) {
            return Err(McpError::invalid_request("Server already initialized"));
        }

        info!(
            "Initialized session for {} {} (protocol {})",
            client.name, client.version, request.protocol_version
        );

        Ok(serde_json::to_value(InitializeResult {
            protocol_version: request.protocol_version,
            capabilities: self.session.capabilities().clone(),
            server_info: self.session.server_info().clone(),
            instructions: self.settings.instructions.clone(),
        })?)
    }

    fn report_fault(&self, method: &str, err: &McpError) {
        if err.is_protocol_fault() {
            debug!("Method {} rejected: {}", method, err);
            return;
        }

        error!("Method {} failed: {}", method, err);
        let detail = match self.posture() {
            ErrorPosture::Development => err.to_string(),
            ErrorPosture::Production => ErrorCode::InternalError.message().to_string(),
        };
        self.logging
            .error(Some("dispatcher"), json!({"method": method, "error": detail}));
    }
}

/// Deserialize required params, mapping any shape mismatch to InvalidParams
fn parse_params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T> {
    let params =
        params.ok_or_else(|| McpError::invalid_params(format!("Missing params for {}", method)))?;
    serde_json::from_value(params)
        .map_err(|e| McpError::invalid_params(format!("Invalid params for {}: {}", method, e)))
}

/// `*/list` accept an optional cursor, which is checked and otherwise ignored
fn check_pagination(params: Option<Value>) -> Result<()> {
    let Some(params) = params else {
        return Ok(());
    };
    let pagination: PaginationParams = serde_json::from_value(params)
        .map_err(|e| McpError::invalid_params(format!("Invalid pagination params: {}", e)))?;
    if let Some(cursor) = &pagination.cursor {
        validate_cursor(cursor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CallToolResult, LoggingLevel, Tool};
    use crate::providers::register_builtins;
    use crate::server::features::ToolProvider;
    use serde_json::Map;

    struct Fixed(Value);

    #[async_trait::async_trait]
    impl MethodHandler for Fixed {
        async fn handle(&self, _params: Option<Value>) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    struct Exploding;

    #[async_trait::async_trait]
    impl ToolProvider for Exploding {
        async fn execute(&self, _name: &str, _arguments: Map<String, Value>) -> Result<CallToolResult> {
            Err(McpError::provider("disk full"))
        }
    }

    fn handler_with(config: Config) -> ProtocolHandler {
        let registry = Arc::new(CapabilityRegistry::new());
        register_builtins(&registry, &config).unwrap();
        ProtocolHandler::new(registry, &config)
    }

    fn handler() -> ProtocolHandler {
        handler_with(Config::default())
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcMessage {
        JsonRpcMessage::Request(JsonRpcRequest::new(json!(id), method, Some(params)))
    }

    fn init_params() -> Value {
        json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "1.0.0"}
        })
    }

    async fn initialized() -> ProtocolHandler {
        let handler = handler();
        let response = handler
            .handle_message(request(0, "initialize", init_params()))
            .await
            .unwrap();
        assert!(!response.is_error());
        handler
    }

    fn error_code(response: &JsonRpcResponse) -> i32 {
        response.error.as_ref().map(|e| e.code).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_initialize_result_shape() {
        let handler = handler();
        let response = handler
            .handle_message(request(1, "initialize", init_params()))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], crate::SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
        assert!(handler.is_initialized());
    }

    #[tokio::test]
    async fn test_unsupported_version_rejected() {
        let handler = handler();
        let mut params = init_params();
        params["protocolVersion"] = json!("1999-01-01");

        let response = handler
            .handle_message(request(1, "initialize", params))
            .await
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32602);
        assert!(error.data.unwrap()["supported"].is_array());
        assert!(!handler.is_initialized());
    }

    #[tokio::test]
    async fn test_methods_gated_until_initialized() {
        let handler = handler();
        let response = handler
            .handle_message(request(1, "tools/list", json!({})))
            .await
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32000);
        assert_eq!(error.message, "Server not initialized");

        let pong = handler.handle_message(request(2, "ping", json!({}))).await.unwrap();
        assert_eq!(pong.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_gate_can_be_disabled() {
        let mut config = Config::default();
        config.server.require_initialization = false;
        let handler = handler_with(config);

        let response = handler
            .handle_message(request(1, "tools/list", json!({})))
            .await
            .unwrap();
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn test_unknown_method_not_found() {
        for handler in [handler(), initialized().await] {
            let response = handler
                .handle_message(request(9, "does/not/exist", json!({})))
                .await
                .unwrap();
            assert_eq!(error_code(&response), -32601);
            assert_eq!(response.id, json!(9));
            assert_eq!(
                response.error.unwrap().message,
                "Method not found: does/not/exist"
            );
        }
    }

    #[tokio::test]
    async fn test_notifications_never_answered() {
        let handler = handler();
        let notifications = [
            JsonRpcNotification::new("notifications/initialized", None),
            JsonRpcNotification::new("initialized", None),
            JsonRpcNotification::new("unknown/method", Some(json!({}))),
            JsonRpcNotification::new("tools/call", Some(json!({"bogus": true}))),
            JsonRpcNotification::new("initialize", Some(init_params())),
            JsonRpcNotification::new("ping", None),
        ];
        for notification in notifications {
            let outcome = handler
                .handle_message(JsonRpcMessage::Notification(notification))
                .await;
            assert!(outcome.is_none());
        }
        assert!(!handler.is_initialized());
    }

    #[tokio::test]
    async fn test_initialized_as_request_is_invalid() {
        let handler = initialized().await;
        let response = handler
            .handle_message(request(3, "notifications/initialized", json!({})))
            .await
            .unwrap();
        assert_eq!(error_code(&response), -32600);
    }

    #[tokio::test]
    async fn test_double_initialize_re_succeeds_by_default() {
        let handler = initialized().await;
        let mut params = init_params();
        params["protocolVersion"] = json!("2024-11-05");
        params["clientInfo"]["name"] = json!("second-client");

        let response = handler
            .handle_message(request(2, "initialize", params))
            .await
            .unwrap();
        assert!(!response.is_error());

        let negotiated = handler.session().negotiated().unwrap();
        assert_eq!(negotiated.protocol_version, "2024-11-05");
        assert_eq!(negotiated.client_info.name, "second-client");
    }

    #[tokio::test]
    async fn test_double_initialize_rejected_when_strict() {
        let mut config = Config::default();
        config.server.allow_reinitialize = false;
        let handler = handler_with(config);

        let first = handler
            .handle_message(request(1, "initialize", init_params()))
            .await
            .unwrap();
        assert!(!first.is_error());

        let second = handler
            .handle_message(request(2, "initialize", init_params()))
            .await
            .unwrap();
        assert_eq!(error_code(&second), -32600);
    }

    #[tokio::test]
    async fn test_echo_tool() {
        let handler = initialized().await;
        let response = handler
            .handle_message(request(
                5,
                "tools/call",
                json!({"name": "echo", "arguments": {"text": "Hello, World!"}}),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["text"], "Hello, World!");
        assert_eq!(result["content"][0]["type"], "text");
    }

    #[tokio::test]
    async fn test_tools_call_param_faults() {
        let handler = initialized().await;
        let cases = [
            json!({}),
            json!({"name": "no-such-tool"}),
            json!({"name": "echo", "arguments": "text"}),
            json!({"name": "echo", "arguments": {}}),
        ];
        for params in cases {
            let response = handler
                .handle_message(request(6, "tools/call", params.clone()))
                .await
                .unwrap();
            assert_eq!(error_code(&response), -32602, "params: {}", params);
        }

        let response = handler
            .handle_message(JsonRpcMessage::Request(JsonRpcRequest::new(
                json!(7),
                "tools/call",
                None,
            )))
            .await
            .unwrap();
        assert_eq!(error_code(&response), -32602);
    }

    #[tokio::test]
    async fn test_handled_tool_failure_is_result() {
        let handler = initialized().await;
        let response = handler
            .handle_message(request(
                8,
                "tools/call",
                json!({"name": "calculate", "arguments": {"expression": "2 +* 3"}}),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));
    }

    struct SelfChecking;

    #[async_trait::async_trait]
    impl ToolProvider for SelfChecking {
        async fn execute(&self, _name: &str, arguments: Map<String, Value>) -> Result<CallToolResult> {
            Ok(match arguments.get("n").and_then(Value::as_i64) {
                Some(n) => CallToolResult::text((n * 2).to_string()),
                None => CallToolResult::error("'n' must be an integer"),
            })
        }
    }

    #[tokio::test]
    async fn test_provider_validates_its_own_arguments() {
        let handler = initialized().await;
        let tools = &handler.registry().tools;
        tools.register(
            Tool::new(
                "double",
                "Double an integer",
                json!({"type": "object", "properties": {"n": {"type": "integer"}}}),
            ),
            Arc::new(SelfChecking),
        );
        tools.register(
            Tool::new("double_loose", "Double an integer", json!({"type": "int"})),
            Arc::new(SelfChecking),
        );

        let response = handler
            .handle_message(request(
                30,
                "tools/call",
                json!({"name": "double", "arguments": {"n": "x"}}),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));
        assert_eq!(result["content"][0]["text"], "'n' must be an integer");

        let response = handler
            .handle_message(request(
                31,
                "tools/call",
                json!({"name": "double_loose", "arguments": {"n": 3}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap()["content"][0]["text"], "6");

        tools.set_argument_validation(true);
        let response = handler
            .handle_message(request(
                32,
                "tools/call",
                json!({"name": "double", "arguments": {"n": "x"}}),
            ))
            .await
            .unwrap();
        assert_eq!(error_code(&response), -32602);
    }

    #[tokio::test]
    async fn test_register_twice_lists_once() {
        let handler = initialized().await;
        let tool = Tool::new(
            "twice",
            "Registered twice",
            json!({"type": "object", "properties": {"x": {"type": "number"}}}),
        );
        let tools = &handler.registry().tools;
        tools.register(tool.clone(), Arc::new(Exploding));
        tools.register(tool.clone(), Arc::new(Exploding));

        let response = handler
            .handle_message(request(9, "tools/list", json!({})))
            .await
            .unwrap();
        let listed: Vec<Tool> =
            serde_json::from_value(response.result.unwrap()["tools"].clone()).unwrap();
        let matches: Vec<&Tool> = listed.iter().filter(|t| t.name == "twice").collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0], &tool);
    }

    #[tokio::test]
    async fn test_unregistered_resource_is_invalid_params() {
        let handler = initialized().await;
        let response = handler
            .handle_message(request(10, "resources/read", json!({"uri": "file:///nowhere"})))
            .await
            .unwrap();
        assert_eq!(error_code(&response), -32602);
    }

    #[tokio::test]
    async fn test_read_builtin_resource() {
        let handler = initialized().await;
        let response = handler
            .handle_message(request(11, "resources/read", json!({"uri": "info://server/about"})))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["contents"][0]["uri"], "info://server/about");
        assert!(result["contents"][0]["text"].is_string());
    }

    #[tokio::test]
    async fn test_prompts_get() {
        let handler = initialized().await;
        let response = handler
            .handle_message(request(
                12,
                "prompts/get",
                json!({"name": "greeting", "arguments": {"name": "Ada"}}),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["messages"][0]["role"], "user");
        assert!(result["messages"][0]["content"]["text"]
            .as_str()
            .unwrap()
            .contains("Ada"));

        let response = handler
            .handle_message(request(13, "prompts/get", json!({"name": "greeting"})))
            .await
            .unwrap();
        assert_eq!(error_code(&response), -32602);
    }

    #[tokio::test]
    async fn test_internal_fault_posture() {
        for (posture, expect_data) in [
            (ErrorPosture::Development, true),
            (ErrorPosture::Production, false),
        ] {
            let mut config = Config::default();
            config.server.posture = posture;
            config.server.require_initialization = false;
            let handler = handler_with(config);
            handler
                .registry()
                .tools
                .register(
                    Tool::new("explode", "Always faults", json!({"type": "object"})),
                    Arc::new(Exploding),
                );

            let response = handler
                .handle_message(request(14, "tools/call", json!({"name": "explode"})))
                .await
                .unwrap();
            let error = response.error.unwrap();
            assert_eq!(error.code, -32603);
            assert_eq!(error.message, "Internal error");
            assert_eq!(error.data.is_some(), expect_data);
        }
    }

    #[tokio::test]
    async fn test_internal_fault_reaches_client_log() {
        let mut config = Config::default();
        config.server.require_initialization = false;
        let handler = handler_with(config);
        handler
            .registry()
            .tools
            .register(
                Tool::new("explode", "Always faults", json!({"type": "object"})),
                Arc::new(Exploding),
            );
        let mut log = handler.logging().subscribe();

        handler
            .handle_message(request(15, "tools/call", json!({"name": "explode"})))
            .await;

        let message = log.recv().await.unwrap();
        assert_eq!(message.level, LoggingLevel::Error);
        assert_eq!(message.data["method"], "tools/call");
    }

    #[tokio::test]
    async fn test_set_level() {
        let handler = initialized().await;
        let response = handler
            .handle_message(request(16, "logging/setLevel", json!({"level": "warning"})))
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!({})));
        assert_eq!(handler.logging().level(), LoggingLevel::Warning);

        let response = handler
            .handle_message(request(17, "logging/setLevel", json!({"level": "loud"})))
            .await
            .unwrap();
        assert_eq!(error_code(&response), -32602);
    }

    #[tokio::test]
    async fn test_register_method_last_write_wins() {
        let handler = initialized().await;
        assert!(handler
            .register_method("custom/echo", Arc::new(Fixed(json!("first"))))
            .is_none());
        assert!(handler
            .register_method("custom/echo", Arc::new(Fixed(json!("second"))))
            .is_some());

        let response = handler
            .handle_message(request(18, "custom/echo", json!({})))
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!("second")));

        let previous = handler.register_method("ping", Arc::new(Fixed(json!({"pong": true}))));
        assert!(matches!(previous, Some(Route::Builtin(Method::Ping))));
        let response = handler.handle_message(request(19, "ping", json!({}))).await.unwrap();
        assert_eq!(response.result, Some(json!({"pong": true})));
    }

    #[tokio::test]
    async fn test_disabled_feature_has_no_route() {
        let mut config = Config::default();
        config.features.prompts = false;
        let handler = handler_with(config);
        assert!(handler.route("prompts/list").is_none());
        assert!(handler.capabilities().prompts.is_none());
        assert!(handler.route("tools/list").is_some());
    }

    #[tokio::test]
    async fn test_raw_missing_jsonrpc() {
        let handler = handler();
        let response = handler.handle_raw(r#"{"method":"test"}"#).await.unwrap();
        assert_eq!(error_code(&response), -32600);
        assert_eq!(response.id, Value::Null);

        let response = handler.handle_raw("{oops").await.unwrap();
        assert_eq!(error_code(&response), -32700);
    }

    #[tokio::test]
    async fn test_client_responses_ignored() {
        let handler = handler();
        let outcome = handler
            .handle_value(json!({"jsonrpc": "2.0", "id": 1, "result": {}}))
            .await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_cursor_accepted_and_validated() {
        let handler = initialized().await;
        let response = handler
            .handle_message(request(20, "resources/list", json!({"cursor": "abc"})))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert!(result.get("nextCursor").is_none());

        let response = handler
            .handle_message(request(21, "prompts/list", json!({"cursor": 5})))
            .await
            .unwrap();
        assert_eq!(error_code(&response), -32602);
    }
}
