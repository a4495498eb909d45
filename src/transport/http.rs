//! HTTP transport implementation for MCP server.
//!
//! `POST {endpoint_path}` takes one JSON-RPC message or a batch. Every
//! request shares a single session. There is no server push over HTTP, so
//! list-changed events and client log messages are not delivered here.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{Condition, DefaultHeaders};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::Utc;
use futures::future::join_all;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_actix_web::TracingLogger;

use crate::config::{HttpConfig, TransportType};
use crate::error::{McpError, Result};
use crate::protocol::codec::{parse_payload, Payload, Rejection};
use crate::protocol::{JsonRpcResponse, ProtocolHandler};
use crate::transport::{Transport, TransportInfo};
use crate::{PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};

/// HTTP transport implementation
pub struct HttpTransport {
    config: HttpConfig,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ProtocolHandler>,
    pub config: HttpConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

/// Build the application: MCP endpoint, health, metadata and a JSON 404
pub fn create_app(
    state: AppState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let endpoint = state.config.endpoint_path.clone();

    App::new()
        .app_data(web::Data::new(state))
        .route(&endpoint, web::post().to(handle_post))
        .route("/health", web::get().to(handle_health))
        .route("/", web::get().to(handle_root))
        .default_service(web::to(handle_not_found))
}

fn build_cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    if origins.iter().any(|origin| origin == "*") {
        cors.allow_any_origin()
    } else {
        origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn run(&self, handler: Arc<ProtocolHandler>) -> Result<()> {
        let state = AppState {
            handler,
            config: self.config.clone(),
        };
        let bind_addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let enable_cors = self.config.enable_cors;
        let origins = self.config.cors_origins.clone();

        info!(
            "Starting HTTP transport on {}{}",
            bind_addr, self.config.endpoint_path
        );

        // actix installs its own SIGINT/SIGTERM handling and stops gracefully
        let server = HttpServer::new(move || {
            create_app(state.clone())
                .wrap(Condition::new(enable_cors, build_cors(&origins)))
                .wrap(
                    DefaultHeaders::new()
                        .add(("X-Content-Type-Options", "nosniff"))
                        .add(("X-Frame-Options", "DENY")),
                )
                .wrap(TracingLogger::default())
        })
        .bind(&bind_addr)
        .map_err(|e| McpError::Transport(format!("Failed to bind to {}: {}", bind_addr, e)))?
        .run();

        server.await?;

        info!("HTTP transport stopped");
        Ok(())
    }

    fn info(&self) -> TransportInfo {
        TransportInfo {
            transport_type: TransportType::Http,
            address: format!(
                "{}:{}{}",
                self.config.bind_address, self.config.port, self.config.endpoint_path
            ),
            max_message_size: Some(self.config.max_body_size),
        }
    }
}

/// Collect the request body, refusing anything over `limit` bytes with an
/// error envelope
async fn read_body(mut payload: web::Payload, limit: usize) -> std::result::Result<BytesMut, HttpResponse> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            warn!("Failed to read HTTP body: {}", e);
            HttpResponse::BadRequest().json(Rejection::parse_error(e).into_response())
        })?;

        if body.len() + chunk.len() > limit {
            warn!("Rejected HTTP body larger than {} bytes", limit);
            let rejection =
                Rejection::invalid_request(format!("Request body exceeds {} bytes", limit));
            return Err(HttpResponse::PayloadTooLarge().json(rejection.into_response()));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Handle a single message or a batch
async fn handle_post(body: web::Payload, state: web::Data<AppState>) -> HttpResponse {
    let body = match read_body(body, state.config.max_body_size).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected HTTP body: {}", rejection.error);
            return HttpResponse::BadRequest().json(rejection.into_response());
        }
    };

    let handler = &state.handler;
    match payload {
        Payload::Single(value) => match handler.handle_value(value).await {
            Some(response) => HttpResponse::Ok().json(response),
            None => HttpResponse::NoContent().finish(),
        },
        Payload::Batch(items) if items.is_empty() => {
            let error = McpError::invalid_request("Batch must not be empty")
                .to_json_rpc_error(handler.posture());
            HttpResponse::Ok().json(JsonRpcResponse::error(Value::Null, error))
        }
        Payload::Batch(items) => {
            debug!("Handling batch of {} messages", items.len());
            let responses: Vec<JsonRpcResponse> =
                join_all(items.into_iter().map(|item| handler.handle_value(item)))
                    .await
                    .into_iter()
                    .flatten()
                    .collect();

            if responses.is_empty() {
                HttpResponse::NoContent().finish()
            } else {
                HttpResponse::Ok().json(responses)
            }
        }
    }
}

async fn handle_health(state: web::Data<AppState>) -> HttpResponse {
    let handler = &state.handler;
    let server_info = handler.session().server_info();
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "server": {
            "name": server_info.name,
            "version": server_info.version,
        },
        "capabilities": handler.capabilities(),
        "initialized": handler.is_initialized(),
    }))
}

async fn handle_root(state: web::Data<AppState>) -> HttpResponse {
    let server_info = state.handler.session().server_info();
    HttpResponse::Ok().json(json!({
        "name": server_info.name,
        "version": server_info.version,
        "protocolVersion": PROTOCOL_VERSION,
        "supportedProtocolVersions": SUPPORTED_PROTOCOL_VERSIONS,
        "transport": "http",
        "endpoints": available_endpoints(&state.config),
    }))
}

async fn handle_not_found(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    debug!("No route for {} {}", req.method(), req.path());
    HttpResponse::NotFound().json(json!({
        "error": "Not Found",
        "message": format!("No route for {} {}", req.method(), req.path()),
        "availableEndpoints": available_endpoints(&state.config),
    }))
}

fn available_endpoints(config: &HttpConfig) -> Vec<String> {
    vec![
        format!("POST {}", config.endpoint_path),
        "GET /health".to_string(),
        "GET /".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::providers::register_builtins;
    use crate::server::features::CapabilityRegistry;
    use actix_web::http::StatusCode;
    use actix_web::test;

    fn state() -> AppState {
        state_with(Config::default())
    }

    fn state_with(config: Config) -> AppState {
        let registry = Arc::new(CapabilityRegistry::new());
        register_builtins(&registry, &config).unwrap();
        AppState {
            handler: Arc::new(ProtocolHandler::new(registry, &config)),
            config: config.transport.http,
        }
    }

    fn post(body: &str) -> actix_web::test::TestRequest {
        test::TestRequest::post()
            .uri("/mcp")
            .insert_header(header::ContentType::json())
            .set_payload(body.to_string())
    }

    const INITIALIZE: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"1"}}}"#;

    #[actix_web::test]
    async fn test_single_request() {
        let app = test::init_service(create_app(state())).await;
        let resp = test::call_service(&app, post(INITIALIZE).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    }

    #[actix_web::test]
    async fn test_parse_error_is_400() {
        let app = test::init_service(create_app(state())).await;
        let resp = test::call_service(&app, post("{oops").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], -32700);
        assert!(body["id"].is_null());
    }

    #[actix_web::test]
    async fn test_oversized_body_is_413_envelope() {
        let mut config = Config::default();
        config.transport.http.max_body_size = 64;
        let app = test::init_service(create_app(state_with(config))).await;

        let padded = format!(
            r#"{{"jsonrpc":"2.0","id":1,"method":"ping","params":{{"pad":"{}"}}}}"#,
            "x".repeat(200)
        );
        let resp = test::call_service(&app, post(&padded).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["error"]["code"], -32600);
        assert!(body["id"].is_null());

        let resp = test::call_service(
            &app,
            post(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_port_in_use_is_transport_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = HttpConfig {
            bind_address: "127.0.0.1".to_string(),
            port: taken.local_addr().unwrap().port(),
            ..HttpConfig::default()
        };
        let err = HttpTransport::new(config)
            .run(state().handler)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Transport(_)));
    }

    #[actix_web::test]
    async fn test_notification_is_204() {
        let app = test::init_service(create_app(state())).await;
        let resp = test::call_service(
            &app,
            post(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn test_batch_preserves_order_and_skips_notifications() {
        let app = test::init_service(create_app(state())).await;
        let batch = format!(
            r#"[{},{{"jsonrpc":"2.0","method":"notifications/initialized"}},{{"jsonrpc":"2.0","id":"b","method":"ping"}},{{"jsonrpc":"2.0","id":3,"method":"nope"}}]"#,
            INITIALIZE
        );
        let resp = test::call_service(&app, post(&batch).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["id"], 1);
        assert_eq!(items[1]["id"], "b");
        assert_eq!(items[2]["error"]["code"], -32601);
    }

    #[actix_web::test]
    async fn test_empty_batch_is_invalid_request() {
        let app = test::init_service(create_app(state())).await;
        let resp = test::call_service(&app, post("[]").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], -32600);
        assert!(body["id"].is_null());
    }

    #[actix_web::test]
    async fn test_session_is_shared_across_requests() {
        let app = test::init_service(create_app(state())).await;
        let list = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;

        let body: Value = test::call_and_read_body_json(&app, post(list).to_request()).await;
        assert_eq!(body["error"]["code"], -32000);

        test::call_service(&app, post(INITIALIZE).to_request()).await;

        let body: Value = test::call_and_read_body_json(&app, post(list).to_request()).await;
        assert!(!body["result"]["tools"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_health_and_not_found() {
        let app = test::init_service(create_app(state())).await;

        let health: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/health").to_request(),
        )
        .await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["initialized"], false);
        assert_eq!(health["server"]["name"], crate::SERVER_NAME);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/missing").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["availableEndpoints"][0], "POST /mcp");
    }
}
