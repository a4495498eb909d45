//! STDIO transport implementation for MCP server.
//!
//! One JSON-RPC message per line in each direction. Requests are handled
//! concurrently, so responses may be written in a different order than the
//! requests arrived; each is written whole and correlated by id. stdout
//! carries protocol traffic only.

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::config::{StdioConfig, TransportType};
use crate::error::{McpError, Result};
use crate::protocol::codec::Rejection;
use crate::protocol::{serialize_message, JsonRpcNotification, ProtocolHandler};
use crate::transport::{shutdown_signal, Transport, TransportInfo};
use crate::utils::truncate_for_log;

/// Outbound lines buffered ahead of the writer
const OUTBOUND_CAPACITY: usize = 256;

const LOG_PREVIEW_CHARS: usize = 512;

/// STDIO transport implementation
pub struct StdioTransport {
    config: StdioConfig,
}

impl StdioTransport {
    /// Create a new STDIO transport
    pub fn new(config: StdioConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn run(&self, handler: Arc<ProtocolHandler>) -> Result<()> {
        info!("Starting STDIO transport");
        serve(
            tokio::io::stdin(),
            tokio::io::stdout(),
            handler,
            self.config.max_line_length,
            shutdown_signal(),
        )
        .await?;
        info!("STDIO transport stopped");
        Ok(())
    }

    fn info(&self) -> TransportInfo {
        TransportInfo {
            transport_type: TransportType::Stdio,
            address: "stdio".to_string(),
            max_message_size: Some(self.config.max_line_length),
        }
    }
}

/// A decoded input line, or the reason it was unusable
#[derive(Debug, PartialEq)]
enum Frame {
    Line(String),
    Malformed(String),
}

/// [`LinesCodec`] that reports oversized and non-UTF-8 lines as frames
/// instead of failing the stream
struct FrameCodec {
    lines: LinesCodec,
}

impl FrameCodec {
    fn new(max_line_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_line_length),
        }
    }

    fn classify(result: std::result::Result<Option<String>, LinesCodecError>) -> Option<Frame> {
        match result {
            Ok(line) => line.map(Frame::Line),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Some(Frame::Malformed("Line exceeds maximum length".to_string()))
            }
            // The codec only fails on its own for undecodable bytes; the line is already consumed
            Err(LinesCodecError::Io(e)) => Some(Frame::Malformed(e.to_string())),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> std::io::Result<Option<Frame>> {
        Ok(Self::classify(self.lines.decode(buf)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> std::io::Result<Option<Frame>> {
        Ok(Self::classify(self.lines.decode_eof(buf)))
    }
}

/// Serve newline-delimited JSON-RPC over `reader`/`writer` until EOF or
/// `shutdown` resolves. After EOF, in-flight requests finish and their
/// responses are written; after `shutdown`, they are abandoned.
pub async fn serve<R, W, F>(
    reader: R,
    writer: W,
    handler: Arc<ProtocolHandler>,
    max_line_length: usize,
    shutdown: F,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    F: Future<Output = ()>,
{
    let (outbound, outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let writer_task = tokio::spawn(write_lines(writer, outbound_rx));
    let relay_task = spawn_relay(handler.clone(), outbound.clone());

    let mut frames = FramedRead::new(reader, FrameCodec::new(max_line_length));
    let mut in_flight = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("STDIO transport received shutdown signal");
                if !in_flight.is_empty() {
                    warn!("Abandoning {} in-flight requests", in_flight.len());
                }
                in_flight.abort_all();
                break;
            }

            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!("Request task failed: {}", e);
                }
            }

            frame = frames.next() => match frame {
                Some(Ok(Frame::Line(line))) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    debug!("Received message from stdin: {}", truncate_for_log(&line, LOG_PREVIEW_CHARS));

                    let handler = handler.clone();
                    let outbound = outbound.clone();
                    in_flight.spawn(async move {
                        if let Some(response) = handler.handle_raw(&line).await {
                            send_message(&outbound, &response).await;
                        }
                    });
                }
                Some(Ok(Frame::Malformed(reason))) => {
                    warn!("Rejected stdin line: {}", reason);
                    send_message(&outbound, &Rejection::parse_error(reason).into_response()).await;
                }
                Some(Err(e)) => {
                    error!("Error reading from stdin: {}", e);
                    break;
                }
                None => {
                    info!("EOF reached on stdin");
                    break;
                }
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        match joined {
            Err(e) if !e.is_cancelled() => error!("Request task failed: {}", e),
            _ => {}
        }
    }

    relay_task.abort();
    let _ = relay_task.await;
    drop(outbound);

    writer_task
        .await
        .map_err(|e| McpError::Transport(format!("stdout writer task failed: {}", e)))?
}

async fn write_lines<W>(mut writer: W, mut lines: mpsc::Receiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        debug!("Sent message to stdout: {}", truncate_for_log(&line, LOG_PREVIEW_CHARS));
    }
    Ok(())
}

async fn send_message<T: serde::Serialize>(outbound: &mpsc::Sender<String>, message: &T) {
    match serialize_message(message) {
        Ok(line) => {
            if outbound.send(line).await.is_err() {
                warn!("stdout writer is gone; dropping message");
            }
        }
        Err(e) => error!("Failed to serialize message: {}", e),
    }
}

/// Forward list-changed events and client log messages once initialized
fn spawn_relay(handler: Arc<ProtocolHandler>, outbound: mpsc::Sender<String>) -> JoinHandle<()> {
    let mut events = handler.registry().subscribe();
    let mut logs = handler.logging().subscribe();

    tokio::spawn(async move {
        loop {
            let notification = tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        if !event.is_advertised(handler.capabilities()) {
                            continue;
                        }
                        JsonRpcNotification::new(event.method(), None)
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Dropped {} list-changed events", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                message = logs.recv() => match message {
                    Ok(message) => match serde_json::to_value(&message) {
                        Ok(params) => JsonRpcNotification::new("notifications/message", Some(params)),
                        Err(e) => {
                            error!("Failed to encode log message: {}", e);
                            continue;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Dropped {} client log messages", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            if handler.is_initialized() {
                send_message(&outbound, &notification).await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::providers::register_builtins;
    use crate::server::features::CapabilityRegistry;
    use crate::protocol::MethodHandler;
    use serde_json::{json, Value};
    use tokio::io::AsyncReadExt;

    fn handler() -> Arc<ProtocolHandler> {
        let config = Config::default();
        let registry = Arc::new(CapabilityRegistry::new());
        register_builtins(&registry, &config).unwrap();
        Arc::new(ProtocolHandler::new(registry, &config))
    }

    async fn run_lines(input: &str, max_line_length: usize) -> Vec<Value> {
        let (mut client, server) = tokio::io::duplex(1 << 20);
        serve(
            input.as_bytes(),
            server,
            handler(),
            max_line_length,
            std::future::pending(),
        )
        .await
        .unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn by_id(responses: &[Value], id: i64) -> &Value {
        responses.iter().find(|r| r["id"] == json!(id)).unwrap()
    }

    #[test]
    fn test_frame_codec_recovers_after_bad_lines() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::from(&b"0123456789\n\xff\xfe\nok\n"[..]);

        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(Frame::Malformed(_))));
        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(Frame::Malformed(_))));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Line("ok".into())));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_over_lines() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","capabilities":{},"clientInfo":{"name":"t","version":"1"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n",
        );

        let responses = run_lines(input, 1 << 20).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(by_id(&responses, 1)["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(by_id(&responses, 2)["result"], json!({}));
    }

    #[tokio::test]
    async fn test_parse_error_keeps_connection_open() {
        let input = "{not json\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\n";
        let responses = run_lines(input, 1 << 20).await;

        assert_eq!(responses.len(), 2);
        let parse_error = responses.iter().find(|r| r["id"].is_null()).unwrap();
        assert_eq!(parse_error["error"]["code"], -32700);
        assert_eq!(by_id(&responses, 7)["result"], json!({}));
    }

    #[tokio::test]
    async fn test_overlong_line_is_parse_error() {
        let long = format!("{{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"{}\"}}\n", "x".repeat(100));
        let input = format!("{}{}", long, "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");
        let responses = run_lines(&input, 64).await;

        assert_eq!(responses.len(), 2);
        assert!(responses.iter().any(|r| r["error"]["code"] == -32700 && r["id"].is_null()));
        assert_eq!(by_id(&responses, 2)["result"], json!({}));
    }

    struct Stall;

    #[async_trait]
    impl MethodHandler for Stall {
        async fn handle(&self, _params: Option<Value>) -> Result<Value> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_shutdown_abandons_stalled_requests() {
        let mut config = Config::default();
        config.server.require_initialization = false;
        let registry = Arc::new(CapabilityRegistry::new());
        let handler = Arc::new(ProtocolHandler::new(registry, &config));
        handler.register_method("stall", Arc::new(Stall));

        let (mut client_in, server_in) = tokio::io::duplex(1 << 16);
        let (server_out, mut client_out) = tokio::io::duplex(1 << 16);
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(serve(server_in, server_out, handler, 1 << 20, async move {
            let _ = stopped.await;
        }));

        client_in
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"stall\"}\n")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        stop.send(()).unwrap();

        let finished = tokio::time::timeout(std::time::Duration::from_secs(3), task)
            .await
            .expect("serve did not return after shutdown");
        finished.unwrap().unwrap();

        let mut output = String::new();
        client_out.read_to_string(&mut output).await.unwrap();
        assert!(output.is_empty());
        drop(client_in);
    }

    #[tokio::test]
    async fn test_notifications_produce_no_output() {
        let input = "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/cancelled\"}\n";
        assert!(run_lines(input, 1 << 20).await.is_empty());
    }
}
