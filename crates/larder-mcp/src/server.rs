// larder-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: MCP server transports for stdio and HTTP/SSE.
// Purpose: Bridge inbound connections to per-session protocol instances.
// Dependencies: larder-client, larder-config, axum, tokio
// ============================================================================

//! ## Overview
//! The server wires configuration, the upstream client, the tool registry,
//! and the enablement policy together, then serves the configured
//! transport. The stdio transport binds exactly one implicit session for
//! the process lifetime. The HTTP transport multiplexes independent
//! sessions: one-shot requests on `POST /mcp` (token in the
//! `Mcp-Session-Id` header), long-lived event channels on `GET /sse`, and
//! client messages on `POST /messages?sessionId=...`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::ACCEPT;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::routing::get;
use axum::routing::post;
use larder_client::StderrUpstreamAudit;
use larder_client::UpstreamClient;
use larder_config::LarderConfig;
use larder_config::ServerTransport;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::SERVER_NAME;
use crate::SERVER_VERSION;
use crate::audit::McpAuditEvent;
use crate::audit::McpAuditEventParams;
use crate::audit::McpAuditSink;
use crate::audit::StderrAuditSink;
use crate::enablement::EnablementPolicy;
use crate::protocol::CODE_INVALID_PARAMS;
use crate::protocol::CODE_INVALID_REQUEST;
use crate::protocol::HandledRequest;
use crate::protocol::JsonRpcResponse;
use crate::protocol::ServerContext;
use crate::registry::ToolRegistry;
use crate::resources::ResourceCatalog;
use crate::session::SessionMultiplexer;
use crate::tools;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Request/response header carrying the session token.
pub const SESSION_HEADER: &str = "mcp-session-id";
/// Path receiving client messages for SSE sessions.
pub const MESSAGES_PATH: &str = "/messages";
/// JSON-RPC error code for an unknown or expired session token.
pub const CODE_SESSION_EXPIRED: i64 = -32001;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: LarderConfig,
    /// Session multiplexer over the shared server context.
    multiplexer: Arc<SessionMultiplexer>,
    /// Audit sink for request events.
    audit: Arc<dyn McpAuditSink>,
}

impl McpServer {
    /// Builds a new MCP server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when validation or initialization fails;
    /// unknown tool names in the enablement policy are fatal here.
    pub fn from_config(config: LarderConfig) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let client = UpstreamClient::from_config_with_audit(
            &config.upstream,
            Arc::new(StderrUpstreamAudit),
        )
        .map_err(|err| McpServerError::Init(err.to_string()))?;
        let client = Arc::new(client);
        let registry = Arc::new(ToolRegistry::register(tools::modules(&client, &config.tools)));
        let policy = EnablementPolicy::from_config(&config.tools, &registry)
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        emit_startup_warnings(&config, &policy);
        let context = Arc::new(ServerContext {
            registry,
            policy: Arc::new(policy),
            resources: Arc::new(ResourceCatalog::default()),
        });
        Ok(Self {
            config,
            multiplexer: Arc::new(SessionMultiplexer::new(context)),
            audit: Arc::new(StderrAuditSink),
        })
    }

    /// Returns the session multiplexer (exposed for transport tests).
    #[must_use]
    pub fn multiplexer(&self) -> Arc<SessionMultiplexer> {
        Arc::clone(&self.multiplexer)
    }

    /// Serves requests using the configured transport.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the transport fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        match self.config.server.transport {
            ServerTransport::Stdio => {
                serve_stdio(&self.multiplexer, &self.audit, self.config.server.max_body_bytes)
                    .await
            }
            ServerTransport::Http => serve_http(self.config, self.multiplexer, self.audit).await,
        }
    }

    /// Builds the HTTP router (exposed for transport tests).
    #[must_use]
    pub fn http_router(&self) -> Router {
        http_router(
            Arc::clone(&self.multiplexer),
            Arc::clone(&self.audit),
            self.config.server.max_body_bytes,
        )
    }
}

/// Emits startup warnings for risky but valid configurations.
fn emit_startup_warnings(config: &LarderConfig, policy: &EnablementPolicy) {
    if config.upstream.api_key.is_none() {
        eprintln!("larder: WARNING: no upstream.api_key configured; upstream calls may fail");
    }
    if policy.enabled_count() == 0 {
        eprintln!("larder: WARNING: tools.enabled is empty; every tool call will be rejected");
    }
}

// ============================================================================
// SECTION: Stdio Transport
// ============================================================================

/// Serves the single implicit session over stdin/stdout.
async fn serve_stdio(
    multiplexer: &Arc<SessionMultiplexer>,
    audit: &Arc<dyn McpAuditSink>,
    max_body_bytes: usize,
) -> Result<(), McpServerError> {
    let entry = multiplexer.create_session();
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut writer = tokio::io::stdout();
    loop {
        let Some(bytes) = read_framed(&mut reader, max_body_bytes).await? else {
            return Ok(());
        };
        let handled = entry.protocol.handle_bytes(&bytes).await;
        let payload = serialize_response(&handled.response);
        record_audit(audit, "stdio", &handled, Some(&entry.token), bytes.len(), payload.len());
        write_framed(&mut writer, payload.as_bytes()).await?;
    }
}

/// Reads one framed message; `None` signals a clean end of stream.
async fn read_framed(
    reader: &mut BufReader<impl tokio::io::AsyncRead + Unpin>,
    max_body_bytes: usize,
) -> Result<Option<Vec<u8>>, McpServerError> {
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .await
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        if bytes == 0 {
            if saw_header {
                return Err(McpServerError::Transport("stdio closed mid-frame".to_string()));
            }
            return Ok(None);
        }
        saw_header = true;
        if line.trim().is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| McpServerError::Transport("invalid content length".to_string()))?;
            content_length = Some(parsed);
        }
    }
    let len = content_length
        .ok_or_else(|| McpServerError::Transport("missing content length".to_string()))?;
    if len > max_body_bytes {
        return Err(McpServerError::Transport("payload too large".to_string()));
    }
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
    Ok(Some(buf))
}

/// Writes one framed message and flushes.
async fn write_framed(
    writer: &mut (impl tokio::io::AsyncWrite + Unpin),
    payload: &[u8],
) -> Result<(), McpServerError> {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    writer
        .write_all(header.as_bytes())
        .await
        .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
    writer
        .write_all(payload)
        .await
        .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
    writer.flush().await.map_err(|_| McpServerError::Transport("stdio write failed".to_string()))
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Shared state for HTTP handlers.
struct HttpState {
    /// Session routing table.
    multiplexer: Arc<SessionMultiplexer>,
    /// Audit sink for request events.
    audit: Arc<dyn McpAuditSink>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

/// Query parameters for the message-post endpoint.
#[derive(Debug, Deserialize)]
struct MessageParams {
    /// Session token of the target event channel.
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Serves the HTTP transport until the listener fails.
async fn serve_http(
    config: LarderConfig,
    multiplexer: Arc<SessionMultiplexer>,
    audit: Arc<dyn McpAuditSink>,
) -> Result<(), McpServerError> {
    let addr =
        config.server.bind_addr().map_err(|err| McpServerError::Config(err.to_string()))?;
    let app = http_router(multiplexer, audit, config.server.max_body_bytes);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|_| McpServerError::Transport("http bind failed".to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|_| McpServerError::Transport("http server failed".to_string()))
}

/// Builds the HTTP router over shared state.
fn http_router(
    multiplexer: Arc<SessionMultiplexer>,
    audit: Arc<dyn McpAuditSink>,
    max_body_bytes: usize,
) -> Router {
    let state = Arc::new(HttpState {
        multiplexer,
        audit,
        max_body_bytes,
    });
    Router::new()
        .route("/", get(handle_health))
        .route("/mcp", post(handle_mcp))
        .route("/sse", get(handle_sse))
        .route(MESSAGES_PATH, post(handle_message))
        .with_state(state)
}

/// Handles the health/info endpoint.
async fn handle_health() -> Response {
    axum::Json(json!({
        "status": "ok",
        "service": SERVER_NAME,
        "version": SERVER_VERSION,
        "endpoints": { "mcp": "/mcp", "sse": "/sse", "messages": MESSAGES_PATH },
    }))
    .into_response()
}

/// Handles one-shot JSON-RPC requests on `POST /mcp`.
async fn handle_mcp(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    if bytes.len() > state.max_body_bytes {
        let response =
            JsonRpcResponse::failure(Value::Null, CODE_INVALID_REQUEST, "request body too large");
        return (StatusCode::PAYLOAD_TOO_LARGE, axum::Json(response)).into_response();
    }
    if !accept_is_satisfiable(&headers) {
        let response = JsonRpcResponse::failure(
            Value::Null,
            CODE_INVALID_REQUEST,
            "not acceptable: client must accept application/json or text/event-stream",
        );
        return (StatusCode::NOT_ACCEPTABLE, axum::Json(response)).into_response();
    }
    let token = headers.get(SESSION_HEADER).and_then(|value| value.to_str().ok());
    match token {
        Some(token) => match state.multiplexer.lookup(token) {
            Some(entry) => respond_on_session(&state, &entry, &bytes).await,
            None => {
                let response = JsonRpcResponse::failure(
                    request_id(&bytes),
                    CODE_SESSION_EXPIRED,
                    format!("invalid or expired session id: {token}; re-initialize"),
                );
                (StatusCode::BAD_REQUEST, axum::Json(response)).into_response()
            }
        },
        None => {
            if peek_method(&bytes).as_deref() != Some("initialize") {
                let response = JsonRpcResponse::failure(
                    request_id(&bytes),
                    CODE_INVALID_REQUEST,
                    "missing Mcp-Session-Id header; send initialize to start a session",
                );
                return (StatusCode::BAD_REQUEST, axum::Json(response)).into_response();
            }
            let entry = state.multiplexer.create_session();
            respond_on_session(&state, &entry, &bytes).await
        }
    }
}

/// Handles a request on an established session and replies inline.
async fn respond_on_session(
    state: &Arc<HttpState>,
    entry: &Arc<crate::session::SessionEntry>,
    bytes: &Bytes,
) -> Response {
    let handled = entry.protocol.handle_bytes(bytes).await;
    let payload = serialize_response(&handled.response);
    record_audit(
        &state.audit,
        "http",
        &handled,
        Some(&entry.token),
        bytes.len(),
        payload.len(),
    );
    let status = status_for(&handled.response);
    (
        status,
        [
            (SESSION_HEADER, entry.token.clone()),
            ("content-type", "application/json".to_string()),
        ],
        payload,
    )
        .into_response()
}

/// Opens a long-lived SSE event channel on `GET /sse`.
async fn handle_sse(State(state): State<Arc<HttpState>>) -> Response {
    let (entry, receiver) = state.multiplexer.create_channel_session();
    let token = entry.token.clone();
    // Deregister the session as soon as the client side of the channel
    // goes away; a dangling registration would block token reuse.
    if let Some(sender) = entry.channel_sender() {
        let multiplexer = Arc::clone(&state.multiplexer);
        let watched = token.clone();
        tokio::spawn(async move {
            sender.closed().await;
            let _ = multiplexer.remove(&watched);
        });
    }
    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{MESSAGES_PATH}?sessionId={token}"));
    let stream = tokio_stream::once(Ok::<Event, Infallible>(endpoint)).chain(
        ReceiverStream::new(receiver).map(|payload| Ok(Event::default().data(payload))),
    );
    let sse = Sse::new(stream).keep_alive(KeepAlive::default());
    ([(SESSION_HEADER, token)], sse).into_response()
}

/// Routes a client message into an SSE session on `POST /messages`.
async fn handle_message(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<MessageParams>,
    bytes: Bytes,
) -> Response {
    let Some(session_id) = params.session_id else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"error": "missing sessionId parameter", "status": 400})),
        )
            .into_response();
    };
    let Some(entry) = state.multiplexer.lookup(&session_id) else {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(json!({
                "error": format!("no active session found for session id: {session_id}"),
                "status": 404,
            })),
        )
            .into_response();
    };
    if !entry.has_channel() {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(json!({
                "error": format!("no active event channel for session id: {session_id}"),
                "status": 404,
            })),
        )
            .into_response();
    }
    let handled = entry.protocol.handle_bytes(&bytes).await;
    let payload = serialize_response(&handled.response);
    record_audit(&state.audit, "sse", &handled, Some(&entry.token), bytes.len(), payload.len());
    if entry.deliver(payload).await.is_err() {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(json!({
                "error": format!("event channel closed for session id: {session_id}"),
                "status": 404,
            })),
        )
            .into_response();
    }
    (StatusCode::ACCEPTED, axum::Json(json!({"accepted": true}))).into_response()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns whether the Accept header admits a supported content type.
fn accept_is_satisfiable(headers: &HeaderMap) -> bool {
    match headers.get(ACCEPT).and_then(|value| value.to_str().ok()) {
        None => true,
        Some(accept) => {
            accept.contains("application/json")
                || accept.contains("text/event-stream")
                || accept.contains("*/*")
        }
    }
}

/// Extracts the JSON-RPC method name without full request handling.
fn peek_method(bytes: &Bytes) -> Option<String> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    value.get("method").and_then(Value::as_str).map(ToString::to_string)
}

/// Extracts the JSON-RPC request id for transport-level error envelopes.
fn request_id(bytes: &Bytes) -> Value {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|value| value.get("id").cloned())
        .unwrap_or(Value::Null)
}

/// Serializes a response, falling back to a static error envelope.
fn serialize_response(response: &JsonRpcResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| {
        "{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32603,\"message\":\"serialization \
         failed\"}}"
            .to_string()
    })
}

/// Maps a JSON-RPC error code to the HTTP status for one-shot responses.
fn status_for(response: &JsonRpcResponse) -> StatusCode {
    match response.error_code() {
        Some(
            CODE_INVALID_REQUEST
            | crate::protocol::CODE_METHOD_NOT_FOUND
            | CODE_INVALID_PARAMS
            | crate::protocol::CODE_NOT_INITIALIZED,
        ) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}

/// Emits one audit event for a handled request.
fn record_audit(
    audit: &Arc<dyn McpAuditSink>,
    transport: &'static str,
    handled: &HandledRequest,
    session: Option<&str>,
    request_bytes: usize,
    response_bytes: usize,
) {
    audit.record(&McpAuditEvent::new(McpAuditEventParams {
        transport,
        method: handled.method,
        tool: handled.tool.clone(),
        outcome: handled.outcome(),
        error_code: handled.response.error_code(),
        session: session.map(ToString::to_string),
        request_bytes,
        response_bytes,
    }));
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions."
    )]

    use axum::http::HeaderMap;
    use axum::http::HeaderValue;
    use axum::http::StatusCode;
    use axum::http::header::ACCEPT;
    use serde_json::Value;

    use super::accept_is_satisfiable;
    use super::peek_method;
    use super::read_framed;
    use super::status_for;
    use super::write_framed;
    use crate::protocol::CODE_INVALID_PARAMS;
    use crate::protocol::CODE_NOT_FOUND;
    use crate::protocol::JsonRpcResponse;

    #[test]
    fn accept_admits_json_and_event_stream() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        assert!(accept_is_satisfiable(&headers));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        assert!(accept_is_satisfiable(&headers));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        assert!(accept_is_satisfiable(&headers));
    }

    #[test]
    fn accept_rejects_foreign_types_only() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html"));
        assert!(!accept_is_satisfiable(&headers));
        let empty = HeaderMap::new();
        assert!(accept_is_satisfiable(&empty));
    }

    #[test]
    fn peek_method_reads_the_method_field() {
        let bytes = axum::body::Bytes::from_static(
            br#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
        );
        assert_eq!(peek_method(&bytes).as_deref(), Some("initialize"));
        let garbage = axum::body::Bytes::from_static(b"nope");
        assert!(peek_method(&garbage).is_none());
    }

    #[test]
    fn protocol_errors_map_to_bad_request() {
        let failure = JsonRpcResponse::failure(Value::Null, CODE_INVALID_PARAMS, "bad");
        assert_eq!(status_for(&failure), StatusCode::BAD_REQUEST);
        let not_found = JsonRpcResponse::failure(Value::Null, CODE_NOT_FOUND, "missing");
        assert_eq!(status_for(&not_found), StatusCode::OK);
        let ok = JsonRpcResponse::success(Value::Null, Value::Null);
        assert_eq!(status_for(&ok), StatusCode::OK);
    }

    #[tokio::test]
    async fn read_framed_round_trips_a_written_frame() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let mut cursor = std::io::Cursor::new(Vec::new());
        write_framed(&mut cursor, payload).await.expect("frame writes");
        let mut reader = tokio::io::BufReader::new(std::io::Cursor::new(cursor.into_inner()));
        let read = read_framed(&mut reader, 1024).await.expect("frame reads");
        assert_eq!(read.as_deref(), Some(payload.as_slice()));
    }

    #[tokio::test]
    async fn read_framed_rejects_payload_over_limit() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let mut cursor = std::io::Cursor::new(Vec::new());
        write_framed(&mut cursor, payload).await.expect("frame writes");
        let mut reader = tokio::io::BufReader::new(std::io::Cursor::new(cursor.into_inner()));
        assert!(read_framed(&mut reader, payload.len() - 1).await.is_err());
    }

    #[tokio::test]
    async fn read_framed_signals_clean_end_of_stream() {
        let mut reader = tokio::io::BufReader::new(std::io::Cursor::new(Vec::new()));
        let read = read_framed(&mut reader, 1024).await.expect("eof is clean");
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn read_framed_requires_content_length() {
        let framed = b"X-Other: 1\r\n\r\n{}".to_vec();
        let mut reader = tokio::io::BufReader::new(std::io::Cursor::new(framed));
        assert!(read_framed(&mut reader, 1024).await.is_err());
    }
}
