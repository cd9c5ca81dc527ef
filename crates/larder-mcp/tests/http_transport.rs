// larder-mcp/tests/http_transport.rs
// ============================================================================
// Module: HTTP Transport Tests
// Description: Session lifecycle tests against a live HTTP listener.
// Purpose: Ensure header routing, content negotiation, and SSE channels.
// Dependencies: larder-mcp, reqwest, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Boots the real router on an ephemeral port and drives it with a plain
//! HTTP client: session minting on initialize, token routing, 406/400/404
//! paths, and the SSE channel round trip (endpoint event, message post,
//! response delivery, deregistration on disconnect).

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use larder_mcp::McpServer;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;

use crate::common::http_config;
use crate::common::spawn_fixed_upstream;

/// Session header used by the HTTP transport.
const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Boots the HTTP router on an ephemeral port.
async fn spawn_server(enabled: &[&str]) -> SocketAddr {
    let upstream = spawn_fixed_upstream(200, "[]");
    let server = McpServer::from_config(http_config(upstream, enabled)).expect("server builds");
    let router = server.http_router();
    let listener =
        tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("listener binds");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Builds an initialize request body.
fn initialize_body() -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})
}

#[tokio::test]
async fn health_endpoint_reports_service_info() {
    let addr = spawn_server(&["get_products"]).await;
    let response = reqwest::get(format!("http://{addr}/")).await.expect("health responds");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("health body");
    assert_eq!(body["service"], "larder");
    assert_eq!(body["endpoints"]["mcp"], "/mcp");
}

#[tokio::test]
async fn initialize_mints_a_session_token() {
    let addr = spawn_server(&["get_products"]).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/mcp"))
        .header("Accept", "application/json")
        .json(&initialize_body())
        .send()
        .await
        .expect("initialize responds");
    assert_eq!(response.status(), 200);
    let token = response
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .expect("session header present")
        .to_string();
    assert_eq!(token.len(), 32);

    // The token routes subsequent requests to the same (initialized) session.
    let listed = client
        .post(format!("http://{addr}/mcp"))
        .header("Accept", "application/json")
        .header(SESSION_HEADER, &token)
        .json(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
        .send()
        .await
        .expect("tools/list responds");
    assert_eq!(listed.status(), 200);
    let body: Value = listed.json().await.expect("tools body");
    assert_eq!(body["result"]["tools"][0]["name"], "get_products");
}

#[tokio::test]
async fn non_initialize_without_token_is_rejected() {
    let addr = spawn_server(&["get_products"]).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/mcp"))
        .header("Accept", "application/json")
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .send()
        .await
        .expect("request responds");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("error body");
    assert!(body["error"]["message"].as_str().unwrap_or_default().contains("Mcp-Session-Id"));
}

#[tokio::test]
async fn unknown_session_token_is_rejected_with_reinitialize_hint() {
    let addr = spawn_server(&["get_products"]).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/mcp"))
        .header("Accept", "application/json")
        .header(SESSION_HEADER, "00000000000000000000000000000000")
        .json(&initialize_body())
        .send()
        .await
        .expect("request responds");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("error body");
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(message.contains("expired"));
    assert!(message.contains("re-initialize"));
}

#[tokio::test]
async fn unacceptable_accept_header_is_406() {
    let addr = spawn_server(&["get_products"]).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/mcp"))
        .header("Accept", "text/html")
        .json(&initialize_body())
        .send()
        .await
        .expect("request responds");
    assert_eq!(response.status(), 406);
}

#[tokio::test]
async fn message_post_without_session_id_is_400() {
    let addr = spawn_server(&["get_products"]).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/messages"))
        .json(&initialize_body())
        .send()
        .await
        .expect("request responds");
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn message_post_to_unregistered_session_is_404_naming_the_id() {
    let addr = spawn_server(&["get_products"]).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/messages?sessionId=deadbeefdeadbeefdeadbeefdeadbeef"))
        .json(&initialize_body())
        .send()
        .await
        .expect("request responds");
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("error body");
    assert!(
        body["error"].as_str().unwrap_or_default().contains("deadbeefdeadbeefdeadbeefdeadbeef")
    );
}

#[tokio::test]
async fn sse_channel_round_trip_delivers_responses() {
    let addr = spawn_server(&["get_products"]).await;

    // Open the SSE channel with a raw socket so we can keep reading events.
    let mut stream =
        tokio::net::TcpStream::connect(addr).await.expect("sse connection opens");
    stream
        .write_all(
            b"GET /sse HTTP/1.1\r\nHost: larder\r\nAccept: text/event-stream\r\n\r\n",
        )
        .await
        .expect("sse request writes");

    // Read until the endpoint event advertises the full message URL; the
    // token is the 32 hex chars after sessionId=.
    let token = read_extract(&mut stream, |collected| {
        collected
            .split("sessionId=")
            .nth(1)
            .and_then(|rest| rest.get(..32))
            .map(ToString::to_string)
    })
    .await;

    // Post an initialize message against the channel's session.
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/messages?sessionId={token}"))
        .json(&initialize_body())
        .send()
        .await
        .expect("message posts");
    assert_eq!(response.status(), 202);

    // The JSON-RPC response arrives on the SSE channel, not the POST.
    let delivered = read_until(&mut stream, "protocolVersion").await;
    assert!(delivered.contains("serverInfo"));

    // Dropping the connection deregisters the session.
    drop(stream);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let gone = client
        .post(format!("http://{addr}/messages?sessionId={token}"))
        .json(&initialize_body())
        .send()
        .await
        .expect("message posts");
    assert_eq!(gone.status(), 404);
}

/// Reads from the stream until the marker appears or a timeout elapses.
async fn read_until(stream: &mut tokio::net::TcpStream, marker: &str) -> String {
    let owned = marker.to_string();
    read_extract(stream, move |collected| {
        collected.contains(&owned).then(|| collected.to_string())
    })
    .await
}

/// Reads from the stream until the extractor yields, or panics on timeout.
async fn read_extract<T>(
    stream: &mut tokio::net::TcpStream,
    extract: impl Fn(&str) -> Option<T>,
) -> T {
    let mut collected = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut buf = [0u8; 1024];
    loop {
        if let Some(found) = extract(&collected) {
            return found;
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        assert!(!remaining.is_zero(), "timed out waiting for stream data; got: {collected}");
        let read = tokio::time::timeout(remaining, stream.read(&mut buf))
            .await
            .expect("stream read within deadline")
            .expect("stream read succeeds");
        assert!(read > 0, "stream closed early; got: {collected}");
        collected.push_str(&String::from_utf8_lossy(&buf[..read]));
    }
}
