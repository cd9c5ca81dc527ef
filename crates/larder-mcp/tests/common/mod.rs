// larder-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for MCP integration tests.
// Purpose: Provide mock upstreams and assembled sessions for tests.
// Dependencies: larder-client, larder-config, larder-mcp, tiny_http
// ============================================================================

//! ## Overview
//! Fixtures for driving the assembled catalogue end to end: a `tiny_http`
//! mock upstream with fixed responses, configuration builders, and
//! protocol sessions wired over the real registry and policy.

#![allow(dead_code, reason = "Shared test helpers may be unused in some suites.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use larder_client::UpstreamClient;
use larder_config::LarderConfig;
use larder_config::ServerConfig;
use larder_config::ServerTransport;
use larder_config::ToolPolicyConfig;
use larder_config::UpstreamConfig;
use larder_mcp::EnablementPolicy;
use larder_mcp::ProtocolSession;
use larder_mcp::ResourceCatalog;
use larder_mcp::ServerContext;
use larder_mcp::ToolRegistry;
use larder_mcp::protocol::JsonRpcRequest;
use larder_mcp::tools;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Mock Upstream
// ============================================================================

/// Spawns a mock upstream answering every request with a fixed response.
///
/// The serving thread runs until the test process exits.
pub fn spawn_fixed_upstream(status: u16, body: &'static str) -> String {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("mock upstream binds");
    let addr = server.server_addr().to_ip().expect("mock upstream addr");
    thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = tiny_http::Response::from_string(body)
                .with_status_code(tiny_http::StatusCode(status));
            let _ = request.respond(response);
        }
    });
    format!("http://{addr}")
}

/// Spawns a mock upstream that stalls past any reasonable client timeout.
pub fn spawn_stalling_upstream(delay: Duration) -> String {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("mock upstream binds");
    let addr = server.server_addr().to_ip().expect("mock upstream addr");
    thread::spawn(move || {
        for request in server.incoming_requests() {
            thread::sleep(delay);
            let _ = request.respond(tiny_http::Response::from_string("late"));
        }
    });
    format!("http://{addr}")
}

// ============================================================================
// SECTION: Config Builders
// ============================================================================

/// Builds an upstream config pointed at a base URL.
pub fn upstream_config(base_url: String, timeout_ms: u64) -> UpstreamConfig {
    UpstreamConfig {
        base_url,
        api_key: Some("test-key".to_string()),
        verify_tls: true,
        timeout_ms,
        headers: BTreeMap::new(),
    }
}

/// Builds a tool policy enabling the given names.
pub fn policy_config(enabled: &[&str]) -> ToolPolicyConfig {
    ToolPolicyConfig {
        enabled: enabled.iter().map(ToString::to_string).collect(),
        options: BTreeMap::new(),
    }
}

/// Builds a full server config for the HTTP transport.
pub fn http_config(base_url: String, enabled: &[&str]) -> LarderConfig {
    LarderConfig {
        server: ServerConfig {
            transport: ServerTransport::Http,
            bind: Some("127.0.0.1:0".to_string()),
            max_body_bytes: 1024 * 1024,
        },
        upstream: upstream_config(base_url, 5000),
        tools: policy_config(enabled),
    }
}

// ============================================================================
// SECTION: Session Builders
// ============================================================================

/// Builds a protocol session over the real catalogue and an upstream URL.
pub fn session_over(base_url: String, timeout_ms: u64, enabled: &[&str]) -> ProtocolSession {
    let client = Arc::new(
        UpstreamClient::from_config(&upstream_config(base_url, timeout_ms))
            .expect("client builds"),
    );
    let policy_config = policy_config(enabled);
    let registry = Arc::new(ToolRegistry::register(tools::modules(&client, &policy_config)));
    let policy = Arc::new(
        EnablementPolicy::from_config(&policy_config, &registry).expect("policy builds"),
    );
    ProtocolSession::new(Arc::new(ServerContext {
        registry,
        policy,
        resources: Arc::new(ResourceCatalog::default()),
    }))
}

/// Builds a JSON-RPC request value.
pub fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
    serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    }))
    .expect("request parses")
}

/// Initializes a session, asserting success.
pub async fn initialize(session: &ProtocolSession) {
    let handled = session.handle(request(0, "initialize", json!({}))).await;
    assert!(handled.response.error.is_none(), "initialize failed");
}

/// Extracts the text body of the first content block of a tool result.
pub fn result_text(result: &Value) -> String {
    result["content"][0]["text"].as_str().unwrap_or_default().to_string()
}
