// larder-mcp/tests/tool_dispatch.rs
// ============================================================================
// Module: Tool Dispatch Tests
// Description: End-to-end dispatch tests over the assembled catalogue.
// Purpose: Ensure tool calls, policy gating, and upstream failures behave.
// Dependencies: larder-mcp, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Drives the real registry and enablement policy through a protocol
//! session against mock upstreams: success shaping, fail-fast argument
//! validation, policy rejections, and the upstream failure taxonomy.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use larder_client::UpstreamClient;
use larder_mcp::ToolRegistry;
use larder_mcp::protocol::CODE_INVALID_PARAMS;
use larder_mcp::protocol::CODE_INVALID_REQUEST;
use larder_mcp::protocol::CODE_METHOD_NOT_FOUND;
use larder_mcp::tools;
use serde_json::json;

use crate::common::initialize;
use crate::common::policy_config;
use crate::common::request;
use crate::common::result_text;
use crate::common::session_over;
use crate::common::spawn_fixed_upstream;
use crate::common::spawn_stalling_upstream;
use crate::common::upstream_config;

/// Every definition in the assembled catalogue has exactly one handler.
#[test]
fn assembled_catalogue_is_one_to_one() {
    let client = Arc::new(
        UpstreamClient::from_config(&upstream_config("http://localhost:9283".to_string(), 5000))
            .expect("client builds"),
    );
    let registry =
        ToolRegistry::register(tools::modules(&client, &policy_config(&["get_products"])));
    let names = registry.tool_names();
    assert_eq!(names.len(), registry.definitions().len());
    for name in &names {
        assert!(registry.has_handler(name), "missing handler for {name}");
    }
    // Expected full catalogue size across all six modules.
    assert_eq!(names.len(), 11 + 4 + 8 + 4 + 4 + 12);
}

/// get_products against a 200 JSON array yields pretty-printed text.
#[tokio::test]
async fn get_products_shapes_success() {
    let base = spawn_fixed_upstream(200, r#"[{"id":1,"name":"Milk","location_id":3}]"#);
    let session = session_over(base, 5000, &["get_products"]);
    initialize(&session).await;
    let handled = session
        .handle(request(
            1,
            "tools/call",
            json!({"name": "get_products", "arguments": {"fields": ["id", "name"]}}),
        ))
        .await;
    let result = handled.response.result.expect("tool result");
    assert!(result.get("isError").is_none());
    let text = result_text(&result);
    assert!(text.contains("\"name\": \"Milk\""));
    assert!(!text.contains("location_id"), "projection should drop unrequested fields");
}

/// purchase_product without productId fails before any upstream call.
#[tokio::test]
async fn purchase_product_rejects_missing_product_id() {
    // Unreachable upstream: if the handler issued a call, the result would
    // be an upstream failure, not invalid params.
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("listener binds");
        format!("http://{}", listener.local_addr().expect("listener addr"))
    };
    let session = session_over(closed, 2000, &["purchase_product"]);
    initialize(&session).await;
    let handled = session
        .handle(request(1, "tools/call", json!({"name": "purchase_product", "arguments": {}})))
        .await;
    assert_eq!(handled.response.error_code(), Some(CODE_INVALID_PARAMS));
    let message = handled.response.error.expect("error payload").message;
    assert!(message.contains("productId"));
}

/// A disabled tool is rejected by call and absent from the listing.
#[tokio::test]
async fn disabled_tool_is_rejected_and_unlisted() {
    let base = spawn_fixed_upstream(200, "[]");
    let session = session_over(base, 5000, &["get_products"]);
    initialize(&session).await;

    let call = session
        .handle(request(1, "tools/call", json!({"name": "get_all_stock", "arguments": {}})))
        .await;
    assert_eq!(call.response.error_code(), Some(CODE_INVALID_REQUEST));
    let message = call.response.error.expect("error payload").message;
    assert!(message.contains("get_all_stock"));

    let listed = session.handle(request(2, "tools/list", json!({}))).await;
    let tools = listed.response.result.expect("tools result");
    let names: Vec<&str> = tools["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert_eq!(names, vec!["get_products"]);
}

/// A name outside the registry maps to method-not-found.
#[tokio::test]
async fn unknown_tool_is_method_not_found() {
    let base = spawn_fixed_upstream(200, "[]");
    let session = session_over(base, 5000, &["get_products"]);
    initialize(&session).await;
    let handled = session
        .handle(request(1, "tools/call", json!({"name": "get_everything", "arguments": {}})))
        .await;
    assert_eq!(handled.response.error_code(), Some(CODE_METHOD_NOT_FOUND));
}

/// An upstream timeout becomes an isError result, not a protocol fault.
#[tokio::test]
async fn upstream_timeout_degrades_to_error_result() {
    let base = spawn_stalling_upstream(Duration::from_secs(10));
    let session = session_over(base, 500, &["get_all_stock"]);
    initialize(&session).await;
    let handled = session
        .handle(request(1, "tools/call", json!({"name": "get_all_stock", "arguments": {}})))
        .await;
    let result = handled.response.result.expect("tool result delivered despite failure");
    assert_eq!(result["isError"], true);
    assert!(result_text(&result).contains("timeout"));
}

/// An upstream HTTP 500 becomes an isError result carrying the status.
#[tokio::test]
async fn upstream_status_error_degrades_to_error_result() {
    let base = spawn_fixed_upstream(500, r#"{"error_message":"database locked"}"#);
    let session = session_over(base, 5000, &["get_shopping_list"]);
    initialize(&session).await;
    let handled = session
        .handle(request(1, "tools/call", json!({"name": "get_shopping_list", "arguments": {}})))
        .await;
    let result = handled.response.result.expect("tool result delivered despite failure");
    assert_eq!(result["isError"], true);
    let text = result_text(&result);
    assert!(text.contains("500"));
    assert!(text.contains("database locked"));
}

/// Listing is idempotent across calls with no configuration change.
#[tokio::test]
async fn tools_list_is_idempotent() {
    let base = spawn_fixed_upstream(200, "[]");
    let session = session_over(base, 5000, &["get_products", "get_shopping_list"]);
    initialize(&session).await;
    let first = session.handle(request(1, "tools/list", json!({}))).await;
    let second = session.handle(request(2, "tools/list", json!({}))).await;
    assert_eq!(first.response.result, second.response.result);
}
