// larder-mcp/src/protocol.rs
// ============================================================================
// Module: Protocol Server Core
// Description: JSON-RPC 2.0 state machine for one MCP session.
// Purpose: Pair each method invocation with a handler and serialize replies.
// Dependencies: larder-client, serde, serde_json
// ============================================================================

//! ## Overview
//! One [`ProtocolSession`] exists per logical client session. It owns the
//! `uninitialized -> initialized -> closed` state machine and dispatches the
//! five wire methods: `initialize`, `tools/list`, `tools/call`,
//! `resources/list`, `resources/read`. The registry, enablement policy, and
//! resource catalog are shared read-only through [`ServerContext`].
//!
//! ## Invariants
//! - A request before `initialize` (other than `initialize` itself) is
//!   rejected with a not-initialized error, never undefined behavior.
//! - One malformed call degrades to an error response; the session is never
//!   torn down by a bad request.
//! - Upstream failures arrive as failure-shaped tool results from handlers
//!   and pass through as protocol-level successes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::SERVER_NAME;
use crate::SERVER_VERSION;
use crate::audit::McpMethod;
use crate::audit::McpOutcome;
use crate::enablement::EnablementPolicy;
use crate::registry::ToolError;
use crate::registry::ToolRegistry;
use crate::resources::ResourceCatalog;
use crate::resources::ResourceError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol version answered when the client does not request one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error code: invalid request (includes policy violations).
pub const CODE_INVALID_REQUEST: i64 = -32600;
/// JSON-RPC error code: method or tool not found.
pub const CODE_METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC error code: invalid parameters.
pub const CODE_INVALID_PARAMS: i64 = -32602;
/// JSON-RPC error code: internal error.
pub const CODE_INTERNAL_ERROR: i64 = -32603;
/// JSON-RPC error code: request received before initialize.
pub const CODE_NOT_INITIALIZED: i64 = -32002;
/// JSON-RPC error code: resource not found.
pub const CODE_NOT_FOUND: i64 = -32004;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier echoed in the response.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Optional parameters payload.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    pub jsonrpc: &'static str,
    /// Request identifier.
    pub id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub const fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Returns the error code when this response is a failure.
    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|err| err.code)
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
}

/// Tool call parameters for `tools/call`.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// Resource read parameters for `resources/read`.
#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    /// Resource URI.
    uri: String,
}

/// Initialize parameters (all optional).
#[derive(Debug, Default, Deserialize)]
struct InitializeParams {
    /// Protocol version requested by the client.
    #[serde(rename = "protocolVersion")]
    protocol_version: Option<String>,
}

// ============================================================================
// SECTION: Shared Context
// ============================================================================

/// Read-only server state shared by every session.
pub struct ServerContext {
    /// Tool registry for the full catalogue.
    pub registry: Arc<ToolRegistry>,
    /// Enablement policy for this server instance.
    pub policy: Arc<EnablementPolicy>,
    /// Embedded documentation resources.
    pub resources: Arc<ResourceCatalog>,
}

// ============================================================================
// SECTION: Session State Machine
// ============================================================================

/// Lifecycle states for a protocol session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProtocolState {
    /// No initialize request handled yet.
    Uninitialized,
    /// Initialize completed; all methods available.
    Initialized,
    /// Session closed; no further requests are served.
    Closed,
}

/// Outcome of handling one request, with audit metadata.
pub struct HandledRequest {
    /// Serialized JSON-RPC response.
    pub response: JsonRpcResponse,
    /// Method classification for audit events.
    pub method: McpMethod,
    /// Tool name when the request was a tool call.
    pub tool: Option<String>,
}

impl HandledRequest {
    /// Returns the outcome classification for audit events.
    #[must_use]
    pub fn outcome(&self) -> McpOutcome {
        if self.response.error.is_some() { McpOutcome::Error } else { McpOutcome::Ok }
    }
}

/// Per-session instance of the protocol server core.
pub struct ProtocolSession {
    /// Shared read-only server state.
    context: Arc<ServerContext>,
    /// Session lifecycle state.
    state: Mutex<ProtocolState>,
}

impl ProtocolSession {
    /// Creates a fresh, uninitialized session over shared state.
    #[must_use]
    pub fn new(context: Arc<ServerContext>) -> Self {
        Self {
            context,
            state: Mutex::new(ProtocolState::Uninitialized),
        }
    }

    /// Returns whether the session has completed initialization.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().map(|state| *state == ProtocolState::Initialized).unwrap_or(false)
    }

    /// Marks the session closed; subsequent requests are rejected.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = ProtocolState::Closed;
        }
    }

    /// Parses raw bytes and handles the request.
    pub async fn handle_bytes(&self, bytes: &[u8]) -> HandledRequest {
        match serde_json::from_slice::<JsonRpcRequest>(bytes) {
            Ok(request) => self.handle(request).await,
            Err(_) => HandledRequest {
                response: JsonRpcResponse::failure(
                    Value::Null,
                    CODE_INVALID_REQUEST,
                    "invalid json-rpc request",
                ),
                method: McpMethod::Invalid,
                tool: None,
            },
        }
    }

    /// Handles one JSON-RPC request against the session state machine.
    pub async fn handle(&self, request: JsonRpcRequest) -> HandledRequest {
        let method = McpMethod::classify(&request.method);
        if request.jsonrpc != "2.0" {
            return HandledRequest {
                response: JsonRpcResponse::failure(
                    request.id,
                    CODE_INVALID_REQUEST,
                    "invalid json-rpc version",
                ),
                method: McpMethod::Invalid,
                tool: None,
            };
        }
        match self.gate(&request.method) {
            Ok(()) => {}
            Err((code, message)) => {
                return HandledRequest {
                    response: JsonRpcResponse::failure(request.id, code, message),
                    method,
                    tool: None,
                };
            }
        }
        let (response, tool) = self.dispatch(request).await;
        HandledRequest {
            response,
            method,
            tool,
        }
    }

    /// Applies the state machine gate for a method name.
    fn gate(&self, method: &str) -> Result<(), (i64, String)> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => return Err((CODE_INTERNAL_ERROR, "session state poisoned".to_string())),
        };
        match *state {
            ProtocolState::Closed => Err((CODE_INVALID_REQUEST, "session closed".to_string())),
            ProtocolState::Uninitialized if method == "initialize" => {
                *state = ProtocolState::Initialized;
                Ok(())
            }
            ProtocolState::Uninitialized => Err((
                CODE_NOT_INITIALIZED,
                format!("server not initialized: send initialize before {method}"),
            )),
            ProtocolState::Initialized => Ok(()),
        }
    }

    /// Routes an admitted request to its method handler.
    async fn dispatch(&self, request: JsonRpcRequest) -> (JsonRpcResponse, Option<String>) {
        let id = request.id;
        match request.method.as_str() {
            "initialize" => (self.handle_initialize(id, request.params), None),
            "tools/list" => (self.handle_tools_list(id), None),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "resources/list" => (self.handle_resources_list(id), None),
            "resources/read" => (self.handle_resources_read(id, request.params), None),
            other => (
                JsonRpcResponse::failure(
                    id,
                    CODE_METHOD_NOT_FOUND,
                    format!("method not found: {other}"),
                ),
                None,
            ),
        }
    }

    /// Handles `initialize`, echoing the client's protocol version.
    fn handle_initialize(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = params
            .map(|value| serde_json::from_value(value).unwrap_or_default())
            .unwrap_or_default();
        let version =
            params.protocol_version.unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string());
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": version,
                "capabilities": { "tools": {}, "resources": {} },
                "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
            }),
        )
    }

    /// Handles `tools/list`, filtered through the enablement policy.
    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let tools: Vec<_> = self
            .context
            .registry
            .definitions()
            .iter()
            .filter(|def| self.context.policy.is_allowed(&def.name))
            .collect();
        match serde_json::to_value(tools) {
            Ok(value) => JsonRpcResponse::success(id, json!({ "tools": value })),
            Err(_) => {
                JsonRpcResponse::failure(id, CODE_INTERNAL_ERROR, "serialization failed")
            }
        }
    }

    /// Handles `tools/call`: gate on enablement, look up, invoke, wrap.
    async fn handle_tools_call(
        &self,
        id: Value,
        params: Option<Value>,
    ) -> (JsonRpcResponse, Option<String>) {
        let params = params.unwrap_or(Value::Null);
        let call: ToolCallParams = match serde_json::from_value(params) {
            Ok(call) => call,
            Err(_) => {
                return (
                    JsonRpcResponse::failure(id, CODE_INVALID_PARAMS, "invalid tool call params"),
                    None,
                );
            }
        };
        let name = call.name.clone();
        let Some(handler) = self.context.registry.handler(&name) else {
            return (
                JsonRpcResponse::failure(
                    id,
                    CODE_METHOD_NOT_FOUND,
                    format!("unknown tool: {name}"),
                ),
                Some(name),
            );
        };
        if !self.context.policy.is_allowed(&name) {
            return (
                JsonRpcResponse::failure(
                    id,
                    CODE_INVALID_REQUEST,
                    ToolError::NotAvailable(name.clone()).to_string(),
                ),
                Some(name),
            );
        }
        let response = match handler.call(call.arguments).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(_) => {
                    JsonRpcResponse::failure(id, CODE_INTERNAL_ERROR, "serialization failed")
                }
            },
            Err(err) => tool_error_response(id, &name, err),
        };
        (response, Some(name))
    }

    /// Handles `resources/list`.
    fn handle_resources_list(&self, id: Value) -> JsonRpcResponse {
        match serde_json::to_value(self.context.resources.list()) {
            Ok(value) => JsonRpcResponse::success(id, json!({ "resources": value })),
            Err(_) => {
                JsonRpcResponse::failure(id, CODE_INTERNAL_ERROR, "serialization failed")
            }
        }
    }

    /// Handles `resources/read` with URI validation.
    fn handle_resources_read(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params = params.unwrap_or(Value::Null);
        let read: ResourceReadParams = match serde_json::from_value(params) {
            Ok(read) => read,
            Err(_) => {
                return JsonRpcResponse::failure(
                    id,
                    CODE_INVALID_PARAMS,
                    "uri parameter is required",
                );
            }
        };
        match self.context.resources.read(&read.uri) {
            Ok(content) => match serde_json::to_value(content) {
                Ok(value) => JsonRpcResponse::success(id, json!({ "contents": [value] })),
                Err(_) => {
                    JsonRpcResponse::failure(id, CODE_INTERNAL_ERROR, "serialization failed")
                }
            },
            Err(err @ ResourceError::InvalidUri(_)) => {
                JsonRpcResponse::failure(id, CODE_INVALID_REQUEST, err.to_string())
            }
            Err(err @ ResourceError::NotFound(_)) => {
                JsonRpcResponse::failure(id, CODE_NOT_FOUND, err.to_string())
            }
        }
    }
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Maps a tool dispatch error to a JSON-RPC error response.
fn tool_error_response(id: Value, name: &str, error: ToolError) -> JsonRpcResponse {
    match error {
        ToolError::InvalidParams(message) => {
            JsonRpcResponse::failure(id, CODE_INVALID_PARAMS, message)
        }
        ToolError::UnknownTool(_) => {
            JsonRpcResponse::failure(id, CODE_METHOD_NOT_FOUND, format!("unknown tool: {name}"))
        }
        ToolError::NotAvailable(_) => JsonRpcResponse::failure(
            id,
            CODE_INVALID_REQUEST,
            ToolError::NotAvailable(name.to_string()).to_string(),
        ),
        ToolError::Internal(message) => JsonRpcResponse::failure(
            id,
            CODE_INTERNAL_ERROR,
            format!("tool {name} failed: {message}"),
        ),
        ToolError::Serialization => {
            JsonRpcResponse::failure(id, CODE_INTERNAL_ERROR, "serialization failed")
        }
    }
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

    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;
    use serde_json::json;

    use super::CODE_INVALID_PARAMS;
    use super::CODE_INVALID_REQUEST;
    use super::CODE_METHOD_NOT_FOUND;
    use super::CODE_NOT_FOUND;
    use super::CODE_NOT_INITIALIZED;
    use super::JsonRpcRequest;
    use super::ProtocolSession;
    use super::ServerContext;
    use crate::enablement::EnablementPolicy;
    use crate::registry::ContentBlock;
    use crate::registry::InputSchema;
    use crate::registry::ToolDefinition;
    use crate::registry::ToolError;
    use crate::registry::ToolHandler;
    use crate::registry::ToolModule;
    use crate::registry::ToolRegistry;
    use crate::registry::ToolResult;
    use crate::resources::ResourceCatalog;

    /// Handler that echoes its arguments back as text.
    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult {
                content: vec![ContentBlock::Text {
                    text: args.to_string(),
                }],
                is_error: false,
            })
        }
    }

    /// Handler that always rejects its arguments.
    struct RejectingHandler;

    #[async_trait]
    impl ToolHandler for RejectingHandler {
        async fn call(&self, _args: Value) -> Result<ToolResult, ToolError> {
            Err(ToolError::InvalidParams(
                "productId is required. Use get_products to find product IDs.".to_string(),
            ))
        }
    }

    /// Builds a session over a two-tool registry with one tool enabled.
    fn session() -> ProtocolSession {
        let registry = Arc::new(ToolRegistry::register(vec![ToolModule {
            definitions: vec![
                ToolDefinition {
                    name: "echo".to_string(),
                    description: "echo".to_string(),
                    input_schema: InputSchema::object(),
                },
                ToolDefinition {
                    name: "purchase_product".to_string(),
                    description: "purchase".to_string(),
                    input_schema: InputSchema::object(),
                },
                ToolDefinition {
                    name: "disabled_tool".to_string(),
                    description: "disabled".to_string(),
                    input_schema: InputSchema::object(),
                },
            ],
            handlers: vec![
                ("echo".to_string(), Arc::new(EchoHandler) as Arc<dyn ToolHandler>),
                (
                    "purchase_product".to_string(),
                    Arc::new(RejectingHandler) as Arc<dyn ToolHandler>,
                ),
                ("disabled_tool".to_string(), Arc::new(EchoHandler) as Arc<dyn ToolHandler>),
            ],
        }]));
        let config = larder_config::ToolPolicyConfig {
            enabled: vec!["echo".to_string(), "purchase_product".to_string()],
            options: std::collections::BTreeMap::new(),
        };
        let policy =
            Arc::new(EnablementPolicy::from_config(&config, &registry).expect("policy builds"));
        ProtocolSession::new(Arc::new(ServerContext {
            registry,
            policy,
            resources: Arc::new(ResourceCatalog::default()),
        }))
    }

    /// Builds a JSON-RPC request value.
    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .expect("request parses")
    }

    /// Initializes a session for tests that need the initialized state.
    async fn initialized() -> ProtocolSession {
        let session = session();
        let handled = session.handle(request(0, "initialize", json!({}))).await;
        assert!(handled.response.error.is_none());
        session
    }

    #[tokio::test]
    async fn rejects_requests_before_initialize() {
        let session = session();
        let handled = session.handle(request(1, "tools/list", json!({}))).await;
        assert_eq!(handled.response.error_code(), Some(CODE_NOT_INITIALIZED));
    }

    #[tokio::test]
    async fn initialize_echoes_requested_protocol_version() {
        let session = session();
        let handled = session
            .handle(request(1, "initialize", json!({"protocolVersion": "2025-03-26"})))
            .await;
        let result = handled.response.result.expect("initialize result");
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "larder");
    }

    #[tokio::test]
    async fn initialize_defaults_protocol_version() {
        let session = session();
        let handled = session.handle(request(1, "initialize", json!({}))).await;
        let result = handled.response.result.expect("initialize result");
        assert_eq!(result["protocolVersion"], super::DEFAULT_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn tools_list_is_filtered_and_idempotent() {
        let session = initialized().await;
        let first = session.handle(request(1, "tools/list", json!({}))).await;
        let second = session.handle(request(2, "tools/list", json!({}))).await;
        let first_tools = first.response.result.expect("tools result");
        let second_tools = second.response.result.expect("tools result");
        assert_eq!(first_tools, second_tools);
        let names: Vec<&str> = first_tools["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert_eq!(names, vec!["echo", "purchase_product"]);
    }

    #[tokio::test]
    async fn call_unknown_tool_is_method_not_found() {
        let session = initialized().await;
        let handled = session
            .handle(request(1, "tools/call", json!({"name": "nope", "arguments": {}})))
            .await;
        assert_eq!(handled.response.error_code(), Some(CODE_METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn call_disabled_tool_names_the_config_knob() {
        let session = initialized().await;
        let handled = session
            .handle(request(1, "tools/call", json!({"name": "disabled_tool", "arguments": {}})))
            .await;
        assert_eq!(handled.response.error_code(), Some(CODE_INVALID_REQUEST));
        let message = handled.response.error.expect("error payload").message;
        assert!(message.contains("disabled_tool"));
        assert!(message.contains("tools.enabled"));
    }

    #[tokio::test]
    async fn listing_and_invocation_agree_on_the_partition() {
        let session = initialized().await;
        let listed = session.handle(request(1, "tools/list", json!({}))).await;
        let tools = listed.response.result.expect("tools result");
        let listed_names: Vec<String> = tools["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .filter_map(|tool| tool["name"].as_str().map(ToString::to_string))
            .collect();
        assert!(!listed_names.contains(&"disabled_tool".to_string()));
        // Every listed tool must be invocable (not rejected by policy).
        for name in listed_names {
            let handled = session
                .handle(request(2, "tools/call", json!({"name": name, "arguments": {}})))
                .await;
            assert_ne!(handled.response.error_code(), Some(CODE_INVALID_REQUEST));
        }
    }

    #[tokio::test]
    async fn invalid_params_surface_with_parameter_name() {
        let session = initialized().await;
        let handled = session
            .handle(request(1, "tools/call", json!({"name": "purchase_product", "arguments": {}})))
            .await;
        assert_eq!(handled.response.error_code(), Some(CODE_INVALID_PARAMS));
        let message = handled.response.error.expect("error payload").message;
        assert!(message.contains("productId"));
    }

    #[tokio::test]
    async fn malformed_call_does_not_tear_down_the_session() {
        let session = initialized().await;
        let bad = session.handle(request(1, "tools/call", json!({"no_name": true}))).await;
        assert_eq!(bad.response.error_code(), Some(CODE_INVALID_PARAMS));
        let good = session
            .handle(request(2, "tools/call", json!({"name": "echo", "arguments": {"a": 1}})))
            .await;
        assert!(good.response.error.is_none());
    }

    #[tokio::test]
    async fn resources_round_trip() {
        let session = initialized().await;
        let listed = session.handle(request(1, "resources/list", json!({}))).await;
        let resources = listed.response.result.expect("resources result");
        assert_eq!(resources["resources"].as_array().expect("resources array").len(), 3);
        let read = session
            .handle(request(2, "resources/read", json!({"uri": "larder://examples"})))
            .await;
        let contents = read.response.result.expect("read result");
        assert_eq!(contents["contents"][0]["mimeType"], "text/markdown");
    }

    #[tokio::test]
    async fn unknown_resource_is_not_found() {
        let session = initialized().await;
        let handled = session
            .handle(request(1, "resources/read", json!({"uri": "larder://missing"})))
            .await;
        assert_eq!(handled.response.error_code(), Some(CODE_NOT_FOUND));
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let session = initialized().await;
        let handled = session.handle(request(1, "prompts/list", json!({}))).await;
        assert_eq!(handled.response.error_code(), Some(CODE_METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn closed_session_rejects_requests() {
        let session = initialized().await;
        session.close();
        let handled = session.handle(request(1, "tools/list", json!({}))).await;
        assert_eq!(handled.response.error_code(), Some(CODE_INVALID_REQUEST));
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_rejected() {
        let session = initialized().await;
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "1.0",
            "id": 1,
            "method": "tools/list",
        }))
        .expect("request parses");
        let handled = session.handle(request).await;
        assert_eq!(handled.response.error_code(), Some(CODE_INVALID_REQUEST));
    }

    #[tokio::test]
    async fn handle_bytes_maps_garbage_to_invalid_request() {
        let session = initialized().await;
        let handled = session.handle_bytes(b"not json").await;
        assert_eq!(handled.response.error_code(), Some(CODE_INVALID_REQUEST));
    }
}
