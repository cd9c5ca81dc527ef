// larder-mcp/src/lib.rs
// ============================================================================
// Module: Larder MCP
// Description: MCP server core for the Larder household tool catalogue.
// Purpose: Dispatch MCP tool calls onto the upstream household API.
// Dependencies: larder-client, larder-config, axum, tokio
// ============================================================================

//! ## Overview
//! Larder MCP exposes a fixed catalogue of household-management tools over
//! the Model Context Protocol. The crate owns the tool registry, the
//! enablement policy, the per-session protocol state machine, and the
//! session/transport multiplexer (stdio and HTTP/SSE). Tool handlers are
//! thin request-shaping wrappers over [`larder_client::UpstreamClient`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod enablement;
pub mod protocol;
pub mod registry;
pub mod resources;
pub mod server;
pub mod session;
pub mod tools;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Server name advertised during protocol initialization.
pub const SERVER_NAME: &str = "larder";
/// Server version advertised during protocol initialization.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::McpAuditEvent;
pub use audit::McpAuditSink;
pub use audit::McpMethod;
pub use audit::McpOutcome;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use enablement::EnablementError;
pub use enablement::EnablementPolicy;
pub use protocol::ProtocolSession;
pub use protocol::ServerContext;
pub use registry::ContentBlock;
pub use registry::InputSchema;
pub use registry::ToolDefinition;
pub use registry::ToolError;
pub use registry::ToolHandler;
pub use registry::ToolModule;
pub use registry::ToolRegistry;
pub use registry::ToolResult;
pub use resources::ResourceCatalog;
pub use server::McpServer;
pub use server::McpServerError;
pub use session::SessionMultiplexer;
pub use session::generate_session_token;
