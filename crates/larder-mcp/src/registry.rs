// larder-mcp/src/registry.rs
// ============================================================================
// Module: Tool Registry
// Description: Tool definitions, handler trait, and the name-keyed registry.
// Purpose: Aggregate module catalogues into lookup maps for dispatch.
// Dependencies: async-trait, serde, serde_json
// ============================================================================

//! ## Overview
//! The registry is built once at startup by concatenating every module's
//! definitions and handlers. It is read-only afterwards and shared across
//! all sessions. Enablement is a separate concern layered on top: the
//! registry always answers for the full catalogue, including disabled
//! tools.
//!
//! ## Invariants
//! - Definition order is module registration order, then in-module order.
//! - A name collision is a silent last-write-wins overwrite; the test suite
//!   asserts the 1:1 definition/handler invariant instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Immutable description of one tool in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Unique, stable tool identifier.
    pub name: String,
    /// Human/LLM-readable description.
    pub description: String,
    /// Structural schema for the tool arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

/// Object-shaped input schema for a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSchema {
    /// Schema type discriminator; always `object`.
    #[serde(rename = "type")]
    schema_type: &'static str,
    /// Named property schemas.
    properties: Map<String, Value>,
    /// Names of required properties.
    required: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::object()
    }
}

impl InputSchema {
    /// Creates an empty object schema.
    #[must_use]
    pub fn object() -> Self {
        Self {
            schema_type: "object",
            properties: Map::new(),
            required: Vec::new(),
        }
    }

    /// Adds a string property.
    #[must_use]
    pub fn string(mut self, name: &str, description: &str) -> Self {
        self.properties
            .insert(name.to_string(), json!({"type": "string", "description": description}));
        self
    }

    /// Adds a string property constrained to an enumeration.
    #[must_use]
    pub fn string_enum(mut self, name: &str, description: &str, values: &[&str]) -> Self {
        self.properties.insert(
            name.to_string(),
            json!({"type": "string", "description": description, "enum": values}),
        );
        self
    }

    /// Adds a number property.
    #[must_use]
    pub fn number(mut self, name: &str, description: &str) -> Self {
        self.properties
            .insert(name.to_string(), json!({"type": "number", "description": description}));
        self
    }

    /// Adds a boolean property.
    #[must_use]
    pub fn boolean(mut self, name: &str, description: &str) -> Self {
        self.properties
            .insert(name.to_string(), json!({"type": "boolean", "description": description}));
        self
    }

    /// Adds an array-of-strings property.
    #[must_use]
    pub fn string_array(mut self, name: &str, description: &str) -> Self {
        self.properties.insert(
            name.to_string(),
            json!({"type": "array", "items": {"type": "string"}, "description": description}),
        );
        self
    }

    /// Adds an array-of-numbers property.
    #[must_use]
    pub fn number_array(mut self, name: &str, description: &str) -> Self {
        self.properties.insert(
            name.to_string(),
            json!({"type": "array", "items": {"type": "number"}, "description": description}),
        );
        self
    }

    /// Adds a free-form object property.
    #[must_use]
    pub fn object_property(mut self, name: &str, description: &str) -> Self {
        self.properties
            .insert(name.to_string(), json!({"type": "object", "description": description}));
        self
    }

    /// Marks properties as required, in the given order.
    #[must_use]
    pub fn require(mut self, names: &[&str]) -> Self {
        for name in names {
            self.required.push((*name).to_string());
        }
        self
    }

    /// Returns the required property names.
    #[must_use]
    pub fn required_names(&self) -> &[String] {
        &self.required
    }
}

// ============================================================================
// SECTION: Tool Results
// ============================================================================

/// Content block inside a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text payload.
    Text {
        /// Text body.
        text: String,
    },
}

/// Result payload returned by a tool handler.
///
/// Upstream failures surface here with `is_error = true`; the protocol call
/// itself still succeeds in delivering the failure-shaped result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
    /// Whether the tool ran and reported a failure.
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised before or instead of a tool result.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A required argument is missing or malformed.
    #[error("{0}")]
    InvalidParams(String),
    /// The tool name is not in the registry at all.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// The tool exists but is disabled for this deployment.
    #[error("tool '{0}' is not available; add it to tools.enabled in the server configuration")]
    NotAvailable(String),
    /// Unexpected failure inside a handler.
    #[error("tool execution failed: {0}")]
    Internal(String),
    /// Result serialization failed.
    #[error("serialization failed")]
    Serialization,
}

// ============================================================================
// SECTION: Handler Trait
// ============================================================================

/// A tool handler: one async capability per tool name.
///
/// Handlers are stateless across invocations; their only side effects are
/// calls to the upstream REST collaborator.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invokes the tool with untyped structured arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidParams`] before any upstream call when a
    /// required argument is missing, and [`ToolError::Internal`] for
    /// unexpected failures. Upstream failures are shaped into an error
    /// [`ToolResult`] instead.
    async fn call(&self, args: Value) -> Result<ToolResult, ToolError>;
}

/// One module's contribution to the catalogue.
pub struct ToolModule {
    /// Tool definitions in display order.
    pub definitions: Vec<ToolDefinition>,
    /// Handler bindings, keyed by tool name.
    pub handlers: Vec<(String, Arc<dyn ToolHandler>)>,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Name-keyed registry over all tool modules.
pub struct ToolRegistry {
    /// Definitions in registration order.
    definitions: Vec<ToolDefinition>,
    /// Handler map keyed by tool name.
    handlers: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Builds the registry by concatenating module contributions.
    #[must_use]
    pub fn register(modules: Vec<ToolModule>) -> Self {
        let mut definitions = Vec::new();
        let mut handlers = BTreeMap::new();
        for module in modules {
            definitions.extend(module.definitions);
            for (name, handler) in module.handlers {
                handlers.insert(name, handler);
            }
        }
        Self {
            definitions,
            handlers,
        }
    }

    /// Returns all definitions in stable display order.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Returns the handler registered for a tool name.
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Returns whether a handler is registered for a tool name.
    #[must_use]
    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Returns every known tool name, including disabled ones.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.definitions.iter().map(|def| def.name.clone()).collect()
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

    use super::ContentBlock;
    use super::InputSchema;
    use super::ToolDefinition;
    use super::ToolError;
    use super::ToolHandler;
    use super::ToolModule;
    use super::ToolRegistry;
    use super::ToolResult;

    /// Handler that echoes a fixed marker string.
    struct MarkerHandler(&'static str);

    #[async_trait]
    impl ToolHandler for MarkerHandler {
        async fn call(&self, _args: Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult {
                content: vec![ContentBlock::Text {
                    text: self.0.to_string(),
                }],
                is_error: false,
            })
        }
    }

    /// Builds a module with one marker tool per name.
    fn module(names: &[&'static str]) -> ToolModule {
        ToolModule {
            definitions: names
                .iter()
                .map(|name| ToolDefinition {
                    name: (*name).to_string(),
                    description: format!("{name} test tool"),
                    input_schema: InputSchema::object(),
                })
                .collect(),
            handlers: names
                .iter()
                .map(|name| {
                    ((*name).to_string(), Arc::new(MarkerHandler(name)) as Arc<dyn ToolHandler>)
                })
                .collect(),
        }
    }

    #[test]
    fn every_definition_has_a_handler() {
        let registry = ToolRegistry::register(vec![module(&["alpha", "beta"]), module(&["gamma"])]);
        for name in registry.tool_names() {
            assert!(registry.has_handler(&name), "missing handler for {name}");
            assert!(registry.handler(&name).is_some());
        }
    }

    #[test]
    fn names_match_definitions_in_order() {
        let registry = ToolRegistry::register(vec![module(&["beta", "alpha"]), module(&["gamma"])]);
        let names = registry.tool_names();
        let from_defs: Vec<String> =
            registry.definitions().iter().map(|def| def.name.clone()).collect();
        assert_eq!(names.len(), registry.definitions().len());
        assert_eq!(names, from_defs);
        assert_eq!(names, vec!["beta", "alpha", "gamma"]);
    }

    #[test]
    fn unknown_name_has_no_handler() {
        let registry = ToolRegistry::register(vec![module(&["alpha"])]);
        assert!(!registry.has_handler("missing"));
        assert!(registry.handler("missing").is_none());
    }

    #[test]
    fn schema_serializes_to_mcp_shape() {
        let definition = ToolDefinition {
            name: "purchase_product".to_string(),
            description: "test".to_string(),
            input_schema: InputSchema::object()
                .number("productId", "ID of the product")
                .number("amount", "Amount to purchase")
                .require(&["productId", "amount"]),
        };
        let value = serde_json::to_value(&definition).expect("definition serializes");
        assert_eq!(value["inputSchema"]["type"], "object");
        assert_eq!(value["inputSchema"]["required"], json!(["productId", "amount"]));
        assert_eq!(value["inputSchema"]["properties"]["productId"]["type"], "number");
    }

    #[test]
    fn result_serializes_is_error_only_when_set() {
        let ok = ToolResult {
            content: vec![ContentBlock::Text {
                text: "{}".to_string(),
            }],
            is_error: false,
        };
        let value = serde_json::to_value(&ok).expect("result serializes");
        assert!(value.get("isError").is_none());

        let failed = ToolResult {
            content: vec![ContentBlock::Text {
                text: "{}".to_string(),
            }],
            is_error: true,
        };
        let value = serde_json::to_value(&failed).expect("result serializes");
        assert_eq!(value["isError"], true);
    }
}
