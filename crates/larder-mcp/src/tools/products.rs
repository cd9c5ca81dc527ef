// larder-mcp/src/tools/products.rs
// ============================================================================
// Module: Product Tools
// Description: Product catalogue inspection tools.
// Purpose: Shape product tool calls into upstream object endpoints.
// Dependencies: larder-client, serde_json
// ============================================================================

//! ## Overview
//! Product tools are read-only. `get_products` and `get_product_entries`
//! project their responses down to the requested or essential fields so
//! large catalogues stay digestible for the calling agent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use larder_client::RequestOptions;
use larder_client::UpstreamClient;
use serde_json::Value;

use crate::registry::InputSchema;
use crate::registry::ToolDefinition;
use crate::registry::ToolError;
use crate::registry::ToolHandler;
use crate::registry::ToolModule;
use crate::registry::ToolResult;
use crate::tools::shape;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fields kept when projecting stock entries.
const ENTRY_FIELDS: &[&str] =
    &["id", "amount", "best_before_date", "purchased_date", "stock_id", "note"];

// ============================================================================
// SECTION: Module Assembly
// ============================================================================

/// Builds the product tool module.
#[must_use]
pub fn module(client: &Arc<UpstreamClient>) -> ToolModule {
    let ops = [
        ("get_products", ProductOp::Products),
        ("get_product_entries", ProductOp::Entries),
        ("get_price_history", ProductOp::PriceHistory),
        ("get_product_groups", ProductOp::Groups),
    ];
    ToolModule {
        definitions: definitions(),
        handlers: ops
            .into_iter()
            .map(|(name, op)| {
                (
                    name.to_string(),
                    Arc::new(ProductHandler {
                        client: Arc::clone(client),
                        op,
                    }) as Arc<dyn ToolHandler>,
                )
            })
            .collect(),
    }
}

/// Builds the product tool definitions.
fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_products".to_string(),
            description: "Get all products, projected to the requested fields. Always pass the \
                          fields you need (for example [\"id\", \"name\"]) to keep the response \
                          small."
                .to_string(),
            input_schema: InputSchema::object()
                .string_array("fields", "Field names to include for each product")
                .require(&["fields"]),
        },
        ToolDefinition {
            name: "get_product_entries".to_string(),
            description: "Get the stock entries of a product, including stock entry IDs usable \
                          with consume_product, transfer_product, open_product, and \
                          split_stock_entry."
                .to_string(),
            input_schema: InputSchema::object()
                .number("productId", "ID of the product")
                .require(&["productId"]),
        },
        ToolDefinition {
            name: "get_price_history".to_string(),
            description: "Get the price history of a product.".to_string(),
            input_schema: InputSchema::object()
                .number("productId", "ID of the product")
                .require(&["productId"]),
        },
        ToolDefinition {
            name: "get_product_groups".to_string(),
            description: "Get all product groups.".to_string(),
            input_schema: InputSchema::object(),
        },
    ]
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Product operations.
#[derive(Clone, Copy)]
enum ProductOp {
    /// Projected product listing.
    Products,
    /// Projected stock entries for one product.
    Entries,
    /// Price history for one product.
    PriceHistory,
    /// Product group listing.
    Groups,
}

/// Product tool handler bound to one operation.
struct ProductHandler {
    /// Shared upstream client.
    client: Arc<UpstreamClient>,
    /// Operation this instance performs.
    op: ProductOp,
}

#[async_trait]
impl ToolHandler for ProductHandler {
    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        match self.op {
            ProductOp::Products => self.products(&args).await,
            ProductOp::Entries => self.entries(&args).await,
            ProductOp::PriceHistory => self.price_history(&args).await,
            ProductOp::Groups => {
                Ok(shape::api_call(
                    &self.client,
                    "/objects/product_groups",
                    "get all product groups",
                    RequestOptions::default(),
                )
                .await)
            }
        }
    }
}

impl ProductHandler {
    /// Handles `get_products` with field projection.
    async fn products(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let fields = shape::require_str_array(
            args,
            "fields",
            "Pass a non-empty array of field names, e.g. [\"id\", \"name\"].",
        )?;
        let response = match self.client.get("/objects/products").await {
            Ok(response) => response.data,
            Err(err) => return Ok(shape::upstream_failure("get all products", &err)),
        };
        Ok(shape::success(&project_fields(&response, &fields)))
    }

    /// Handles `get_product_entries` with the essential-field projection.
    async fn entries(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let product_id =
            shape::require_i64(args, "productId", "Use get_products to find product IDs.")?;
        let response =
            match self.client.get(&format!("/stock/products/{product_id}/entries")).await {
                Ok(response) => response.data,
                Err(err) => return Ok(shape::upstream_failure("get product entries", &err)),
            };
        let fields: Vec<String> = ENTRY_FIELDS.iter().map(ToString::to_string).collect();
        Ok(shape::success(&project_fields(&response, &fields)))
    }

    /// Handles `get_price_history`.
    async fn price_history(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let product_id =
            shape::require_i64(args, "productId", "Use get_products to find product IDs.")?;
        Ok(shape::api_call(
            &self.client,
            &format!("/stock/products/{product_id}/price-history"),
            "get product price history",
            RequestOptions::default(),
        )
        .await)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Projects each array item down to the named fields.
fn project_fields(data: &Value, fields: &[String]) -> Value {
    match data.as_array() {
        Some(items) => Value::Array(
            items
                .iter()
                .map(|item| {
                    let mut projected = serde_json::Map::new();
                    for field in fields {
                        if let Some(value) = item.get(field) {
                            projected.insert(field.clone(), value.clone());
                        }
                    }
                    Value::Object(projected)
                })
                .collect(),
        ),
        None => data.clone(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
