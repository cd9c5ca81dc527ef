// larder-mcp/src/tools/shopping.rs
// ============================================================================
// Module: Shopping Tools
// Description: Shopping list and store tools.
// Purpose: Shape shopping tool calls into upstream object endpoints.
// Dependencies: larder-client, serde_json
// ============================================================================

//! ## Overview
//! Shopping tools manage the shopping list (read, add, remove) and list
//! the known stores.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use larder_client::HttpMethod;
use larder_client::RequestOptions;
use larder_client::UpstreamClient;
use serde_json::Value;
use serde_json::json;

use crate::registry::InputSchema;
use crate::registry::ToolDefinition;
use crate::registry::ToolError;
use crate::registry::ToolHandler;
use crate::registry::ToolModule;
use crate::registry::ToolResult;
use crate::tools::shape;

// ============================================================================
// SECTION: Module Assembly
// ============================================================================

/// Builds the shopping tool module.
#[must_use]
pub fn module(client: &Arc<UpstreamClient>) -> ToolModule {
    let ops = [
        ("get_shopping_list", ShoppingOp::List),
        ("add_shopping_list_item", ShoppingOp::Add),
        ("remove_shopping_list_item", ShoppingOp::Remove),
        ("get_shopping_locations", ShoppingOp::Locations),
    ];
    ToolModule {
        definitions: definitions(),
        handlers: ops
            .into_iter()
            .map(|(name, op)| {
                (
                    name.to_string(),
                    Arc::new(ShoppingHandler {
                        client: Arc::clone(client),
                        op,
                    }) as Arc<dyn ToolHandler>,
                )
            })
            .collect(),
    }
}

/// Builds the shopping tool definitions.
fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_shopping_list".to_string(),
            description: "Get the current shopping list items.".to_string(),
            input_schema: InputSchema::object(),
        },
        ToolDefinition {
            name: "add_shopping_list_item".to_string(),
            description: "Add an item to the shopping list. Use get_products to find the product \
                          ID."
                .to_string(),
            input_schema: InputSchema::object()
                .number("productId", "ID of the product to add")
                .number("amount", "Amount to add (default: 1)")
                .number("shoppingListId", "Target shopping list (default: 1)")
                .string("note", "Optional note for the item")
                .require(&["productId"]),
        },
        ToolDefinition {
            name: "remove_shopping_list_item".to_string(),
            description: "Remove an item from the shopping list. Use get_shopping_list to find \
                          the item ID."
                .to_string(),
            input_schema: InputSchema::object()
                .number("shoppingListItemId", "ID of the shopping list item to remove")
                .require(&["shoppingListItemId"]),
        },
        ToolDefinition {
            name: "get_shopping_locations".to_string(),
            description: "Get all shopping locations (stores). Use this to find store IDs for \
                          purchase_product."
                .to_string(),
            input_schema: InputSchema::object(),
        },
    ]
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Shopping operations.
#[derive(Clone, Copy)]
enum ShoppingOp {
    /// Shopping list read.
    List,
    /// Shopping list insertion.
    Add,
    /// Shopping list removal.
    Remove,
    /// Store listing.
    Locations,
}

/// Shopping tool handler bound to one operation.
struct ShoppingHandler {
    /// Shared upstream client.
    client: Arc<UpstreamClient>,
    /// Operation this instance performs.
    op: ShoppingOp,
}

#[async_trait]
impl ToolHandler for ShoppingHandler {
    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        match self.op {
            ShoppingOp::List => {
                Ok(shape::api_call(
                    &self.client,
                    "/objects/shopping_list",
                    "get shopping list items",
                    RequestOptions::default(),
                )
                .await)
            }
            ShoppingOp::Add => self.add(&args).await,
            ShoppingOp::Remove => self.remove(&args).await,
            ShoppingOp::Locations => {
                Ok(shape::api_call(
                    &self.client,
                    "/objects/shopping_locations",
                    "get all shopping locations",
                    RequestOptions::default(),
                )
                .await)
            }
        }
    }
}

impl ShoppingHandler {
    /// Handles `add_shopping_list_item`.
    async fn add(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let product_id =
            shape::require_i64(args, "productId", "Use get_products to find product IDs.")?;
        let body = json!({
            "product_id": product_id,
            "amount": shape::optional_f64(args, "amount", 1.0),
            "shopping_list_id": shape::optional_i64(args, "shoppingListId").unwrap_or(1),
            "note": shape::optional_str(args, "note").unwrap_or_default(),
        });
        Ok(shape::api_call(
            &self.client,
            "/objects/shopping_list",
            "add shopping list item",
            RequestOptions {
                method: HttpMethod::Post,
                body: Some(body),
                ..RequestOptions::default()
            },
        )
        .await)
    }

    /// Handles `remove_shopping_list_item`.
    async fn remove(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let item_id = shape::require_i64(
            args,
            "shoppingListItemId",
            "Use get_shopping_list to find item IDs.",
        )?;
        Ok(shape::api_call(
            &self.client,
            &format!("/objects/shopping_list/{item_id}"),
            "remove shopping list item",
            RequestOptions {
                method: HttpMethod::Delete,
                ..RequestOptions::default()
            },
        )
        .await)
    }
}
