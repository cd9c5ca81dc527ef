// larder-mcp/src/tools/stock.rs
// ============================================================================
// Module: Stock Tools
// Description: Stock inspection and mutation tools.
// Purpose: Shape stock tool calls into upstream stock endpoints.
// Dependencies: larder-client, serde_json
// ============================================================================

//! ## Overview
//! Stock tools cover inspection (`get_all_stock`, `get_stock_volatile`,
//! `get_stock_by_location`), bookkeeping transactions (`inventory_product`,
//! `purchase_product`, `consume_product`, `transfer_product`,
//! `open_product`, `print_stock_entry_label`), entry subdivision
//! (`split_stock_entry`), and the fuzzy `lookup_product` search.
//!
//! The `purchase_product` schema is a factory over configuration: when the
//! `require_price` option is set, `price` joins the required properties.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use larder_client::HttpMethod;
use larder_client::RequestOptions;
use larder_client::UpstreamClient;
use larder_config::ToolPolicyConfig;
use serde_json::Value;
use serde_json::json;

use crate::registry::InputSchema;
use crate::registry::ToolDefinition;
use crate::registry::ToolError;
use crate::registry::ToolHandler;
use crate::registry::ToolModule;
use crate::registry::ToolResult;
use crate::tools::lookup::rank_names;
use crate::tools::shape;
use crate::tools::split::plan_split;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum ranked matches returned by `lookup_product`.
const LOOKUP_LIMIT: usize = 5;

// ============================================================================
// SECTION: Module Assembly
// ============================================================================

/// Builds the stock tool module.
#[must_use]
pub fn module(client: &Arc<UpstreamClient>, policy: &ToolPolicyConfig) -> ToolModule {
    let require_price =
        policy.tool_options("purchase_product").get("require_price").copied().unwrap_or(false);
    let ops = [
        ("get_all_stock", StockOp::AllStock),
        ("get_stock_volatile", StockOp::Volatile),
        ("get_stock_by_location", StockOp::ByLocation),
        ("inventory_product", StockOp::Inventory),
        (
            "purchase_product",
            StockOp::Purchase {
                require_price,
            },
        ),
        ("consume_product", StockOp::Consume),
        ("transfer_product", StockOp::Transfer),
        ("open_product", StockOp::Open),
        ("split_stock_entry", StockOp::Split),
        ("lookup_product", StockOp::Lookup),
        ("print_stock_entry_label", StockOp::PrintLabel),
    ];
    ToolModule {
        definitions: definitions(require_price),
        handlers: ops
            .into_iter()
            .map(|(name, op)| {
                (
                    name.to_string(),
                    Arc::new(StockHandler {
                        client: Arc::clone(client),
                        op,
                    }) as Arc<dyn ToolHandler>,
                )
            })
            .collect(),
    }
}

/// Builds the stock tool definitions for the active configuration.
fn definitions(require_price: bool) -> Vec<ToolDefinition> {
    let mut purchase_required = vec!["productId", "amount", "locationId"];
    if require_price {
        purchase_required.push("price");
    }
    vec![
        ToolDefinition {
            name: "get_all_stock".to_string(),
            description: "Get all stock entries from every location, including stock entry IDs."
                .to_string(),
            input_schema: InputSchema::object(),
        },
        ToolDefinition {
            name: "get_stock_volatile".to_string(),
            description: "Get volatile stock information: due, overdue, expired, and missing \
                          products."
                .to_string(),
            input_schema: InputSchema::object()
                .boolean("includeDetails", "Whether to include details about each stock item"),
        },
        ToolDefinition {
            name: "get_stock_by_location".to_string(),
            description: "Get stock entries stored at a specific location. Use get_locations to \
                          find location IDs."
                .to_string(),
            input_schema: InputSchema::object()
                .number("locationId", "ID of the location to get stock for")
                .require(&["locationId"]),
        },
        ToolDefinition {
            name: "inventory_product".to_string(),
            description: "Track a product inventory correction (set the current stock amount). \
                          Use get_products to find product IDs and get_locations for location \
                          IDs."
                .to_string(),
            input_schema: InputSchema::object()
                .number("productId", "ID of the product to inventory")
                .number("newAmount", "New total amount in the product's stock unit")
                .string("bestBeforeDate", "Best before date in YYYY-MM-DD format (default: today \
                                           + 1 year)")
                .number("locationId", "ID of the storage location")
                .string("note", "Optional note")
                .require(&["productId", "newAmount", "locationId"]),
        },
        ToolDefinition {
            name: "purchase_product".to_string(),
            description: "Track a product purchase. Use get_products for product IDs, \
                          get_shopping_locations for store IDs, and get_locations for storage \
                          location IDs."
                .to_string(),
            input_schema: InputSchema::object()
                .number("productId", "ID of the product to purchase")
                .number("amount", "Amount to purchase in the product's stock unit")
                .string("bestBeforeDate", "Best before date in YYYY-MM-DD format (default: today \
                                           + 1 year)")
                .number("price", "Price of the purchase")
                .number("storeId", "ID of the store where purchased")
                .number("locationId", "ID of the storage location")
                .string("note", "Optional note")
                .require(&purchase_required),
        },
        ToolDefinition {
            name: "consume_product".to_string(),
            description: "Track consumption of a specific stock entry.".to_string(),
            input_schema: InputSchema::object()
                .number("stockId", "ID of the specific stock entry to consume")
                .number("productId", "ID of the product being consumed")
                .number("amount", "Amount to consume in the product's stock unit")
                .boolean("spoiled", "Whether the product is spoiled (default: false)")
                .string("note", "Optional note")
                .require(&["stockId", "productId", "amount"]),
        },
        ToolDefinition {
            name: "transfer_product".to_string(),
            description: "Transfer a specific stock entry to another location.".to_string(),
            input_schema: InputSchema::object()
                .number("stockId", "ID of the specific stock entry to transfer")
                .number("productId", "ID of the product being transferred")
                .number("amount", "Amount to transfer in the product's stock unit")
                .number("locationIdTo", "ID of the destination location")
                .string("note", "Optional note for this transfer")
                .require(&["stockId", "productId", "amount", "locationIdTo"]),
        },
        ToolDefinition {
            name: "open_product".to_string(),
            description: "Mark a specific stock entry as opened.".to_string(),
            input_schema: InputSchema::object()
                .number("stockId", "ID of the specific stock entry to mark as opened")
                .number("productId", "ID of the product being opened")
                .number("amount", "Amount to mark as opened in the product's stock unit")
                .string("note", "Optional note")
                .require(&["stockId", "productId", "amount"]),
        },
        ToolDefinition {
            name: "split_stock_entry".to_string(),
            description: "Split one stock entry into several sub-entries. The original entry \
                          keeps the first amount; the remaining amounts become new entries with \
                          sequentially tagged notes. Use get_product_entries to find stock entry \
                          IDs."
                .to_string(),
            input_schema: InputSchema::object()
                .number("stockEntryId", "ID of the stock entry to split")
                .number_array("amounts", "Target amounts for the sub-entries, in order")
                .require(&["stockEntryId", "amounts"]),
        },
        ToolDefinition {
            name: "lookup_product".to_string(),
            description: "Look up product information with fuzzy name matching. Returns ranked \
                          matches with exact IDs, stock entries for the best match, and the \
                          known storage locations."
                .to_string(),
            input_schema: InputSchema::object()
                .string("productName", "Name of the product to look up")
                .require(&["productName"]),
        },
        ToolDefinition {
            name: "print_stock_entry_label".to_string(),
            description: "Print a label for a specific stock entry.".to_string(),
            input_schema: InputSchema::object()
                .number("stockId", "ID of the stock entry to print a label for")
                .number("productId", "ID of the product for the label")
                .require(&["stockId", "productId"]),
        },
    ]
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Stock operations.
#[derive(Clone, Copy)]
enum StockOp {
    /// Full stock listing.
    AllStock,
    /// Volatile stock (due/overdue/expired/missing).
    Volatile,
    /// Stock filtered by location.
    ByLocation,
    /// Inventory correction transaction.
    Inventory,
    /// Purchase transaction; `require_price` mirrors the schema factory.
    Purchase {
        /// Whether the price argument is mandatory.
        require_price: bool,
    },
    /// Consume transaction against one stock entry.
    Consume,
    /// Transfer transaction against one stock entry.
    Transfer,
    /// Open transaction against one stock entry.
    Open,
    /// Entry subdivision.
    Split,
    /// Fuzzy product lookup.
    Lookup,
    /// Label printing.
    PrintLabel,
}

/// Stock tool handler bound to one operation.
struct StockHandler {
    /// Shared upstream client.
    client: Arc<UpstreamClient>,
    /// Operation this instance performs.
    op: StockOp,
}

#[async_trait]
impl ToolHandler for StockHandler {
    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        match self.op {
            StockOp::AllStock => {
                Ok(shape::api_call(
                    &self.client,
                    "/stock",
                    "get current stock",
                    RequestOptions::default(),
                )
                .await)
            }
            StockOp::Volatile => Ok(self.volatile(&args).await),
            StockOp::ByLocation => self.by_location(&args).await,
            StockOp::Inventory => self.inventory(&args).await,
            StockOp::Purchase {
                require_price,
            } => self.purchase(&args, require_price).await,
            StockOp::Consume => self.consume(&args).await,
            StockOp::Transfer => self.transfer(&args).await,
            StockOp::Open => self.open(&args).await,
            StockOp::Split => self.split(&args).await,
            StockOp::Lookup => self.lookup(&args).await,
            StockOp::PrintLabel => self.print_label(&args).await,
        }
    }
}

impl StockHandler {
    /// Handles `get_stock_volatile`.
    async fn volatile(&self, args: &Value) -> ToolResult {
        let mut options = RequestOptions::default();
        if shape::optional_bool(args, "includeDetails", false) {
            options.query.push(("include_details".to_string(), "true".to_string()));
        }
        shape::api_call(&self.client, "/stock/volatile", "get volatile stock information", options)
            .await
    }

    /// Handles `get_stock_by_location`.
    async fn by_location(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let location_id = shape::require_i64(
            args,
            "locationId",
            "Use get_locations to find available location IDs.",
        )?;
        let options = RequestOptions {
            query: vec![("location_id".to_string(), location_id.to_string())],
            ..RequestOptions::default()
        };
        Ok(shape::api_call(&self.client, "/stock", "get stock by location", options).await)
    }

    /// Handles `inventory_product`.
    async fn inventory(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let product_id =
            shape::require_i64(args, "productId", "Use get_products to find product IDs.")?;
        let new_amount = shape::require_f64(args, "newAmount", "Specify the new total amount.")?;
        let location_id =
            shape::require_i64(args, "locationId", "Use get_locations to find location IDs.")?;
        let best_before = shape::optional_str(args, "bestBeforeDate")
            .unwrap_or_else(shape::default_best_before_date);
        let mut body = json!({
            "new_amount": new_amount,
            "best_before_date": best_before,
            "transaction_type": "inventory-correction",
            "location_id": location_id,
        });
        insert_optional_str(&mut body, "note", shape::optional_str(args, "note"));
        Ok(shape::api_call(
            &self.client,
            &format!("/stock/products/{product_id}/inventory"),
            "inventory product",
            post_body(body),
        )
        .await)
    }

    /// Handles `purchase_product`.
    async fn purchase(&self, args: &Value, require_price: bool) -> Result<ToolResult, ToolError> {
        let product_id =
            shape::require_i64(args, "productId", "Use get_products to find product IDs.")?;
        let amount = shape::require_f64(args, "amount", "Specify the amount purchased.")?;
        let location_id =
            shape::require_i64(args, "locationId", "Use get_locations to find location IDs.")?;
        let price = if require_price {
            Some(shape::require_f64(
                args,
                "price",
                "This deployment requires a price on every purchase.",
            )?)
        } else {
            args.get("price").and_then(Value::as_f64)
        };
        let best_before = shape::optional_str(args, "bestBeforeDate")
            .unwrap_or_else(shape::default_best_before_date);
        let mut body = json!({
            "amount": amount,
            "transaction_type": "purchase",
            "best_before_date": best_before,
            "location_id": location_id,
        });
        if let (Some(object), Some(price)) = (body.as_object_mut(), price) {
            object.insert("price".to_string(), json!(price));
        }
        if let (Some(object), Some(store)) = (body.as_object_mut(), shape::optional_i64(args, "storeId"))
        {
            object.insert("shopping_location_id".to_string(), json!(store));
        }
        insert_optional_str(&mut body, "note", shape::optional_str(args, "note"));
        Ok(shape::api_call(
            &self.client,
            &format!("/stock/products/{product_id}/add"),
            "purchase product",
            post_body(body),
        )
        .await)
    }

    /// Handles `consume_product`.
    async fn consume(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let stock_id = shape::require_i64(
            args,
            "stockId",
            "Use get_product_entries to find stock entry IDs.",
        )?;
        let product_id =
            shape::require_i64(args, "productId", "Use get_products to find product IDs.")?;
        let amount = shape::require_f64(args, "amount", "Specify the amount to consume.")?;
        let spoiled = shape::optional_bool(args, "spoiled", false);
        let mut body = json!({
            "amount": amount,
            "transaction_type": if spoiled { "consume-spoiled" } else { "consume" },
            "spoiled": spoiled,
            "stock_entry_id": stock_id,
        });
        insert_optional_str(&mut body, "note", shape::optional_str(args, "note"));
        Ok(shape::api_call(
            &self.client,
            &format!("/stock/products/{product_id}/consume"),
            "consume product",
            post_body(body),
        )
        .await)
    }

    /// Handles `transfer_product`.
    async fn transfer(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let stock_id = shape::require_i64(
            args,
            "stockId",
            "Use get_product_entries to find stock entry IDs.",
        )?;
        let product_id =
            shape::require_i64(args, "productId", "Use get_products to find product IDs.")?;
        let amount = shape::require_f64(args, "amount", "Specify the amount to transfer.")?;
        let location_to =
            shape::require_i64(args, "locationIdTo", "Use get_locations to find location IDs.")?;
        let mut body = json!({
            "amount": amount,
            "location_id_to": location_to,
            "stock_entry_id": stock_id,
            "transaction_type": "transfer",
        });
        insert_optional_str(&mut body, "note", shape::optional_str(args, "note"));
        Ok(shape::api_call(
            &self.client,
            &format!("/stock/products/{product_id}/transfer"),
            "transfer product",
            post_body(body),
        )
        .await)
    }

    /// Handles `open_product`.
    async fn open(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let stock_id = shape::require_i64(
            args,
            "stockId",
            "Use get_product_entries to find stock entry IDs.",
        )?;
        let product_id =
            shape::require_i64(args, "productId", "Use get_products to find product IDs.")?;
        let amount = shape::require_f64(args, "amount", "Specify the amount to open.")?;
        let mut body = json!({
            "amount": amount,
            "stock_entry_id": stock_id,
        });
        insert_optional_str(&mut body, "note", shape::optional_str(args, "note"));
        Ok(shape::api_call(
            &self.client,
            &format!("/stock/products/{product_id}/open"),
            "open product",
            post_body(body),
        )
        .await)
    }

    /// Handles `split_stock_entry`.
    async fn split(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let entry_id = shape::require_i64(
            args,
            "stockEntryId",
            "Use get_product_entries to find stock entry IDs.",
        )?;
        let amounts = shape::require_f64_array(
            args,
            "amounts",
            "Provide the target amounts for the sub-entries.",
        )?;
        let entry = match self.client.get(&format!("/stock/entry/{entry_id}")).await {
            Ok(response) => response.data,
            Err(err) => return Ok(shape::upstream_failure("fetch stock entry", &err)),
        };
        let Some(product_id) = entry.get("product_id").and_then(Value::as_i64) else {
            return Ok(shape::failure(
                &format!("stock entry {entry_id} has no product_id; cannot split"),
                Some(json!({ "stockEntryId": entry_id })),
            ));
        };
        let base_note = entry.get("note").and_then(Value::as_str).unwrap_or_default();
        let plan = plan_split(entry_id, base_note, &amounts)
            .map_err(|err| ToolError::InvalidParams(err.to_string()))?;
        let best_before = entry.get("best_before_date").and_then(Value::as_str);

        // Update the original entry in place with the first amount.
        let original = plan.original();
        let mut update = json!({
            "amount": original.amount,
            "note": original.note,
        });
        if let (Some(object), Some(date)) = (update.as_object_mut(), best_before) {
            object.insert("best_before_date".to_string(), json!(date));
        }
        if let Err(err) = self.client.put(&format!("/stock/entry/{entry_id}"), update).await {
            return Ok(shape::upstream_failure("update stock entry for split", &err));
        }

        // Create the remaining slices as new entries, degrading per item.
        let mut created = Vec::new();
        let mut errors = Vec::new();
        for slice in plan.additions() {
            let mut body = json!({
                "amount": slice.amount,
                "note": slice.note,
            });
            if let (Some(object), Some(date)) = (body.as_object_mut(), best_before) {
                object.insert("best_before_date".to_string(), json!(date));
            }
            match self.client.post(&format!("/stock/products/{product_id}/add"), body).await {
                Ok(response) => created.push(json!({
                    "amount": slice.amount,
                    "note": slice.note,
                    "result": response.data,
                })),
                Err(err) => errors.push(json!({
                    "amount": slice.amount,
                    "note": slice.note,
                    "error": err.to_string(),
                })),
            }
        }
        let mut summary = json!({
            "stockEntryId": entry_id,
            "productId": product_id,
            "updated": { "amount": original.amount, "note": original.note },
            "created": created,
        });
        if let (Some(object), false) = (summary.as_object_mut(), errors.is_empty()) {
            object.insert("errors".to_string(), json!(errors));
        }
        Ok(shape::success(&summary))
    }

    /// Handles `lookup_product` with a concurrent detail fan-out.
    async fn lookup(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let query =
            shape::require_str(args, "productName", "Provide the product name to look up.")?;
        let products = match self.client.get("/objects/products").await {
            Ok(response) => response.data,
            Err(err) => return Ok(shape::upstream_failure("look up product", &err)),
        };
        let products = products.as_array().cloned().unwrap_or_default();
        let names: Vec<String> = products
            .iter()
            .map(|product| {
                product.get("name").and_then(Value::as_str).unwrap_or_default().to_string()
            })
            .collect();
        let ranked = rank_names(&query, &names, LOOKUP_LIMIT);
        if ranked.is_empty() {
            return Ok(shape::success(&json!({
                "query": query,
                "matches": [],
                "message": "no matching products found",
            })));
        }
        let matches: Vec<Value> = ranked
            .iter()
            .filter_map(|hit| {
                products.get(hit.index).map(|product| {
                    json!({ "product": product, "distance": hit.distance })
                })
            })
            .collect();
        let top_product = products.get(ranked[0].index).cloned().unwrap_or(Value::Null);
        let top_id = top_product.get("id").and_then(Value::as_i64);

        // Resolve entries and locations concurrently; either side may fail
        // without taking down the lookup.
        let entries_call = async {
            match top_id {
                Some(id) => Some(self.client.get(&format!("/stock/products/{id}/entries")).await),
                None => None,
            }
        };
        let locations_call = self.client.get("/objects/locations");
        let (entries, locations) = tokio::join!(entries_call, locations_call);
        let entries_value = match entries {
            Some(Ok(response)) => response.data,
            Some(Err(err)) => json!({ "error": err.to_string() }),
            None => Value::Null,
        };
        let locations_value = match locations {
            Ok(response) => response.data,
            Err(err) => json!({ "error": err.to_string() }),
        };
        Ok(shape::success(&json!({
            "query": query,
            "matches": matches,
            "top_match": {
                "product": top_product,
                "stock_entries": entries_value,
                "locations": locations_value,
            },
        })))
    }

    /// Handles `print_stock_entry_label`.
    async fn print_label(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let stock_id = shape::require_i64(
            args,
            "stockId",
            "Use get_product_entries to find stock entry IDs.",
        )?;
        let _ = shape::require_i64(args, "productId", "Use get_products to find product IDs.")?;
        Ok(shape::api_call(
            &self.client,
            &format!("/stock/entry/{stock_id}/printlabel"),
            "print stock entry label",
            RequestOptions::default(),
        )
        .await)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds POST request options around a JSON body.
fn post_body(body: Value) -> RequestOptions {
    RequestOptions {
        method: HttpMethod::Post,
        body: Some(body),
        ..RequestOptions::default()
    }
}

/// Inserts an optional string field into a JSON object body.
fn insert_optional_str(body: &mut Value, key: &str, value: Option<String>) {
    if let (Some(object), Some(value)) = (body.as_object_mut(), value) {
        object.insert(key.to_string(), json!(value));
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

    use larder_client::UpstreamClient;
    use larder_config::ToolPolicyConfig;
    use larder_config::UpstreamConfig;

    use super::definitions;
    use super::module;

    /// Builds a client pointed at an unreachable placeholder host.
    fn offline_client() -> Arc<UpstreamClient> {
        let config = UpstreamConfig::default();
        Arc::new(UpstreamClient::from_config(&config).expect("client builds"))
    }

    #[test]
    fn module_definitions_and_handlers_are_one_to_one() {
        let module = module(&offline_client(), &ToolPolicyConfig::default());
        assert_eq!(module.definitions.len(), module.handlers.len());
        for definition in &module.definitions {
            assert!(
                module.handlers.iter().any(|(name, _)| *name == definition.name),
                "missing handler for {}",
                definition.name
            );
        }
    }

    #[test]
    fn purchase_schema_branches_on_require_price() {
        let relaxed = definitions(false);
        let strict = definitions(true);
        let find = |defs: &[crate::registry::ToolDefinition]| {
            defs.iter()
                .find(|def| def.name == "purchase_product")
                .map(|def| def.input_schema.required_names().to_vec())
                .expect("purchase_product present")
        };
        assert!(!find(&relaxed).contains(&"price".to_string()));
        assert!(find(&strict).contains(&"price".to_string()));
    }
}
