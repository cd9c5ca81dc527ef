// larder-mcp/src/tools/recipes.rs
// ============================================================================
// Module: Recipe Tools
// Description: Recipe inspection, creation, and cooking workflow tools.
// Purpose: Shape recipe tool calls into upstream recipe endpoints.
// Dependencies: larder-client, serde_json
// ============================================================================

//! ## Overview
//! Recipe tools cover listing and fulfillment queries plus the cooking
//! workflow. `mark_recipe_as_cooked` is the one composite flow: it locates
//! the undone meal plan entry, marks it done, consumes the recipe, and,
//! when the `portion_on_cook` option is set, splits the produced stock
//! entry into per-serving portions using the shared split planner.

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
use crate::tools::shape;
use crate::tools::split::plan_even_split;

// ============================================================================
// SECTION: Module Assembly
// ============================================================================

/// Builds the recipe tool module.
#[must_use]
pub fn module(client: &Arc<UpstreamClient>, policy: &ToolPolicyConfig) -> ToolModule {
    let portion_on_cook =
        policy.tool_options("mark_recipe_as_cooked").get("portion_on_cook").copied().unwrap_or(false);
    let ops = [
        ("get_recipes", RecipeOp::Recipes),
        ("get_recipe_by_id", RecipeOp::ById),
        ("create_recipe", RecipeOp::Create),
        ("get_recipe_fulfillment", RecipeOp::Fulfillment),
        ("get_recipes_fulfillment", RecipeOp::AllFulfillment),
        ("consume_recipe", RecipeOp::Consume),
        ("add_missing_products_to_shopping_list", RecipeOp::AddMissing),
        (
            "mark_recipe_as_cooked",
            RecipeOp::MarkCooked {
                portion_on_cook,
            },
        ),
    ];
    ToolModule {
        definitions: definitions(),
        handlers: ops
            .into_iter()
            .map(|(name, op)| {
                (
                    name.to_string(),
                    Arc::new(RecipeHandler {
                        client: Arc::clone(client),
                        op,
                    }) as Arc<dyn ToolHandler>,
                )
            })
            .collect(),
    }
}

/// Builds the recipe tool definitions.
fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_recipes".to_string(),
            description: "Get all normal recipes, projected to the requested fields (for example \
                          [\"id\", \"name\"])."
                .to_string(),
            input_schema: InputSchema::object()
                .string_array("fields", "Field names to include for each recipe")
                .require(&["fields"]),
        },
        ToolDefinition {
            name: "get_recipe_by_id".to_string(),
            description: "Get a single recipe by ID. Use get_recipes to find recipe IDs."
                .to_string(),
            input_schema: InputSchema::object()
                .number("recipeId", "ID of the recipe")
                .require(&["recipeId"]),
        },
        ToolDefinition {
            name: "create_recipe".to_string(),
            description: "Create a new recipe.".to_string(),
            input_schema: InputSchema::object()
                .string("name", "Name of the recipe")
                .string("description", "Recipe description (may be empty)")
                .number("servings", "Base servings (default: 1)")
                .number("desiredServings", "Desired servings (default: 1)")
                .require(&["name"]),
        },
        ToolDefinition {
            name: "get_recipe_fulfillment".to_string(),
            description: "Check whether stock fulfills a recipe's ingredients.".to_string(),
            input_schema: InputSchema::object()
                .number("recipeId", "ID of the recipe")
                .number("servings", "Servings to check for (default: 1)")
                .require(&["recipeId"]),
        },
        ToolDefinition {
            name: "get_recipes_fulfillment".to_string(),
            description: "Check stock fulfillment for every recipe at once.".to_string(),
            input_schema: InputSchema::object(),
        },
        ToolDefinition {
            name: "consume_recipe".to_string(),
            description: "Consume a recipe's ingredients from stock.".to_string(),
            input_schema: InputSchema::object()
                .number("recipeId", "ID of the recipe to consume")
                .number("servings", "Servings to consume (default: 1)")
                .require(&["recipeId"]),
        },
        ToolDefinition {
            name: "add_missing_products_to_shopping_list".to_string(),
            description: "Add a recipe's unfulfilled products to a shopping list.".to_string(),
            input_schema: InputSchema::object()
                .number("recipeId", "ID of the recipe")
                .number("servings", "Servings to plan for (default: 1)")
                .number("shoppingListId", "Target shopping list (default: 1)")
                .require(&["recipeId"]),
        },
        ToolDefinition {
            name: "mark_recipe_as_cooked".to_string(),
            description: "Mark a planned recipe as cooked: finds the undone meal plan entry \
                          (searching from yesterday), marks it done, and consumes the recipe's \
                          ingredients. Use get_recipes to find recipe IDs."
                .to_string(),
            input_schema: InputSchema::object()
                .number("recipeId", "ID of the recipe that was cooked")
                .number("servings", "Servings that were cooked")
                .require(&["recipeId", "servings"]),
        },
    ]
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Recipe operations.
#[derive(Clone, Copy)]
enum RecipeOp {
    /// Projected recipe listing.
    Recipes,
    /// Single recipe by ID.
    ById,
    /// Recipe creation.
    Create,
    /// Fulfillment for one recipe.
    Fulfillment,
    /// Fulfillment for all recipes.
    AllFulfillment,
    /// Ingredient consumption.
    Consume,
    /// Shopping list completion.
    AddMissing,
    /// Cooking workflow; `portion_on_cook` mirrors the tool option.
    MarkCooked {
        /// Whether the produced stock entry is split into portions.
        portion_on_cook: bool,
    },
}

/// Recipe tool handler bound to one operation.
struct RecipeHandler {
    /// Shared upstream client.
    client: Arc<UpstreamClient>,
    /// Operation this instance performs.
    op: RecipeOp,
}

#[async_trait]
impl ToolHandler for RecipeHandler {
    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        match self.op {
            RecipeOp::Recipes => self.recipes(&args).await,
            RecipeOp::ById => self.by_id(&args).await,
            RecipeOp::Create => self.create(&args).await,
            RecipeOp::Fulfillment => self.fulfillment(&args).await,
            RecipeOp::AllFulfillment => {
                Ok(shape::api_call(
                    &self.client,
                    "/recipes/fulfillment",
                    "get all recipes fulfillment",
                    RequestOptions::default(),
                )
                .await)
            }
            RecipeOp::Consume => self.consume(&args).await,
            RecipeOp::AddMissing => self.add_missing(&args).await,
            RecipeOp::MarkCooked {
                portion_on_cook,
            } => self.mark_cooked(&args, portion_on_cook).await,
        }
    }
}

impl RecipeHandler {
    /// Handles `get_recipes` with field projection.
    async fn recipes(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let fields = shape::require_str_array(
            args,
            "fields",
            "Pass a non-empty array of field names, e.g. [\"id\", \"name\"].",
        )?;
        let options = RequestOptions {
            query: vec![("query[]".to_string(), "type=normal".to_string())],
            ..RequestOptions::default()
        };
        let recipes = match self.client.request("/objects/recipes", options).await {
            Ok(response) => response.data,
            Err(err) => return Ok(shape::upstream_failure("get recipes", &err)),
        };
        let Some(recipes) = recipes.as_array() else {
            return Ok(shape::success(&json!([])));
        };
        let projected: Vec<Value> = recipes
            .iter()
            .map(|recipe| {
                let mut out = serde_json::Map::new();
                for field in &fields {
                    if let Some(value) = recipe.get(field) {
                        out.insert(field.clone(), value.clone());
                    }
                }
                Value::Object(out)
            })
            .collect();
        Ok(shape::success(&Value::Array(projected)))
    }

    /// Handles `get_recipe_by_id`.
    async fn by_id(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let recipe_id =
            shape::require_i64(args, "recipeId", "Use get_recipes to find recipe IDs.")?;
        Ok(shape::api_call(
            &self.client,
            &format!("/objects/recipes/{recipe_id}"),
            "get recipe by id",
            RequestOptions::default(),
        )
        .await)
    }

    /// Handles `create_recipe`.
    async fn create(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let name = shape::require_str(args, "name", "Provide the recipe name.")?;
        let body = json!({
            "name": name,
            "description": shape::optional_str(args, "description").unwrap_or_default(),
            "base_servings": shape::optional_f64(args, "servings", 1.0),
            "desired_servings": shape::optional_f64(args, "desiredServings", 1.0),
        });
        Ok(shape::api_call(
            &self.client,
            "/objects/recipes",
            "create recipe",
            RequestOptions {
                method: HttpMethod::Post,
                body: Some(body),
                ..RequestOptions::default()
            },
        )
        .await)
    }

    /// Handles `get_recipe_fulfillment`.
    async fn fulfillment(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let recipe_id =
            shape::require_i64(args, "recipeId", "Use get_recipes to find recipe IDs.")?;
        let servings = shape::optional_f64(args, "servings", 1.0);
        let mut options = RequestOptions::default();
        if (servings - 1.0).abs() > f64::EPSILON {
            options.query.push(("servings".to_string(), servings.to_string()));
        }
        Ok(shape::api_call(
            &self.client,
            &format!("/recipes/{recipe_id}/fulfillment"),
            "get recipe fulfillment",
            options,
        )
        .await)
    }

    /// Handles `consume_recipe`.
    async fn consume(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let recipe_id =
            shape::require_i64(args, "recipeId", "Use get_recipes to find recipe IDs.")?;
        let servings = shape::optional_f64(args, "servings", 1.0);
        Ok(shape::api_call(
            &self.client,
            &format!("/recipes/{recipe_id}/consume"),
            "consume recipe",
            RequestOptions {
                method: HttpMethod::Post,
                body: Some(json!({ "recipe_id": recipe_id, "servings": servings })),
                ..RequestOptions::default()
            },
        )
        .await)
    }

    /// Handles `add_missing_products_to_shopping_list`.
    async fn add_missing(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let recipe_id =
            shape::require_i64(args, "recipeId", "Use get_recipes to find recipe IDs.")?;
        let body = json!({
            "servings": shape::optional_f64(args, "servings", 1.0),
            "shopping_list_id": shape::optional_i64(args, "shoppingListId").unwrap_or(1),
        });
        Ok(shape::api_call(
            &self.client,
            &format!("/recipes/{recipe_id}/add-not-fulfilled-products-to-shoppinglist"),
            "add missing products to shopping list",
            RequestOptions {
                method: HttpMethod::Post,
                body: Some(body),
                ..RequestOptions::default()
            },
        )
        .await)
    }

    /// Handles `mark_recipe_as_cooked`.
    async fn mark_cooked(
        &self,
        args: &Value,
        portion_on_cook: bool,
    ) -> Result<ToolResult, ToolError> {
        let recipe_id =
            shape::require_i64(args, "recipeId", "Use get_recipes to find recipe IDs.")?;
        let servings =
            shape::require_f64(args, "servings", "Specify the number of servings cooked.")?;

        // Find the undone meal plan entry for this recipe, searching from
        // yesterday so late logging still matches.
        let search_from = shape::yesterday();
        let options = RequestOptions {
            query: vec![
                ("query[]".to_string(), format!("day>={search_from}")),
                ("limit".to_string(), "100".to_string()),
            ],
            ..RequestOptions::default()
        };
        let plan_entries = match self.client.request("/objects/meal_plan", options).await {
            Ok(response) => response.data,
            Err(err) => return Ok(shape::upstream_failure("mark recipe as cooked", &err)),
        };
        let plan_entries = plan_entries.as_array().cloned().unwrap_or_default();
        let Some(entry) = plan_entries.iter().find(|entry| {
            entry.get("recipe_id").and_then(Value::as_i64) == Some(recipe_id)
                && entry.get("done").and_then(Value::as_i64).unwrap_or(0) == 0
        }) else {
            return Ok(shape::failure(
                &format!(
                    "no undone meal plan entry found for recipe {recipe_id} starting from \
                     {search_from}; plan the recipe before marking it as cooked"
                ),
                Some(json!({ "recipeId": recipe_id, "searchFrom": search_from })),
            ));
        };
        let Some(entry_id) = entry.get("id").and_then(Value::as_i64) else {
            return Ok(shape::failure(
                "meal plan entry has no id field",
                Some(json!({ "recipeId": recipe_id })),
            ));
        };

        // Mark the meal plan entry as done.
        let mut done_entry = entry.clone();
        if let Some(object) = done_entry.as_object_mut() {
            object.insert("done".to_string(), json!(1));
        }
        if let Err(err) =
            self.client.put(&format!("/objects/meal_plan/{entry_id}"), done_entry).await
        {
            return Ok(shape::upstream_failure("mark meal plan entry as done", &err));
        }

        // Consume the recipe's ingredients.
        if let Err(err) = self
            .client
            .post(&format!("/recipes/{recipe_id}/consume"), json!({ "servings": servings }))
            .await
        {
            return Ok(shape::failure(
                &format!("meal plan entry {entry_id} marked done, but consuming recipe \
                          {recipe_id} failed: {err}"),
                Some(json!({ "recipeId": recipe_id, "mealPlanEntryId": entry_id })),
            ));
        }

        // Optionally portion the produced stock entry, best effort.
        let portioning = if portion_on_cook {
            self.portion_cooked_product(recipe_id, servings).await
        } else {
            Value::Null
        };

        Ok(shape::success(&json!({
            "message": format!(
                "recipe {recipe_id} marked as cooked ({servings} servings consumed), meal plan \
                 entry {entry_id} marked as done"
            ),
            "recipeId": recipe_id,
            "servings": servings,
            "mealPlanEntry": { "id": entry_id, "day": entry.get("day"), "marked": true },
            "portioning": portioning,
        })))
    }

    /// Splits the newest stock entry of the recipe's product into equal
    /// per-serving portions. Failures degrade to an annotation.
    async fn portion_cooked_product(&self, recipe_id: i64, servings: f64) -> Value {
        let recipe = match self.client.get(&format!("/objects/recipes/{recipe_id}")).await {
            Ok(response) => response.data,
            Err(err) => return json!({ "error": format!("recipe fetch failed: {err}") }),
        };
        let Some(product_id) = recipe.get("product_id").and_then(Value::as_i64) else {
            return json!({ "skipped": "recipe has no linked product" });
        };
        let entries =
            match self.client.get(&format!("/stock/products/{product_id}/entries")).await {
                Ok(response) => response.data,
                Err(err) => return json!({ "error": format!("entry fetch failed: {err}") }),
            };
        let Some(newest) = entries.as_array().and_then(|items| items.first()) else {
            return json!({ "skipped": "no stock entries for the cooked product" });
        };
        let Some(entry_id) = newest.get("id").and_then(Value::as_i64) else {
            return json!({ "skipped": "stock entry has no id field" });
        };
        let total = newest.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
        let note = newest.get("note").and_then(Value::as_str).unwrap_or_default();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "Serving counts are small positive numbers."
        )]
        let portions = servings.max(1.0).round() as usize;
        let plan = match plan_even_split(entry_id, note, total, portions) {
            Ok(plan) => plan,
            Err(err) => return json!({ "skipped": err.to_string() }),
        };
        let original = plan.original();
        if let Err(err) = self
            .client
            .put(
                &format!("/stock/entry/{entry_id}"),
                json!({ "amount": original.amount, "note": original.note }),
            )
            .await
        {
            return json!({ "error": format!("portion update failed: {err}") });
        }
        let mut created = 0usize;
        let mut errors = Vec::new();
        for slice in plan.additions() {
            let body = json!({ "amount": slice.amount, "note": slice.note });
            match self.client.post(&format!("/stock/products/{product_id}/add"), body).await {
                Ok(_) => created += 1,
                Err(err) => errors.push(err.to_string()),
            }
        }
        let mut out = json!({ "entryId": entry_id, "portions": portions, "created": created });
        if let (Some(object), false) = (out.as_object_mut(), errors.is_empty()) {
            object.insert("errors".to_string(), json!(errors));
        }
        out
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

    use super::module;

    #[test]
    fn module_definitions_and_handlers_are_one_to_one() {
        let client =
            Arc::new(UpstreamClient::from_config(&UpstreamConfig::default()).expect("client"));
        let module = module(&client, &ToolPolicyConfig::default());
        assert_eq!(module.definitions.len(), module.handlers.len());
        for definition in &module.definitions {
            assert!(module.handlers.iter().any(|(name, _)| *name == definition.name));
        }
    }
}
