// larder-mcp/src/tools/mealplan.rs
// ============================================================================
// Module: Meal Plan Tools
// Description: Meal plan inspection and editing tools.
// Purpose: Shape meal plan tool calls into upstream object endpoints.
// Dependencies: larder-client, serde_json, tokio
// ============================================================================

//! ## Overview
//! `get_meal_plan` is the fan-out tool: it resolves every referenced
//! recipe concurrently alongside the section catalogue and reassembles the
//! results after all calls settle. A failed recipe fetch degrades to a
//! per-item placeholder; it never aborts the whole response.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use larder_client::HttpMethod;
use larder_client::RequestOptions;
use larder_client::UpstreamClient;
use serde_json::Value;
use serde_json::json;
use tokio::task::JoinSet;

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

/// Builds the meal plan tool module.
#[must_use]
pub fn module(client: &Arc<UpstreamClient>) -> ToolModule {
    let ops = [
        ("get_meal_plan", MealPlanOp::Plan),
        ("get_meal_plan_sections", MealPlanOp::Sections),
        ("add_recipe_to_meal_plan", MealPlanOp::Add),
        ("delete_recipe_from_meal_plan", MealPlanOp::Delete),
    ];
    ToolModule {
        definitions: definitions(),
        handlers: ops
            .into_iter()
            .map(|(name, op)| {
                (
                    name.to_string(),
                    Arc::new(MealPlanHandler {
                        client: Arc::clone(client),
                        op,
                    }) as Arc<dyn ToolHandler>,
                )
            })
            .collect(),
    }
}

/// Builds the meal plan tool definitions.
fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_meal_plan".to_string(),
            description: "Get the meal plan for a date with resolved recipe and section details. \
                          The returned id field of each entry works with \
                          delete_recipe_from_meal_plan."
                .to_string(),
            input_schema: InputSchema::object()
                .string("date", "Date in YYYY-MM-DD format")
                .require(&["date"]),
        },
        ToolDefinition {
            name: "get_meal_plan_sections".to_string(),
            description: "Get all meal plan sections (e.g. breakfast, lunch, dinner). Use this \
                          to find section IDs for add_recipe_to_meal_plan."
                .to_string(),
            input_schema: InputSchema::object(),
        },
        ToolDefinition {
            name: "add_recipe_to_meal_plan".to_string(),
            description: "Add a recipe to the meal plan. Use get_recipes for recipe IDs and \
                          get_meal_plan_sections for section IDs."
                .to_string(),
            input_schema: InputSchema::object()
                .number("recipeId", "ID of the recipe to plan")
                .string("day", "Day in YYYY-MM-DD format")
                .number("servings", "Servings to plan")
                .number("sectionId", "ID of the meal plan section")
                .require(&["recipeId", "day", "servings", "sectionId"]),
        },
        ToolDefinition {
            name: "delete_recipe_from_meal_plan".to_string(),
            description: "Delete one meal plan entry. Use get_meal_plan to find the entry ID."
                .to_string(),
            input_schema: InputSchema::object()
                .string("date", "Date of the entry in YYYY-MM-DD format")
                .number("mealPlanEntryId", "ID of the meal plan entry to delete")
                .require(&["date", "mealPlanEntryId"]),
        },
    ]
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Meal plan operations.
#[derive(Clone, Copy)]
enum MealPlanOp {
    /// Enriched plan for one date.
    Plan,
    /// Section catalogue.
    Sections,
    /// Plan insertion.
    Add,
    /// Plan entry deletion.
    Delete,
}

/// Meal plan tool handler bound to one operation.
struct MealPlanHandler {
    /// Shared upstream client.
    client: Arc<UpstreamClient>,
    /// Operation this instance performs.
    op: MealPlanOp,
}

#[async_trait]
impl ToolHandler for MealPlanHandler {
    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        match self.op {
            MealPlanOp::Plan => self.plan(&args).await,
            MealPlanOp::Sections => {
                Ok(shape::api_call(
                    &self.client,
                    "/objects/meal_plan_sections",
                    "get all meal plan sections",
                    RequestOptions::default(),
                )
                .await)
            }
            MealPlanOp::Add => self.add(&args).await,
            MealPlanOp::Delete => self.delete(&args).await,
        }
    }
}

impl MealPlanHandler {
    /// Handles `get_meal_plan` with a concurrent recipe/section fan-out.
    async fn plan(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let date = shape::require_str(args, "date", "Provide the date as YYYY-MM-DD.")?;
        let options = RequestOptions {
            query: vec![
                ("query[]".to_string(), format!("day={date}")),
                ("limit".to_string(), "100".to_string()),
            ],
            ..RequestOptions::default()
        };
        let entries = match self.client.request("/objects/meal_plan", options).await {
            Ok(response) => response.data,
            Err(err) => return Ok(shape::upstream_failure("get meal plan", &err)),
        };
        let entries = entries.as_array().cloned().unwrap_or_default();
        if entries.is_empty() {
            return Ok(shape::success(&json!({
                "message": "no meals planned for this date",
                "date": date,
                "meal_plan_entries": [],
            })));
        }

        // Resolve recipe details concurrently, one task per distinct id;
        // a failed fetch degrades to a placeholder for that recipe only.
        let recipe_ids: BTreeSet<i64> = entries
            .iter()
            .filter_map(|entry| entry.get("recipe_id").and_then(Value::as_i64))
            .collect();
        let mut fetches: JoinSet<(i64, Value)> = JoinSet::new();
        for recipe_id in &recipe_ids {
            let client = Arc::clone(&self.client);
            let recipe_id = *recipe_id;
            fetches.spawn(async move {
                match client.get(&format!("/objects/recipes/{recipe_id}")).await {
                    Ok(response) => (recipe_id, response.data),
                    Err(err) => (
                        recipe_id,
                        json!({
                            "name": format!("recipe {recipe_id} (details unavailable)"),
                            "error": err.to_string(),
                        }),
                    ),
                }
            });
        }
        let sections_call = self.client.get("/objects/meal_plan_sections");
        let (sections, recipes) = tokio::join!(sections_call, async {
            let mut recipes = BTreeMap::new();
            while let Some(joined) = fetches.join_next().await {
                if let Ok((recipe_id, value)) = joined {
                    recipes.insert(recipe_id, value);
                }
            }
            recipes
        });
        let sections = match sections {
            Ok(response) => response.data.as_array().cloned().unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        let sections_by_id: BTreeMap<i64, &Value> = sections
            .iter()
            .filter_map(|section| {
                section.get("id").and_then(Value::as_i64).map(|id| (id, section))
            })
            .collect();

        let enriched: Vec<Value> = entries
            .iter()
            .map(|entry| {
                let mut out = entry.clone();
                if let Some(object) = out.as_object_mut() {
                    let recipe_id = entry.get("recipe_id").and_then(Value::as_i64);
                    let details = recipe_id.and_then(|id| recipes.get(&id).cloned());
                    object.insert(
                        "recipe_details".to_string(),
                        details.unwrap_or_else(|| json!({ "name": "recipe not found" })),
                    );
                    let section_id = entry.get("section_id").and_then(Value::as_i64);
                    let section = section_id
                        .and_then(|id| sections_by_id.get(&id).map(|value| (*value).clone()));
                    object.insert(
                        "section_details".to_string(),
                        section.unwrap_or_else(|| json!({ "name": "section not found" })),
                    );
                }
                out
            })
            .collect();

        Ok(shape::success(&json!({
            "date": date,
            "meal_plan_entries": enriched,
            "all_available_meal_sections": sections,
        })))
    }

    /// Handles `add_recipe_to_meal_plan`.
    async fn add(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let recipe_id =
            shape::require_i64(args, "recipeId", "Use get_recipes to find recipe IDs.")?;
        let day = shape::require_str(args, "day", "Provide the day as YYYY-MM-DD.")?;
        let servings = shape::require_f64(args, "servings", "Specify the servings to plan.")?;
        let section_id = shape::require_i64(
            args,
            "sectionId",
            "Use get_meal_plan_sections to find section IDs.",
        )?;
        let body = json!({
            "day": day,
            "recipe_id": recipe_id,
            "recipe_servings": servings,
            "section_id": section_id,
            "type": "recipe",
        });
        Ok(shape::api_call(
            &self.client,
            "/objects/meal_plan",
            "add recipe to meal plan",
            RequestOptions {
                method: HttpMethod::Post,
                body: Some(body),
                ..RequestOptions::default()
            },
        )
        .await)
    }

    /// Handles `delete_recipe_from_meal_plan`.
    async fn delete(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let _ = shape::require_str(args, "date", "Provide the date as YYYY-MM-DD.")?;
        let entry_id = shape::require_i64(
            args,
            "mealPlanEntryId",
            "Use get_meal_plan to find the entry ID.",
        )?;
        Ok(shape::api_call(
            &self.client,
            &format!("/objects/meal_plan/{entry_id}"),
            "delete recipe from meal plan",
            RequestOptions {
                method: HttpMethod::Delete,
                ..RequestOptions::default()
            },
        )
        .await)
    }
}
