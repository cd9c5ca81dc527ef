// larder-mcp/src/tools/household.rs
// ============================================================================
// Module: Household Tools
// Description: Catalogue reads, chore/task/battery actions, and the escape
//              hatch for arbitrary upstream endpoints.
// Purpose: Shape household tool calls into upstream endpoints.
// Dependencies: larder-client, serde_json
// ============================================================================

//! ## Overview
//! Household tools split into simple catalogue reads (locations, quantity
//! units, users, chores, tasks, batteries, equipment), action tracking
//! (chore execution, task completion, battery charge, undo), and
//! `call_household_api`, the generic passthrough for endpoints without a
//! dedicated tool.

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

/// Builds the household tool module.
#[must_use]
pub fn module(client: &Arc<UpstreamClient>) -> ToolModule {
    let ops = [
        ("get_locations", HouseholdOp::Read("/objects/locations", "get all storage locations")),
        ("get_quantity_units", HouseholdOp::Read("/objects/quantity_units", "get all quantity units")),
        ("get_users", HouseholdOp::Read("/users", "get all users")),
        ("get_chores", HouseholdOp::Read("/objects/chores", "get all chores")),
        ("get_tasks", HouseholdOp::Read("/objects/tasks", "get all tasks")),
        ("get_batteries", HouseholdOp::Read("/objects/batteries", "get all batteries")),
        ("get_equipment", HouseholdOp::Read("/objects/equipment", "get all equipment")),
        ("track_chore_execution", HouseholdOp::TrackChore),
        ("complete_task", HouseholdOp::CompleteTask),
        ("charge_battery", HouseholdOp::ChargeBattery),
        ("undo_action", HouseholdOp::Undo),
        ("call_household_api", HouseholdOp::Passthrough),
    ];
    ToolModule {
        definitions: definitions(),
        handlers: ops
            .into_iter()
            .map(|(name, op)| {
                (
                    name.to_string(),
                    Arc::new(HouseholdHandler {
                        client: Arc::clone(client),
                        op,
                    }) as Arc<dyn ToolHandler>,
                )
            })
            .collect(),
    }
}

/// Builds the household tool definitions.
fn definitions() -> Vec<ToolDefinition> {
    let catalogue_reads = [
        ("get_locations", "Get all storage locations. Use this to find location IDs for tools \
                           that take a locationId."),
        ("get_quantity_units", "Get all quantity units."),
        ("get_users", "Get all users."),
        ("get_chores", "Get all chores."),
        ("get_tasks", "Get all tasks."),
        ("get_batteries", "Get all batteries."),
        ("get_equipment", "Get all equipment."),
    ];
    let mut definitions: Vec<ToolDefinition> = catalogue_reads
        .into_iter()
        .map(|(name, description)| ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: InputSchema::object(),
        })
        .collect();
    definitions.push(ToolDefinition {
        name: "track_chore_execution".to_string(),
        description: "Track execution of a chore. Use get_chores for chore IDs and get_users for \
                      user IDs."
            .to_string(),
        input_schema: InputSchema::object()
            .number("choreId", "ID of the chore that was executed")
            .number("executedBy", "ID of the user who executed the chore")
            .string("trackedTime", "Execution time in YYYY-MM-DD HH:MM:SS format (default: now)")
            .string("note", "Optional note")
            .require(&["choreId"]),
    });
    definitions.push(ToolDefinition {
        name: "complete_task".to_string(),
        description: "Mark a task as completed. Use get_tasks to find the task ID.".to_string(),
        input_schema: InputSchema::object()
            .number("taskId", "ID of the task to complete")
            .string("note", "Optional note")
            .require(&["taskId"]),
    });
    definitions.push(ToolDefinition {
        name: "charge_battery".to_string(),
        description: "Track charging of a battery. Use get_batteries to find the battery ID."
            .to_string(),
        input_schema: InputSchema::object()
            .number("batteryId", "ID of the battery that was charged")
            .string("trackedTime", "Charge time in YYYY-MM-DD HH:MM:SS format (default: now)")
            .string("note", "Optional note")
            .require(&["batteryId"]),
    });
    definitions.push(ToolDefinition {
        name: "undo_action".to_string(),
        description: "Undo a chore execution, battery charge cycle, or task completion."
            .to_string(),
        input_schema: InputSchema::object()
            .string_enum("entityType", "Type of entity to undo", &["chores", "batteries", "tasks"])
            .string("id", "ID of the execution, charge cycle, or task")
            .require(&["entityType", "id"]),
    });
    definitions.push(ToolDefinition {
        name: "call_household_api".to_string(),
        description: "Call any upstream endpoint with custom parameters. Prefer the dedicated \
                      tools; they validate arguments first."
            .to_string(),
        input_schema: InputSchema::object()
            .string("endpoint", "Endpoint to call, e.g. \"objects/products\" (no /api prefix)")
            .string_enum("method", "HTTP method to use", &["GET", "POST", "PUT", "DELETE"])
            .object_property("body", "Optional request body for POST/PUT requests")
            .require(&["endpoint"]),
    });
    definitions
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Household operations.
#[derive(Clone, Copy)]
enum HouseholdOp {
    /// Plain catalogue read: endpoint and action label.
    Read(&'static str, &'static str),
    /// Chore execution tracking.
    TrackChore,
    /// Task completion.
    CompleteTask,
    /// Battery charge tracking.
    ChargeBattery,
    /// Undo across entity types.
    Undo,
    /// Generic endpoint passthrough.
    Passthrough,
}

/// Household tool handler bound to one operation.
struct HouseholdHandler {
    /// Shared upstream client.
    client: Arc<UpstreamClient>,
    /// Operation this instance performs.
    op: HouseholdOp,
}

#[async_trait]
impl ToolHandler for HouseholdHandler {
    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        match self.op {
            HouseholdOp::Read(endpoint, action) => {
                Ok(shape::api_call(&self.client, endpoint, action, RequestOptions::default())
                    .await)
            }
            HouseholdOp::TrackChore => self.track_chore(&args).await,
            HouseholdOp::CompleteTask => self.complete_task(&args).await,
            HouseholdOp::ChargeBattery => self.charge_battery(&args).await,
            HouseholdOp::Undo => self.undo(&args).await,
            HouseholdOp::Passthrough => self.passthrough(&args).await,
        }
    }
}

impl HouseholdHandler {
    /// Handles `track_chore_execution`.
    async fn track_chore(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let chore_id = shape::require_i64(args, "choreId", "Use get_chores to find chore IDs.")?;
        let tracked =
            shape::optional_str(args, "trackedTime").unwrap_or_else(shape::now_timestamp);
        let mut body = json!({ "tracked_time": tracked });
        if let (Some(object), Some(user)) =
            (body.as_object_mut(), shape::optional_i64(args, "executedBy"))
        {
            object.insert("done_by".to_string(), json!(user));
        }
        if let (Some(object), Some(note)) =
            (body.as_object_mut(), shape::optional_str(args, "note"))
        {
            object.insert("note".to_string(), json!(note));
        }
        Ok(shape::api_call(
            &self.client,
            &format!("/chores/{chore_id}/execute"),
            "track chore execution",
            post_body(body),
        )
        .await)
    }

    /// Handles `complete_task`.
    async fn complete_task(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let task_id = shape::require_i64(args, "taskId", "Use get_tasks to find task IDs.")?;
        let body = shape::optional_str(args, "note")
            .map_or_else(|| json!({}), |note| json!({ "note": note }));
        Ok(shape::api_call(
            &self.client,
            &format!("/tasks/{task_id}/complete"),
            "complete task",
            post_body(body),
        )
        .await)
    }

    /// Handles `charge_battery`.
    async fn charge_battery(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let battery_id =
            shape::require_i64(args, "batteryId", "Use get_batteries to find battery IDs.")?;
        let tracked =
            shape::optional_str(args, "trackedTime").unwrap_or_else(shape::now_timestamp);
        let mut body = json!({ "tracked_time": tracked });
        if let (Some(object), Some(note)) =
            (body.as_object_mut(), shape::optional_str(args, "note"))
        {
            object.insert("note".to_string(), json!(note));
        }
        Ok(shape::api_call(
            &self.client,
            &format!("/batteries/{battery_id}/charge"),
            "charge battery",
            post_body(body),
        )
        .await)
    }

    /// Handles `undo_action` across the three entity types.
    async fn undo(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let entity = shape::require_str(
            args,
            "entityType",
            "Use one of: chores, batteries, tasks.",
        )?;
        let id = shape::require_str(args, "id", "Provide the execution, cycle, or task ID.")?;
        let endpoint = match entity.to_lowercase().as_str() {
            "chore" | "chores" => format!("/chores/executions/{id}/undo"),
            "battery" | "batteries" => format!("/batteries/charge-cycles/{id}/undo"),
            "task" | "tasks" => format!("/tasks/{id}/undo"),
            other => {
                return Ok(shape::failure(
                    &format!("unsupported entity type: {other}"),
                    Some(json!({ "supported": ["chores", "batteries", "tasks"] })),
                ));
            }
        };
        Ok(shape::api_call(
            &self.client,
            &endpoint,
            &format!("undo {entity} action"),
            post_body(json!({})),
        )
        .await)
    }

    /// Handles `call_household_api`.
    async fn passthrough(&self, args: &Value) -> Result<ToolResult, ToolError> {
        let endpoint = shape::require_str(
            args,
            "endpoint",
            "Provide the endpoint path, e.g. \"objects/products\".",
        )?;
        let method = match shape::optional_str(args, "method").as_deref() {
            None | Some("GET") => HttpMethod::Get,
            Some("POST") => HttpMethod::Post,
            Some("PUT") => HttpMethod::Put,
            Some("DELETE") => HttpMethod::Delete,
            Some(other) => {
                return Err(ToolError::InvalidParams(format!(
                    "method must be one of GET, POST, PUT, DELETE; got {other}"
                )));
            }
        };
        let body = args.get("body").filter(|value| !value.is_null()).cloned();
        // Strip any /api prefix the caller included; the client adds it back.
        let clean = endpoint.trim_start_matches('/');
        let clean = clean.strip_prefix("api/").unwrap_or(clean);
        Ok(shape::api_call(
            &self.client,
            &format!("/{clean}"),
            &format!("call household api endpoint {clean}"),
            RequestOptions {
                method,
                body,
                ..RequestOptions::default()
            },
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

// ============================================================================
// SECTION: Tests
// ============================================================================
