// larder-mcp/src/tools/shape.rs
// ============================================================================
// Module: Result Shaping Helpers
// Description: Free functions shared by every tool handler.
// Purpose: Shape upstream responses and decode untyped tool arguments.
// Dependencies: larder-client, serde_json, time
// ============================================================================

//! ## Overview
//! Handlers compose these free functions instead of inheriting from a base
//! type. [`success`] and [`failure`] build the two tool-result shapes;
//! [`api_call`] is the common fetch-and-shape path; the `require_*` and
//! `optional_*` helpers decode untyped arguments, failing fast with
//! messages that name the missing parameter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use larder_client::ApiError;
use larder_client::RequestOptions;
use larder_client::UpstreamClient;
use serde_json::Value;
use serde_json::json;
use time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::registry::ContentBlock;
use crate::registry::ToolError;
use crate::registry::ToolResult;

// ============================================================================
// SECTION: Result Shaping
// ============================================================================

/// Pretty-prints a value, degrading to a shaped error document.
#[must_use]
pub fn pretty(data: &Value) -> String {
    serde_json::to_string_pretty(data)
        .unwrap_or_else(|_| "{\n  \"error\": \"error formatting response data\"\n}".to_string())
}

/// Builds a success result wrapping pretty-printed JSON.
#[must_use]
pub fn success(data: &Value) -> ToolResult {
    ToolResult {
        content: vec![ContentBlock::Text {
            text: pretty(data),
        }],
        is_error: false,
    }
}

/// Builds a failure result with an error message and optional context.
#[must_use]
pub fn failure(message: &str, context: Option<Value>) -> ToolResult {
    let mut body = json!({ "error": message });
    if let (Some(object), Some(context)) = (body.as_object_mut(), context) {
        object.insert("context".to_string(), context);
    }
    ToolResult {
        content: vec![ContentBlock::Text {
            text: pretty(&body),
        }],
        is_error: true,
    }
}

/// Builds a failure result for an upstream error, with attribution.
#[must_use]
pub fn upstream_failure(action: &str, error: &ApiError) -> ToolResult {
    failure(&format!("Failed to {action}: {error}"), None)
}

/// Issues an upstream call and shapes the outcome into a tool result.
pub async fn api_call(
    client: &UpstreamClient,
    endpoint: &str,
    action: &str,
    options: RequestOptions,
) -> ToolResult {
    match client.request(endpoint, options).await {
        Ok(response) => success(&response.data),
        Err(err) => upstream_failure(action, &err),
    }
}

// ============================================================================
// SECTION: Argument Decoding
// ============================================================================

/// Decodes a required integer argument.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] naming the parameter when absent.
pub fn require_i64(args: &Value, name: &str, hint: &str) -> Result<i64, ToolError> {
    args.get(name).and_then(Value::as_i64).ok_or_else(|| missing(name, hint))
}

/// Decodes a required numeric argument.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] naming the parameter when absent.
pub fn require_f64(args: &Value, name: &str, hint: &str) -> Result<f64, ToolError> {
    args.get(name).and_then(Value::as_f64).ok_or_else(|| missing(name, hint))
}

/// Decodes a required string argument.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] naming the parameter when absent
/// or blank.
pub fn require_str(args: &Value, name: &str, hint: &str) -> Result<String, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| missing(name, hint))
}

/// Decodes a required non-empty array of strings.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] naming the parameter when absent,
/// empty, or carrying non-string items.
pub fn require_str_array(args: &Value, name: &str, hint: &str) -> Result<Vec<String>, ToolError> {
    let items = args.get(name).and_then(Value::as_array).ok_or_else(|| missing(name, hint))?;
    if items.is_empty() {
        return Err(missing(name, hint));
    }
    items
        .iter()
        .map(|item| item.as_str().map(ToString::to_string))
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| missing(name, hint))
}

/// Decodes a required non-empty array of numbers.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] naming the parameter when absent,
/// empty, or carrying non-numeric items.
pub fn require_f64_array(args: &Value, name: &str, hint: &str) -> Result<Vec<f64>, ToolError> {
    let items = args.get(name).and_then(Value::as_array).ok_or_else(|| missing(name, hint))?;
    if items.is_empty() {
        return Err(missing(name, hint));
    }
    items
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| missing(name, hint))
}

/// Decodes an optional integer argument.
#[must_use]
pub fn optional_i64(args: &Value, name: &str) -> Option<i64> {
    args.get(name).and_then(Value::as_i64)
}

/// Decodes an optional numeric argument with a default.
#[must_use]
pub fn optional_f64(args: &Value, name: &str, default: f64) -> f64 {
    args.get(name).and_then(Value::as_f64).unwrap_or(default)
}

/// Decodes an optional string argument.
#[must_use]
pub fn optional_str(args: &Value, name: &str) -> Option<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToString::to_string)
}

/// Decodes an optional boolean argument with a default.
#[must_use]
pub fn optional_bool(args: &Value, name: &str, default: bool) -> bool {
    args.get(name).and_then(Value::as_bool).unwrap_or(default)
}

/// Builds the invalid-params error for a missing argument.
fn missing(name: &str, hint: &str) -> ToolError {
    if hint.is_empty() {
        ToolError::InvalidParams(format!("{name} is required"))
    } else {
        ToolError::InvalidParams(format!("{name} is required. {hint}"))
    }
}

// ============================================================================
// SECTION: Date Helpers
// ============================================================================

/// Returns today plus one year as `YYYY-MM-DD` (default best-before date).
#[must_use]
pub fn default_best_before_date() -> String {
    let date = OffsetDateTime::now_utc().date() + Duration::days(365);
    date.format(format_description!("[year]-[month]-[day]")).unwrap_or_default()
}

/// Returns the current time as `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn now_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default()
}

/// Returns yesterday as `YYYY-MM-DD`.
#[must_use]
pub fn yesterday() -> String {
    (OffsetDateTime::now_utc().date() - Duration::days(1))
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
