// larder-mcp/src/tools/mod.rs
// ============================================================================
// Module: Tool Catalogue
// Description: Topical tool modules and shared handler plumbing.
// Purpose: Assemble the full catalogue for registry construction.
// Dependencies: larder-client, larder-config
// ============================================================================

//! ## Overview
//! Tools are grouped into topical modules: stock, products, recipes,
//! shopping, meal plan, and household. Each module contributes definitions
//! and handlers; [`modules`] assembles them in stable registration order.
//! Shared plumbing lives in [`shape`] as free functions, the stock-entry
//! split algorithm in [`split`], and the fuzzy product ranking in
//! [`lookup`].
//!
//! Definitions are built by per-module factory functions of the tool
//! options, so a schema can branch on configuration.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod household;
pub mod lookup;
pub mod mealplan;
pub mod products;
pub mod recipes;
pub mod shape;
pub mod shopping;
pub mod split;
pub mod stock;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use larder_client::UpstreamClient;
use larder_config::ToolPolicyConfig;

use crate::registry::ToolModule;

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Builds every tool module in registration order.
#[must_use]
pub fn modules(client: &Arc<UpstreamClient>, policy: &ToolPolicyConfig) -> Vec<ToolModule> {
    vec![
        stock::module(client, policy),
        products::module(client),
        recipes::module(client, policy),
        shopping::module(client),
        mealplan::module(client),
        household::module(client),
    ]
}
