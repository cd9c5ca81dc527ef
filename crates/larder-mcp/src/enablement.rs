// larder-mcp/src/enablement.rs
// ============================================================================
// Module: Tool Enablement Policy
// Description: Per-tool opt-in policy computed once at startup.
// Purpose: Decide which registered tools are visible and invocable.
// Dependencies: larder-config
// ============================================================================

//! ## Overview
//! Enablement is explicit opt-in and fail-closed: a tool is reachable iff
//! its name appears in `tools.enabled`. The policy is validated against the
//! registry's full name set at startup; an unknown name is a fatal error,
//! never a silent ignore. Listing and invocation consult the same predicate,
//! so a tool can never be listed but rejected (or vice versa).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use larder_config::ToolPolicyConfig;
use thiserror::Error;

use crate::registry::ToolRegistry;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Enablement policy errors.
#[derive(Debug, Error)]
pub enum EnablementError {
    /// Configuration references tool names the registry does not know.
    #[error("unknown tool names in configuration: {unknown}; valid tool names are: {valid}")]
    UnknownTools {
        /// Offending names, comma separated.
        unknown: String,
        /// Sorted valid names, comma separated.
        valid: String,
    },
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Effective enablement state for one server instance.
///
/// # Invariants
/// - Every name in `enabled` and `options` exists in the registry.
/// - State is immutable after construction and shared across sessions.
#[derive(Debug)]
pub struct EnablementPolicy {
    /// Names of tools reachable by clients.
    enabled: BTreeSet<String>,
    /// Per-tool boolean option flags.
    options: BTreeMap<String, BTreeMap<String, bool>>,
}

impl EnablementPolicy {
    /// Computes the policy from configuration, validating every name.
    ///
    /// # Errors
    ///
    /// Returns [`EnablementError::UnknownTools`] when `tools.enabled` or
    /// `tools.options` references a name outside the registry.
    pub fn from_config(
        config: &ToolPolicyConfig,
        registry: &ToolRegistry,
    ) -> Result<Self, EnablementError> {
        let known: BTreeSet<String> = registry.tool_names().into_iter().collect();
        let mut unknown: Vec<&str> = config
            .enabled
            .iter()
            .map(String::as_str)
            .filter(|name| !known.contains(*name))
            .collect();
        unknown.extend(
            config.options.keys().map(String::as_str).filter(|name| !known.contains(*name)),
        );
        if !unknown.is_empty() {
            unknown.sort_unstable();
            unknown.dedup();
            let valid: Vec<&str> = known.iter().map(String::as_str).collect();
            return Err(EnablementError::UnknownTools {
                unknown: unknown.join(", "),
                valid: valid.join(", "),
            });
        }
        Ok(Self {
            enabled: config.enabled.iter().cloned().collect(),
            options: config.options.clone(),
        })
    }

    /// Builds a policy that enables every registered tool (test fixtures).
    #[must_use]
    pub fn allow_all(registry: &ToolRegistry) -> Self {
        Self {
            enabled: registry.tool_names().into_iter().collect(),
            options: BTreeMap::new(),
        }
    }

    /// Returns whether a tool is reachable under this policy.
    #[must_use]
    pub fn is_allowed(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    /// Returns the number of enabled tools.
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.enabled.len()
    }

    /// Returns the boolean option flags configured for a tool.
    #[must_use]
    pub fn tool_options(&self, name: &str) -> BTreeMap<String, bool> {
        self.options.get(name).cloned().unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
