// larder-config/src/lib.rs
// ============================================================================
// Module: Larder Config Library
// Description: Canonical config model and validation for the Larder server.
// Purpose: Single source of truth for larder.toml semantics.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! `larder-config` defines the canonical configuration model for the Larder
//! MCP server: transport selection, upstream connection settings, and the
//! tool enablement policy. Validation is strict and fail-closed: a config
//! that references unknown options or malformed addresses never produces a
//! running server.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
