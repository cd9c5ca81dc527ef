// larder-client/src/lib.rs
// ============================================================================
// Module: Larder Client Library
// Description: Async REST client for the upstream household API.
// Purpose: Translate tool-handler requests into upstream HTTP calls.
// Dependencies: larder-config, reqwest, serde_json
// ============================================================================

//! ## Overview
//! `larder-client` wraps the upstream household API behind one capability:
//! `request(endpoint, options) -> ApiResponse | ApiError`. Every failure mode
//! the handlers care about (HTTP status, timeout, connection reset,
//! unreachable host) is a distinguishable [`ApiError`] variant. The static
//! API credential is attached here and never appears in errors or audit
//! events.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod client;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::NoopUpstreamAudit;
pub use audit::StderrUpstreamAudit;
pub use audit::UpstreamAuditSink;
pub use audit::UpstreamRequestEvent;
pub use client::API_KEY_HEADER;
pub use client::ApiError;
pub use client::ApiResponse;
pub use client::HttpMethod;
pub use client::RequestOptions;
pub use client::UpstreamClient;
