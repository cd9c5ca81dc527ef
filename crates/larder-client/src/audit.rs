// larder-client/src/audit.rs
// ============================================================================
// Module: Upstream Audit Logging
// Description: Structured audit events for upstream HTTP requests.
// Purpose: Emit redacted request logs without hard dependencies.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for upstream request
//! logging. Events carry method, normalized path, outcome, and timing only;
//! request bodies, headers, and the API credential are never recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Upstream request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamRequestEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// HTTP method label.
    pub method: &'static str,
    /// Normalized endpoint path (no query string).
    pub path: String,
    /// HTTP status when a response was received.
    pub status: Option<u16>,
    /// Normalized error kind label when the call failed.
    pub error_kind: Option<&'static str>,
    /// Wall-clock duration of the call in milliseconds.
    pub duration_ms: u128,
}

impl UpstreamRequestEvent {
    /// Builds an upstream request event stamped with the current time.
    #[must_use]
    pub fn new(
        method: &'static str,
        path: String,
        status: Option<u16>,
        error_kind: Option<&'static str>,
        duration_ms: u128,
    ) -> Self {
        Self {
            event: "upstream_request",
            timestamp_ms: now_millis(),
            method,
            path,
            status,
            error_kind,
            duration_ms,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for upstream request events.
pub trait UpstreamAuditSink: Send + Sync {
    /// Records a single upstream request event.
    fn record(&self, event: &UpstreamRequestEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrUpstreamAudit;

impl UpstreamAuditSink for StderrUpstreamAudit {
    fn record(&self, event: &UpstreamRequestEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            eprintln!("{payload}");
        }
    }
}

/// No-op audit sink for tests.
pub struct NoopUpstreamAudit;

impl UpstreamAuditSink for NoopUpstreamAudit {
    fn record(&self, _event: &UpstreamRequestEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns milliseconds since the Unix epoch.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or_default()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
