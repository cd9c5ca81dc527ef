// larder-config/tests/config_load.rs
// ============================================================================
// Module: Config Load Tests
// Description: File-backed configuration loading tests.
// Purpose: Ensure load() enforces limits and validation end to end.
// Dependencies: larder-config, tempfile
// ============================================================================

//! ## Overview
//! Exercises `LarderConfig::load` against real files: happy path, size
//! limits, and validation failures surfaced at load time.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

use std::fs;

use larder_config::ConfigError;
use larder_config::LarderConfig;
use larder_config::ServerTransport;

#[test]
fn load_reads_full_config_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("larder.toml");
    fs::write(
        &path,
        r#"
[server]
transport = "http"
bind = "127.0.0.1:8080"

[upstream]
base_url = "http://localhost:9283"
api_key = "secret-key"
timeout_ms = 5000

[tools]
enabled = ["get_products", "purchase_product"]

[tools.options.purchase_product]
require_price = true
"#,
    )
    .expect("write config");

    let config = LarderConfig::load(Some(&path)).expect("config loads");
    assert_eq!(config.server.transport, ServerTransport::Http);
    assert_eq!(config.server.bind_addr().expect("bind parses").port(), 8080);
    assert_eq!(config.upstream.timeout_ms, 5000);
    assert_eq!(config.tools.enabled.len(), 2);
    assert_eq!(config.tools.tool_options("purchase_product").get("require_price"), Some(&true));
}

#[test]
fn load_rejects_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    let err = LarderConfig::load(Some(&path)).expect_err("missing file fails");
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn load_rejects_invalid_toml() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("larder.toml");
    fs::write(&path, "server = not-toml").expect("write config");
    let err = LarderConfig::load(Some(&path)).expect_err("parse fails");
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn load_rejects_invalid_policy_at_load_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("larder.toml");
    fs::write(&path, "[tools]\nenabled = [\"Bad Name\"]\n").expect("write config");
    let err = LarderConfig::load(Some(&path)).expect_err("validation fails");
    assert!(matches!(err, ConfigError::Invalid(_)));
}
