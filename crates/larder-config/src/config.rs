// larder-config/src/config.rs
// ============================================================================
// Module: Larder Configuration
// Description: Configuration loading and validation for the Larder server.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: the server refuses to start
//! rather than running with a policy it cannot interpret. Tool enablement is
//! explicit opt-in; an empty `tools.enabled` list means no tool is reachable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "larder.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "LARDER_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Minimum upstream request timeout in milliseconds.
pub(crate) const MIN_UPSTREAM_TIMEOUT_MS: u64 = 500;
/// Maximum upstream request timeout in milliseconds.
pub(crate) const MAX_UPSTREAM_TIMEOUT_MS: u64 = 300_000;
/// Minimum allowed request body size in bytes.
pub(crate) const MIN_BODY_BYTES: usize = 1024;
/// Maximum allowed request body size in bytes.
pub(crate) const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
/// Maximum number of custom upstream headers.
pub(crate) const MAX_UPSTREAM_HEADERS: usize = 32;
/// Maximum length of the upstream API key.
pub(crate) const MAX_API_KEY_LENGTH: usize = 512;
/// Maximum number of enabled tool entries.
pub(crate) const MAX_ENABLED_TOOLS: usize = 256;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Larder MCP server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LarderConfig {
    /// Server transport configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream household API connection configuration.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Tool enablement policy configuration.
    #[serde(default)]
    pub tools: ToolPolicyConfig,
}

impl LarderConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.upstream.validate()?;
        self.tools.validate()?;
        Ok(())
    }
}

/// Transport selection for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Serve one implicit session over stdin/stdout.
    #[default]
    Stdio,
    /// Serve independent sessions over HTTP (one-shot and SSE).
    Http,
}

impl ServerTransport {
    /// Returns a stable label for the transport.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

/// Server configuration for MCP transports.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Transport type for MCP.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Bind address for the HTTP transport.
    #[serde(default)]
    pub bind: Option<String>,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::Stdio,
            bind: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Validates server transport configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes < MIN_BODY_BYTES || self.max_body_bytes > MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be within [{MIN_BODY_BYTES}, {MAX_BODY_BYTES}]"
            )));
        }
        if self.transport == ServerTransport::Http {
            let bind = self.bind.as_deref().unwrap_or_default().trim();
            if bind.is_empty() {
                return Err(ConfigError::Invalid(
                    "http transport requires server.bind address".to_string(),
                ));
            }
            let _: SocketAddr = bind
                .parse()
                .map_err(|_| ConfigError::Invalid("invalid server.bind address".to_string()))?;
        }
        Ok(())
    }

    /// Returns the parsed bind address for the HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the address is missing or malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self
            .bind
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("server.bind address required".to_string()))?;
        bind.trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid server.bind address".to_string()))
    }
}

/// Upstream household API connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Static API key forwarded on every upstream request.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Whether upstream TLS certificates are verified.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Fixed upper-bound timeout per upstream call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra headers forwarded verbatim on every upstream call.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            verify_tls: default_verify_tls(),
            timeout_ms: default_timeout_ms(),
            headers: BTreeMap::new(),
        }
    }
}

impl UpstreamConfig {
    /// Validates upstream connection configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|_| ConfigError::Invalid("invalid upstream.base_url".to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid(
                "upstream.base_url must use http or https".to_string(),
            ));
        }
        if self.timeout_ms < MIN_UPSTREAM_TIMEOUT_MS || self.timeout_ms > MAX_UPSTREAM_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "upstream.timeout_ms must be within [{MIN_UPSTREAM_TIMEOUT_MS}, \
                 {MAX_UPSTREAM_TIMEOUT_MS}]"
            )));
        }
        if let Some(key) = &self.api_key {
            if key.trim().is_empty() {
                return Err(ConfigError::Invalid("upstream.api_key must not be blank".to_string()));
            }
            if key.len() > MAX_API_KEY_LENGTH {
                return Err(ConfigError::Invalid("upstream.api_key exceeds max length".to_string()));
            }
            if key.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid(
                    "upstream.api_key must not contain whitespace".to_string(),
                ));
            }
        }
        if self.headers.len() > MAX_UPSTREAM_HEADERS {
            return Err(ConfigError::Invalid("too many upstream.headers entries".to_string()));
        }
        for name in self.headers.keys() {
            if name.trim().is_empty() || !name.chars().all(is_header_name_char) {
                return Err(ConfigError::Invalid(format!("invalid upstream header name: {name}")));
            }
        }
        Ok(())
    }

    /// Returns the base URL with any trailing slashes removed.
    #[must_use]
    pub fn trimmed_base_url(&self) -> String {
        self.base_url.trim().trim_end_matches('/').to_string()
    }
}

/// Tool enablement policy configuration.
///
/// # Invariants
/// - Enablement is explicit opt-in: a tool absent from `enabled` is hidden
///   and rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolPolicyConfig {
    /// Names of tools reachable by clients.
    #[serde(default)]
    pub enabled: Vec<String>,
    /// Per-tool boolean sub-configuration flags.
    #[serde(default)]
    pub options: BTreeMap<String, BTreeMap<String, bool>>,
}

impl ToolPolicyConfig {
    /// Validates tool policy shape (name syntax and limits only).
    ///
    /// Cross-checking names against the registered catalogue happens in the
    /// server crate, where the registry lives.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled.len() > MAX_ENABLED_TOOLS {
            return Err(ConfigError::Invalid("too many tools.enabled entries".to_string()));
        }
        let mut seen = BTreeSet::new();
        for name in &self.enabled {
            validate_tool_name(name)?;
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate tools.enabled entry: {name}")));
            }
        }
        for name in self.options.keys() {
            validate_tool_name(name)?;
        }
        Ok(())
    }

    /// Returns the boolean option flags configured for a tool.
    #[must_use]
    pub fn tool_options(&self, name: &str) -> BTreeMap<String, bool> {
        self.options.get(name).cloned().unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured tool name token.
fn validate_tool_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Invalid("tool name must not be blank".to_string()));
    }
    if !name.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_') {
        return Err(ConfigError::Invalid(format!(
            "tool name must be lowercase snake_case: {name}"
        )));
    }
    Ok(())
}

/// Returns true for characters allowed in header names.
const fn is_header_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

/// Default maximum request body size in bytes.
pub(crate) const fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Default upstream base URL for local deployments.
fn default_base_url() -> String {
    "http://localhost:9283".to_string()
}

/// Default TLS verification posture.
const fn default_verify_tls() -> bool {
    true
}

/// Default upstream request timeout in milliseconds.
const fn default_timeout_ms() -> u64 {
    30_000
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

    use super::LarderConfig;
    use super::ServerTransport;

    #[test]
    fn defaults_parse_from_empty_document() {
        let config: LarderConfig = toml::from_str("").expect("empty config parses");
        config.validate().expect("defaults validate");
        assert_eq!(config.server.transport, ServerTransport::Stdio);
        assert_eq!(config.upstream.base_url, "http://localhost:9283");
        assert!(config.upstream.verify_tls);
        assert!(config.tools.enabled.is_empty());
    }

    #[test]
    fn http_transport_requires_bind() {
        let config: LarderConfig =
            toml::from_str("[server]\ntransport = \"http\"\n").expect("config parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn http_transport_rejects_malformed_bind() {
        let config: LarderConfig =
            toml::from_str("[server]\ntransport = \"http\"\nbind = \"not-an-addr\"\n")
                .expect("config parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn upstream_rejects_non_http_scheme() {
        let config: LarderConfig =
            toml::from_str("[upstream]\nbase_url = \"ftp://example.invalid\"\n")
                .expect("config parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn upstream_rejects_out_of_range_timeout() {
        let config: LarderConfig =
            toml::from_str("[upstream]\ntimeout_ms = 1\n").expect("config parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn upstream_rejects_whitespace_api_key() {
        let config: LarderConfig =
            toml::from_str("[upstream]\napi_key = \"two words\"\n").expect("config parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn tools_reject_duplicate_enabled_entries() {
        let config: LarderConfig =
            toml::from_str("[tools]\nenabled = [\"get_products\", \"get_products\"]\n")
                .expect("config parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn tools_reject_non_snake_case_names() {
        let config: LarderConfig =
            toml::from_str("[tools]\nenabled = [\"GetProducts\"]\n").expect("config parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn trimmed_base_url_strips_trailing_slashes() {
        let config: LarderConfig =
            toml::from_str("[upstream]\nbase_url = \"http://host:9283///\"\n")
                .expect("config parses");
        assert_eq!(config.upstream.trimmed_base_url(), "http://host:9283");
    }

    #[test]
    fn tool_options_default_to_empty() {
        let config: LarderConfig = toml::from_str(
            "[tools]\nenabled = [\"purchase_product\"]\n[tools.options.purchase_product]\nrequire_price = true\n",
        )
        .expect("config parses");
        config.validate().expect("config validates");
        let options = config.tools.tool_options("purchase_product");
        assert_eq!(options.get("require_price"), Some(&true));
        assert!(config.tools.tool_options("get_products").is_empty());
    }
}
