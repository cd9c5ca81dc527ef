// larder-client/src/client.rs
// ============================================================================
// Module: Upstream HTTP Client
// Description: Request shaping and error taxonomy for the household API.
// Purpose: Provide the single REST capability consumed by tool handlers.
// Dependencies: larder-config, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The upstream client normalizes endpoint paths, attaches the static API
//! credential, enforces a fixed per-call timeout, and maps transport
//! failures into a stable error taxonomy. Handlers depend only on
//! `request(endpoint, options)` and the convenience verbs built on top.
//!
//! ## Invariants
//! - The API key is attached as a default header and never echoed in
//!   [`ApiError`] or audit events.
//! - Every call resolves within the configured timeout bound.
//! - Endpoint normalization is deterministic: all paths reach the upstream
//!   under `/api/...`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use larder_config::UpstreamConfig;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde_json::Value;
use thiserror::Error;

use crate::audit::NoopUpstreamAudit;
use crate::audit::UpstreamAuditSink;
use crate::audit::UpstreamRequestEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the static API credential on every upstream call.
pub const API_KEY_HEADER: &str = "HOUSEHOLD-API-KEY";
/// Maximum upstream response body size in bytes.
const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// HTTP methods supported by the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    /// HTTP GET.
    #[default]
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP DELETE.
    Delete,
    /// HTTP PATCH.
    Patch,
}

impl HttpMethod {
    /// Returns the method as an HTTP verb label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Returns the corresponding reqwest method.
    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Patch => reqwest::Method::PATCH,
        }
    }

    /// Returns true when the method carries a request body.
    const fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

/// Options for a single upstream request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method (defaults to GET).
    pub method: HttpMethod,
    /// Optional JSON request body.
    pub body: Option<Value>,
    /// Extra headers for this call only.
    pub headers: BTreeMap<String, String>,
    /// Query parameters, appended in order (repeated keys allowed).
    pub query: Vec<(String, String)>,
}

/// Upstream response payload.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Parsed JSON body (string-wrapped when the body is not JSON).
    pub data: Value,
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upstream client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client construction failed.
    #[error("upstream client build failed: {0}")]
    Build(String),
    /// Upstream returned an HTTP error status.
    #[error("upstream error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The request exceeded the configured timeout.
    #[error("upstream timeout: the server took too long to respond")]
    Timeout,
    /// The connection was reset by the upstream server.
    #[error("upstream connection reset: the server unexpectedly closed the connection")]
    ConnectionReset,
    /// The upstream host could not be reached.
    #[error("upstream unreachable: unable to reach the household server")]
    Unreachable,
    /// The response body exceeded limits or could not be read.
    #[error("upstream response invalid: {0}")]
    InvalidBody(String),
    /// Any other transport-level failure.
    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl ApiError {
    /// Returns the stable error kind label for this error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Build(_) => "build",
            Self::Status {
                ..
            } => "status",
            Self::Timeout => "timeout",
            Self::ConnectionReset => "connection_reset",
            Self::Unreachable => "unreachable",
            Self::InvalidBody(_) => "invalid_body",
            Self::Transport(_) => "transport",
        }
    }

    /// Returns the HTTP status when the upstream answered with one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status {
                status, ..
            } => Some(*status),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Upstream Client
// ============================================================================

/// Async client for the upstream household API.
#[derive(Clone)]
pub struct UpstreamClient {
    /// Underlying HTTP client with default headers and timeout.
    http: reqwest::Client,
    /// Base URL without trailing slashes.
    base_url: String,
    /// Audit sink for request events.
    audit: Arc<dyn UpstreamAuditSink>,
}

impl UpstreamClient {
    /// Builds an upstream client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Build`] when the HTTP client cannot be constructed.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ApiError> {
        Self::from_config_with_audit(config, Arc::new(NoopUpstreamAudit))
    }

    /// Builds an upstream client with an explicit audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Build`] when the HTTP client cannot be constructed.
    pub fn from_config_with_audit(
        config: &UpstreamConfig,
        audit: Arc<dyn UpstreamAuditSink>,
    ) -> Result<Self, ApiError> {
        let mut defaults = HeaderMap::new();
        defaults.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        if let Some(key) = &config.api_key {
            let mut value = HeaderValue::from_str(key)
                .map_err(|_| ApiError::Build("api key is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            let name = HeaderName::from_static("household-api-key");
            defaults.insert(name, value);
        }
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::Build(format!("invalid header name: {name}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| ApiError::Build(format!("invalid header value for: {name}")))?;
            defaults.insert(header_name, header_value);
        }
        let mut builder = reqwest::Client::builder()
            .default_headers(defaults)
            .timeout(Duration::from_millis(config.timeout_ms));
        if !config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().map_err(|err| ApiError::Build(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.trimmed_base_url(),
            audit,
        })
    }

    /// Issues an upstream request and returns the parsed response.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for HTTP ≥ 400, timeout, reset, or unreachable
    /// host, each as a distinguishable variant.
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let path = normalize_endpoint(endpoint);
        let url = format!("{}{}", self.base_url, path);
        let method = options.method;
        let started = Instant::now();
        let result = self.send(&url, &options).await;
        let event = UpstreamRequestEvent::new(
            method.as_str(),
            path,
            response_status(&result),
            result.as_ref().err().map(ApiError::kind),
            started.elapsed().as_millis(),
        );
        self.audit.record(&event);
        result
    }

    /// Issues a GET request with default options.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any upstream failure.
    pub async fn get(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
        self.request(endpoint, RequestOptions::default()).await
    }

    /// Issues a GET request with query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any upstream failure.
    pub async fn get_with_query(
        &self,
        endpoint: &str,
        query: Vec<(String, String)>,
    ) -> Result<ApiResponse, ApiError> {
        self.request(
            endpoint,
            RequestOptions {
                query,
                ..RequestOptions::default()
            },
        )
        .await
    }

    /// Issues a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any upstream failure.
    pub async fn post(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.request(
            endpoint,
            RequestOptions {
                method: HttpMethod::Post,
                body: Some(body),
                ..RequestOptions::default()
            },
        )
        .await
    }

    /// Issues a PUT request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any upstream failure.
    pub async fn put(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.request(
            endpoint,
            RequestOptions {
                method: HttpMethod::Put,
                body: Some(body),
                ..RequestOptions::default()
            },
        )
        .await
    }

    /// Issues a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any upstream failure.
    pub async fn delete(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
        self.request(
            endpoint,
            RequestOptions {
                method: HttpMethod::Delete,
                ..RequestOptions::default()
            },
        )
        .await
    }

    /// Sends the request and decodes the response envelope.
    async fn send(&self, url: &str, options: &RequestOptions) -> Result<ApiResponse, ApiError> {
        let mut request = self.http.request(options.method.to_reqwest(), url);
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if options.method.carries_body() {
            if let Some(body) = &options.body {
                request = request.json(body);
            }
        }
        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|text| (name.to_string(), text.to_string()))
            })
            .collect();
        let max_bytes = u64::try_from(MAX_RESPONSE_BYTES).unwrap_or(u64::MAX);
        if let Some(length) = response.content_length()
            && length > max_bytes
        {
            return Err(ApiError::InvalidBody("response body too large".to_string()));
        }
        let text = response.text().await.map_err(|err| {
            if err.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::InvalidBody("response body read failed".to_string())
            }
        })?;
        if text.len() > MAX_RESPONSE_BYTES {
            return Err(ApiError::InvalidBody("response body too large".to_string()));
        }
        if status >= 400 {
            return Err(ApiError::Status {
                status,
                body: text,
            });
        }
        let data = decode_body(&text);
        Ok(ApiResponse {
            data,
            status,
            headers,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Normalizes an endpoint path so every call lands under `/api/...`.
#[must_use]
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.starts_with("/api/") || trimmed == "/api" {
        trimmed.to_string()
    } else if trimmed.starts_with("api/") {
        format!("/{trimmed}")
    } else if let Some(rest) = trimmed.strip_prefix('/') {
        format!("/api/{rest}")
    } else {
        format!("/api/{trimmed}")
    }
}

/// Decodes a response body: JSON when possible, string-wrapped otherwise.
fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Extracts the response status from a request result for audit events.
fn response_status(result: &Result<ApiResponse, ApiError>) -> Option<u16> {
    match result {
        Ok(response) => Some(response.status),
        Err(err) => err.status(),
    }
}

/// Maps reqwest send errors onto the stable error taxonomy.
fn map_send_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        return ApiError::Timeout;
    }
    if is_connection_reset(&error) {
        return ApiError::ConnectionReset;
    }
    if error.is_connect() {
        return ApiError::Unreachable;
    }
    ApiError::Transport("request failed".to_string())
}

/// Walks the error source chain looking for a connection-reset I/O error.
fn is_connection_reset(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            )
        {
            return true;
        }
        source = cause.source();
    }
    false
}

// ============================================================================
// SECTION: Tests
// ============================================================================
