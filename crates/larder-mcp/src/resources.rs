// larder-mcp/src/resources.rs
// ============================================================================
// Module: Resource Catalog
// Description: Embedded documentation resources served over MCP.
// Purpose: Answer resources/list and resources/read without runtime I/O.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The resource catalog serves the Larder documentation set: usage
//! examples, the response format reference, and the configuration
//! reference. Documents are embedded at compile time with `include_str!`;
//! no file or network I/O happens at request time. Resource URIs use the
//! fixed `larder://<name>` scheme and are validated before lookup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// URI prefix for all Larder resources.
pub const RESOURCE_URI_PREFIX: &str = "larder://";
/// MIME type for embedded markdown resources.
const DOC_MIME_TYPE: &str = "text/markdown";

/// Embedded usage examples document.
const EXAMPLES_DOC: &str = include_str!("../docs/examples.md");
/// Embedded response format document.
const RESPONSE_FORMAT_DOC: &str = include_str!("../docs/response-format.md");
/// Embedded configuration reference document.
const CONFIGURATION_DOC: &str = include_str!("../docs/configuration.md");

// ============================================================================
// SECTION: Types
// ============================================================================

/// Resource descriptor returned by `resources/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    /// Resource URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// MIME type of the content.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Resource content returned by `resources/read`.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceContent {
    /// Resource URI.
    pub uri: String,
    /// MIME type of the content.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Document body.
    pub text: String,
}

/// One embedded catalog entry.
struct CatalogEntry {
    /// Stable resource name under the `larder://` scheme.
    name: &'static str,
    /// Display title.
    title: &'static str,
    /// Short description for listings.
    description: &'static str,
    /// Embedded document body.
    body: &'static str,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Resource catalog errors.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// URI does not match the `larder://<name>` pattern.
    #[error("invalid resource uri format: {0}")]
    InvalidUri(String),
    /// URI is well-formed but names no known resource.
    #[error("resource not found: {0}")]
    NotFound(String),
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Catalog of embedded documentation resources.
pub struct ResourceCatalog {
    /// Embedded entries in listing order.
    entries: Vec<CatalogEntry>,
}

impl Default for ResourceCatalog {
    fn default() -> Self {
        Self {
            entries: vec![
                CatalogEntry {
                    name: "examples",
                    title: "Larder Usage Examples",
                    description: "Common tool sequences for driving the household API",
                    body: EXAMPLES_DOC,
                },
                CatalogEntry {
                    name: "response-format",
                    title: "Response Format Documentation",
                    description: "Tool result shape and protocol error code reference",
                    body: RESPONSE_FORMAT_DOC,
                },
                CatalogEntry {
                    name: "config",
                    title: "Configuration Documentation",
                    description: "All configuration options and how to use them",
                    body: CONFIGURATION_DOC,
                },
            ],
        }
    }
}

impl ResourceCatalog {
    /// Lists all resources in stable order.
    #[must_use]
    pub fn list(&self) -> Vec<ResourceDescriptor> {
        self.entries
            .iter()
            .map(|entry| ResourceDescriptor {
                uri: format!("{RESOURCE_URI_PREFIX}{}", entry.name),
                name: entry.title.to_string(),
                description: entry.description.to_string(),
                mime_type: DOC_MIME_TYPE.to_string(),
            })
            .collect()
    }

    /// Reads a resource by URI.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidUri`] for URIs outside the
    /// `larder://<name>` scheme and [`ResourceError::NotFound`] for unknown
    /// names.
    pub fn read(&self, uri: &str) -> Result<ResourceContent, ResourceError> {
        let name = uri
            .strip_prefix(RESOURCE_URI_PREFIX)
            .ok_or_else(|| ResourceError::InvalidUri(uri.to_string()))?;
        if name.is_empty() || name.contains('/') {
            return Err(ResourceError::InvalidUri(uri.to_string()));
        }
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| ResourceContent {
                uri: uri.to_string(),
                mime_type: DOC_MIME_TYPE.to_string(),
                text: entry.body.to_string(),
            })
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
