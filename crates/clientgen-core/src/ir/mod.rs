//! The normalized service description consumed by the generator.
//!
//! A front-end hands over one document keyed by stable schema ids: named
//! schemas live in an ordered map, operations in declaration order. The
//! document is read-only once loaded; every later stage borrows it.
//!
//! # Examples
//!
//! ```
//! use clientgen_core::ir::IrDocument;
//!
//! let doc = IrDocument::parse(r#"{
//!     "service": { "name": "Widgets", "versions": ["2024-06-01"] },
//!     "schemas": {
//!         "Widget": { "kind": "model", "name": "Widget", "properties": [] }
//!     },
//!     "operations": []
//! }"#).unwrap();
//! assert!(doc.schema("Widget").is_some());
//! ```

pub mod operation;
pub mod schema;
pub mod validate;
pub mod version;

// Internal imports (std, crate)
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// External imports (alphabetized)
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::fs;

pub use operation::{
    BodyContentType, HttpMethod, LongRunningInfo, LroStrategy, OperationNode, PaginationInfo,
    ParameterLocation, ParameterNode,
};
pub use schema::{
    EnumValue, EnumValueType, Lifecycle, PrimitiveKind, PropertyNode, SchemaKind, SchemaNode,
    Visibility, WireEncoding,
};
pub use version::{ServiceVersion, VersionSet, VersionWindow};

/// Stable id of a schema node
pub type SchemaId = String;

/// Where a node was declared in the original service description
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(column) = self.column {
                write!(f, ":{}", column)?;
            }
        }
        Ok(())
    }
}

/// Identity of an IR node: a dotted path from the document root plus the
/// declaration site when the front-end provided one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub path: String,
    pub location: Option<SourceLocation>,
}

impl NodeRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            location: None,
        }
    }

    pub fn schema(id: &str) -> Self {
        Self::new(format!("schemas.{}", id))
    }

    pub fn operation(id: &str) -> Self {
        Self::new(format!("operations.{}", id))
    }

    pub fn service() -> Self {
        Self::new("service")
    }

    /// Path one level down; the location is not inherited
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        Self::new(format!("{}.{}", self.path, segment))
    }

    /// Variant of the same node, e.g. `schemas.Widget#create`
    pub fn facet(&self, facet: &str) -> Self {
        Self {
            path: format!("{}#{}", self.path, facet),
            location: self.location.clone(),
        }
    }

    pub fn at(mut self, location: Option<&SourceLocation>) -> Self {
        self.location = location.cloned();
        self
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({})", self.path, location),
            None => f.write_str(&self.path),
        }
    }
}

/// Version window of a node; tokens must be declared service versions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versioning {
    #[serde(default, alias = "addedInVersion")]
    pub added: Option<String>,
    #[serde(default, alias = "removedInVersion")]
    pub removed: Option<String>,
    #[serde(default)]
    pub renamed_from: Option<String>,
}

impl Versioning {
    pub fn is_empty(&self) -> bool {
        self.added.is_none() && self.removed.is_none() && self.renamed_from.is_none()
    }
}

/// Service-level metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Declared oldest first
    #[serde(default)]
    pub versions: Vec<String>,
    /// Default endpoint for generated clients
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// The whole service description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrDocument {
    pub service: ServiceInfo,
    #[serde(default)]
    pub schemas: IndexMap<SchemaId, SchemaNode>,
    #[serde(default)]
    pub operations: Vec<OperationNode>,
}

impl IrDocument {
    /// Load a document from a local path or an HTTP(S) URL
    pub async fn from_file_or_url<P: AsRef<str>>(location: P) -> Result<Self> {
        let location = location.as_ref();
        if location.starts_with("http://") || location.starts_with("https://") {
            return Self::from_url(location).await;
        }
        Self::from_file(location).await
    }

    /// Load a document from a file (JSON or YAML)
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading service description from {}", path.display());
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read service description at {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Fetch a document over HTTP (JSON or YAML)
    pub async fn from_url(url: &str) -> Result<Self> {
        log::debug!("Fetching service description from {}", url);
        let response = reqwest::get(url)
            .await
            .map_err(|e| Error::Fetch(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "Failed to fetch {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let content = response
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to read response from {}: {}", url, e)))?;
        Self::parse(&content)
    }

    /// Parse content as JSON, falling back to YAML
    ///
    /// JSON goes through a `Value` first: with exact number handling on, the
    /// text parser hands numbers to tagged and flattened nodes as maps.
    pub fn parse(content: &str) -> Result<Self> {
        match serde_json::from_str::<serde_json::Value>(content).and_then(serde_json::from_value) {
            Ok(doc) => Ok(doc),
            // Content that is clearly JSON reports the JSON error
            Err(e) if content.trim_start().starts_with('{') => Err(Error::Json(e)),
            Err(_) => Ok(serde_yaml::from_str(content)?),
        }
    }

    pub fn schema(&self, id: &str) -> Option<&SchemaNode> {
        self.schemas.get(id)
    }

    /// Look up a schema referenced from `referrer`
    pub fn require_schema(&self, id: &str, referrer: &NodeRef) -> Result<&SchemaNode> {
        self.schemas.get(id).ok_or_else(|| {
            Error::malformed(referrer.clone(), format!("references unknown schema '{}'", id))
        })
    }

    pub fn operation(&self, id: &str) -> Option<&OperationNode> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Node identity of a schema, with its declaration site
    pub fn schema_ref(&self, id: &str) -> NodeRef {
        NodeRef::schema(id).at(self.schemas.get(id).and_then(|s| s.source.as_ref()))
    }

    /// Ordered version set declared by the service
    pub fn version_set(&self) -> Result<VersionSet> {
        VersionSet::new(&self.service.versions)
    }

    /// Walk a model (and its base chain) for the property with `wire_name`
    pub fn find_property<'a>(&'a self, schema_id: &str, wire_name: &str) -> Option<&'a PropertyNode> {
        let mut current = Some(schema_id);
        let mut hops = 0;
        while let Some(id) = current {
            let schema = self.schemas.get(id)?;
            if let SchemaKind::Model { properties, base_model } = &schema.kind {
                if let Some(found) = properties.iter().find(|p| p.wire_name == wire_name) {
                    return Some(found);
                }
                current = base_model.as_deref();
            } else {
                return None;
            }
            hops += 1;
            if hops > self.schemas.len() {
                // cyclic base chain; validation reports it
                return None;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML_DOC: &str = r#"
service:
  name: Widgets
  versions: ["2022-12-01-preview", "2024-06-01"]
schemas:
  Widget:
    kind: model
    name: Widget
    properties:
      - wireName: color
        schema: string
        required: true
  string:
    kind: primitive
    name: string
    primitive: string
operations: []
"#;

    #[test]
    fn test_parse_yaml_fallback() -> crate::Result<()> {
        let doc = IrDocument::parse(YAML_DOC)?;
        assert_eq!(doc.service.versions.len(), 2);
        assert_eq!(doc.schemas.keys().collect::<Vec<_>>(), vec!["Widget", "string"]);
        assert!(doc.find_property("Widget", "color").is_some());
        assert!(doc.find_property("Widget", "size").is_none());
        Ok(())
    }

    #[test]
    fn test_json_errors_are_reported_as_json() {
        let err = IrDocument::parse("{\"service\": ").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_json_numbers_reach_tagged_nodes() -> crate::Result<()> {
        let doc = IrDocument::parse(
            r#"{
                "service": { "name": "Widgets" },
                "schemas": {
                    "count": { "kind": "primitive", "name": "count", "primitive": "int32" },
                    "Widget": {
                        "kind": "model",
                        "name": "Widget",
                        "properties": [{ "wireName": "size", "schema": "count", "required": true }],
                        "source": { "file": "widgets.tsp", "line": 12, "column": 3 }
                    }
                }
            }"#,
        )?;
        let location = doc.schema("Widget").and_then(|s| s.source.clone());
        assert_eq!(location.as_ref().and_then(|l| l.line), Some(12));
        Ok(())
    }

    #[test]
    fn test_node_refs_with_locations_key_sets() {
        let location = SourceLocation {
            file: "widgets.tsp".to_string(),
            line: Some(12),
            column: Some(3),
        };
        let mut seen = std::collections::HashSet::new();
        seen.insert(NodeRef::schema("Widget").at(Some(&location)));
        seen.insert(NodeRef::schema("Widget").at(Some(&location)));
        seen.insert(NodeRef::schema("Widget"));
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_from_file() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("service.yaml");
        tokio::fs::write(&path, YAML_DOC).await?;
        let doc = IrDocument::from_file(&path).await?;
        assert_eq!(doc.service.name, "Widgets");
        Ok(())
    }
}
