//! Operation and parameter nodes.

// Internal imports (std, crate)
use std::fmt;

use super::{SchemaId, SourceLocation, Versioning};

// External imports (alphabetized)
use clientgen_runtime::{Method, PollingStrategy};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One callable endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationNode {
    /// Stable id, unique across the document
    pub id: String,
    /// Client-facing name; defaults to the id
    #[serde(default)]
    pub name: Option<String>,
    pub http_method: HttpMethod,
    pub path_template: String,
    /// Wire binding order
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
    #[serde(default)]
    pub request_body_schema: Option<SchemaId>,
    #[serde(default = "default_true")]
    pub request_body_required: bool,
    /// How the request body is encoded on the wire
    #[serde(default)]
    pub request_content_type: BodyContentType,
    /// Status key (`200`, `4XX`, `400-499`, `default`) to schema; `null` is no content
    #[serde(default)]
    pub responses: IndexMap<String, Option<SchemaId>>,
    #[serde(default)]
    pub pagination_info: Option<PaginationInfo>,
    #[serde(default)]
    pub long_running_info: Option<LongRunningInfo>,
    /// Public parameter order override
    #[serde(default)]
    pub signature_order: Option<Vec<String>>,
    #[serde(flatten)]
    pub versioning: Versioning,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<SourceLocation>,
}

impl OperationNode {
    pub fn client_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// `{name}` placeholders of the path template, in order
    pub fn path_placeholders(&self) -> Vec<&str> {
        let mut found = Vec::new();
        let mut rest = self.path_template.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => {
                    found.push(&after[..end]);
                    rest = &after[end + 1..];
                }
                None => break,
            }
        }
        found
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    #[serde(rename = "GET", alias = "get")]
    Get,
    #[serde(rename = "PUT", alias = "put")]
    Put,
    #[serde(rename = "POST", alias = "post")]
    Post,
    #[serde(rename = "PATCH", alias = "patch")]
    Patch,
    #[serde(rename = "DELETE", alias = "delete")]
    Delete,
    #[serde(rename = "HEAD", alias = "head")]
    Head,
}

impl HttpMethod {
    pub fn runtime(&self) -> Method {
        match self {
            Self::Get => Method::Get,
            Self::Put => Method::Put,
            Self::Post => Method::Post,
            Self::Patch => Method::Patch,
            Self::Delete => Method::Delete,
            Self::Head => Method::Head,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.runtime().as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyContentType {
    #[default]
    #[serde(rename = "application/json")]
    Json,
    /// RFC 7396; an explicit `null` member clears the property
    #[serde(rename = "application/merge-patch+json")]
    MergePatch,
    #[serde(rename = "multipart/form-data")]
    FormData,
}

impl BodyContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::MergePatch => "application/merge-patch+json",
            Self::FormData => "multipart/form-data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Body => "body",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterNode {
    pub location: ParameterLocation,
    pub wire_name: String,
    pub schema: SchemaId,
    #[serde(default)]
    pub required: bool,
    /// Parameters sharing a group id become one options type
    #[serde(default)]
    pub group_id: Option<String>,
    /// Body property this parameter spreads into
    #[serde(default)]
    pub alias_of: Option<String>,
    /// Bound from the client's pinned service version
    #[serde(default)]
    pub is_api_version: bool,
    /// Client-side name override
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(flatten)]
    pub versioning: Versioning,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<SourceLocation>,
}

impl ParameterNode {
    pub fn client_name(&self) -> &str {
        self.client_name.as_deref().unwrap_or(&self.wire_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    /// Dotted path of the item array in a page body
    #[serde(default = "default_items_path")]
    pub items_path: String,
    /// Dotted path of the next link; absent means a single page
    #[serde(default)]
    pub next_link_path: Option<String>,
}

fn default_items_path() -> String {
    "value".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LroStrategy {
    #[default]
    OperationLocation,
    StatusMonitor,
    Location,
    Resource,
}

impl LroStrategy {
    pub fn runtime(&self) -> PollingStrategy {
        match self {
            Self::OperationLocation => PollingStrategy::OperationLocation,
            Self::StatusMonitor => PollingStrategy::StatusMonitor,
            Self::Location => PollingStrategy::Location,
            Self::Resource => PollingStrategy::Resource,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongRunningInfo {
    #[serde(default)]
    pub polling_strategy: LroStrategy,
    /// Dotted path of the status in a poll body
    #[serde(default = "default_status_path")]
    pub status_path: String,
    /// Dotted path of the result in the final poll body; the body itself when absent
    #[serde(default)]
    pub result_path: Option<String>,
    #[serde(default)]
    pub final_result_schema: Option<SchemaId>,
}

fn default_status_path() -> String {
    "status".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_defaults_and_flattened_versioning() -> crate::Result<()> {
        let op: OperationNode = serde_json::from_value(json!({
            "id": "Widgets_Analyze",
            "httpMethod": "post",
            "pathTemplate": "/widgets/{id}:analyze/{kind}",
            "addedInVersion": "2024-06-01",
            "paginationInfo": {},
        }))?;
        assert_eq!(op.http_method, HttpMethod::Post);
        assert_eq!(op.versioning.added.as_deref(), Some("2024-06-01"));
        assert!(op.request_body_required);
        assert_eq!(op.request_content_type, BodyContentType::Json);
        assert_eq!(op.client_name(), "Widgets_Analyze");
        assert_eq!(op.path_placeholders(), vec!["id", "kind"]);
        assert_eq!(op.pagination_info.map(|p| p.items_path).as_deref(), Some("value"));
        Ok(())
    }

    #[test]
    fn test_request_content_types() -> crate::Result<()> {
        for (raw, expected) in [
            ("multipart/form-data", BodyContentType::FormData),
            ("application/merge-patch+json", BodyContentType::MergePatch),
        ] {
            let op: OperationNode = serde_json::from_value(json!({
                "id": "Widgets_Update",
                "httpMethod": "PATCH",
                "pathTemplate": "/widgets/{id}",
                "requestContentType": raw,
            }))?;
            assert_eq!(op.request_content_type, expected);
            assert_eq!(expected.as_str(), raw);
        }
        let unknown = serde_json::from_value::<OperationNode>(json!({
            "id": "Widgets_Update",
            "httpMethod": "PATCH",
            "pathTemplate": "/widgets/{id}",
            "requestContentType": "text/csv",
        }));
        assert!(unknown.is_err());
        Ok(())
    }
}
