//! Schema and property nodes.

// Internal imports (std, crate)
use std::fmt;

use super::{SchemaId, SourceLocation, Versioning};

// External imports (alphabetized)
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use serde_value::Value as SerdeValue;

/// One type in the service model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    pub name: String,
    #[serde(default)]
    pub nullable: bool,
    /// Wire-encoding hint, only meaningful for some primitives
    #[serde(default)]
    pub encoding: Option<WireEncoding>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<SourceLocation>,
    #[serde(flatten)]
    pub versioning: Versioning,
    #[serde(flatten)]
    pub kind: SchemaKind,
}

impl SchemaNode {
    /// Whether the schema becomes its own named declaration
    pub fn is_declaration(&self) -> bool {
        matches!(
            self.kind,
            SchemaKind::Model { .. }
                | SchemaKind::Enum { .. }
                | SchemaKind::Union { .. }
                | SchemaKind::DiscriminatedUnion { .. }
        )
    }

    pub fn model_properties(&self) -> Option<&[PropertyNode]> {
        match &self.kind {
            SchemaKind::Model { properties, .. } => Some(properties),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SchemaKind {
    Primitive {
        primitive: PrimitiveKind,
    },
    Array {
        items: SchemaId,
    },
    Map {
        values: SchemaId,
    },
    Enum {
        #[serde(default)]
        value_type: EnumValueType,
        values: Vec<EnumValue>,
        /// Extensible enums accept wire values outside `values`
        #[serde(default)]
        extensible: bool,
    },
    Model {
        #[serde(default)]
        properties: Vec<PropertyNode>,
        #[serde(default)]
        base_model: Option<SchemaId>,
    },
    Union {
        variants: Vec<SchemaId>,
    },
    DiscriminatedUnion {
        discriminator_property_name: String,
        /// Discriminator wire value to variant model
        variants: IndexMap<String, SchemaId>,
        #[serde(default)]
        base_model: Option<SchemaId>,
    },
}

impl SchemaKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Primitive { .. } => "primitive",
            Self::Array { .. } => "array",
            Self::Map { .. } => "map",
            Self::Enum { .. } => "enum",
            Self::Model { .. } => "model",
            Self::Union { .. } => "union",
            Self::DiscriminatedUnion { .. } => "discriminatedUnion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveKind {
    String,
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Arbitrary-precision decimal
    Decimal,
    Bytes,
    #[serde(alias = "utcDateTime", alias = "offsetDateTime")]
    DateTime,
    #[serde(alias = "plainDate")]
    Date,
    #[serde(alias = "plainTime")]
    Time,
    Duration,
    Url,
    Uuid,
    Unknown,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{:?}", self));
        f.write_str(&text)
    }
}

/// Wire encoding hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireEncoding {
    #[serde(rename = "base64")]
    Base64,
    #[serde(rename = "base64url")]
    Base64Url,
    #[serde(rename = "rfc3339")]
    Rfc3339,
    #[serde(rename = "rfc7231")]
    Rfc7231,
    #[serde(rename = "unixTimestamp", alias = "unix-timestamp")]
    UnixTimestamp,
    #[serde(rename = "ISO8601", alias = "iso8601")]
    Iso8601,
    #[serde(rename = "seconds")]
    Seconds,
    #[serde(rename = "milliseconds")]
    Milliseconds,
    /// Integer carried as a JSON string
    #[serde(rename = "string")]
    NumericString,
}

impl fmt::Display for WireEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Base64 => "base64",
            Self::Base64Url => "base64url",
            Self::Rfc3339 => "rfc3339",
            Self::Rfc7231 => "rfc7231",
            Self::UnixTimestamp => "unixTimestamp",
            Self::Iso8601 => "ISO8601",
            Self::Seconds => "seconds",
            Self::Milliseconds => "milliseconds",
            Self::NumericString => "string",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnumValueType {
    #[default]
    String,
    Integer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    /// Wire value, a string or an integer
    pub value: JsonValue,
    #[serde(default)]
    pub description: Option<String>,
}

/// One property of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyNode {
    pub wire_name: String,
    pub schema: SchemaId,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub visibility: Visibility,
    /// Marks the open map; `schema` is the value type (or a map schema)
    #[serde(default)]
    pub is_additional_properties: bool,
    /// Hoist the referenced model's properties into the containing surface
    #[serde(default, alias = "isFlattenedFrom")]
    pub flatten: bool,
    /// Merge the referenced model's properties into the same wire object
    #[serde(default, alias = "isSpreadInto")]
    pub spread: bool,
    /// Constant wire value, used for discriminators
    #[serde(default)]
    pub literal: Option<JsonValue>,
    /// Client-side name override
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub versioning: Versioning,
    #[serde(default)]
    pub source: Option<SourceLocation>,
}

/// HTTP lifecycle phase a property participates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Read,
    Create,
    Update,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

/// Set of lifecycles in which a property is visible.
///
/// Accepts a shorthand string (`read-only`, `create-only`, `update-only`,
/// `all`) or an explicit list such as `["read", "create"]`. Create-only and
/// update-only properties remain readable, since the service echoes them
/// back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub read: bool,
    pub create: bool,
    pub update: bool,
}

impl Visibility {
    pub const ALL: Visibility = Visibility {
        read: true,
        create: true,
        update: true,
    };

    pub fn allows(&self, lifecycle: Lifecycle) -> bool {
        match lifecycle {
            Lifecycle::Read => self.read,
            Lifecycle::Create => self.create,
            Lifecycle::Update => self.update,
        }
    }

    pub fn is_all(&self) -> bool {
        *self == Self::ALL
    }

    /// Parse a shorthand
    pub fn from_shorthand(raw: &str) -> Option<Self> {
        let visibility = match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Self::ALL,
            "read-only" | "readonly" | "read" => Visibility {
                read: true,
                create: false,
                update: false,
            },
            "create-only" | "createonly" => Visibility {
                read: true,
                create: true,
                update: false,
            },
            "update-only" | "updateonly" => Visibility {
                read: true,
                create: false,
                update: true,
            },
            _ => return None,
        };
        Some(visibility)
    }

    fn lifecycles(&self) -> Vec<Lifecycle> {
        [Lifecycle::Read, Lifecycle::Create, Lifecycle::Update]
            .into_iter()
            .filter(|l| self.allows(*l))
            .collect()
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::ALL
    }
}

impl Serialize for Visibility {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.lifecycles().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Visibility {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = SerdeValue::deserialize(deserializer)?;

        match value {
            SerdeValue::String(s) => Self::from_shorthand(&s).ok_or_else(|| {
                serde::de::Error::custom(format!(
                    "unknown visibility '{}', expected read-only, create-only, update-only or all",
                    s
                ))
            }),
            SerdeValue::Seq(seq) => {
                let mut visibility = Visibility {
                    read: false,
                    create: false,
                    update: false,
                };
                for item in seq {
                    let lifecycle = match item {
                        SerdeValue::String(s) => s,
                        _ => {
                            return Err(serde::de::Error::custom(
                                "Expected visibility lifecycle names as strings",
                            ))
                        }
                    };
                    match lifecycle.to_ascii_lowercase().as_str() {
                        "read" => visibility.read = true,
                        "create" => visibility.create = true,
                        "update" => visibility.update = true,
                        other => {
                            return Err(serde::de::Error::custom(format!(
                                "unknown lifecycle '{}'",
                                other
                            )))
                        }
                    }
                }
                Ok(visibility)
            }
            _ => Err(serde::de::Error::custom(
                "Expected visibility shorthand or array of lifecycles",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visibility_forms() -> crate::Result<()> {
        let create_only: Visibility = serde_json::from_value(json!("create-only"))?;
        assert!(create_only.read && create_only.create && !create_only.update);

        let explicit: Visibility = serde_json::from_value(json!(["read", "update"]))?;
        assert!(explicit.read && !explicit.create && explicit.update);

        assert!(serde_json::from_value::<Visibility>(json!("sometimes")).is_err());
        assert!(serde_json::from_value::<Visibility>(json!(3)).is_err());
        assert_eq!(serde_json::to_value(Visibility::ALL)?, json!(["read", "create", "update"]));
        Ok(())
    }

    #[test]
    fn test_schema_kind_tagging() -> crate::Result<()> {
        let node: SchemaNode = serde_json::from_value(json!({
            "kind": "discriminatedUnion",
            "name": "Fish",
            "discriminatorPropertyName": "kind",
            "variants": { "shark": "Shark", "salmon": "Salmon" }
        }))?;
        match node.kind {
            SchemaKind::DiscriminatedUnion { discriminator_property_name, variants, .. } => {
                assert_eq!(discriminator_property_name, "kind");
                assert_eq!(variants.keys().collect::<Vec<_>>(), vec!["shark", "salmon"]);
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let bytes: SchemaNode = serde_json::from_value(json!({
            "kind": "primitive", "name": "bytes", "primitive": "bytes", "encoding": "base64url"
        }))?;
        assert_eq!(bytes.encoding, Some(WireEncoding::Base64Url));
        Ok(())
    }
}
