//! Type mapping from IR schemas to target types.
//!
//! A [`TargetType`] keeps the logical type (what the caller sees) apart from
//! the wire encoding (how it travels), so a `dateTime` is one logical type
//! whether it is written as RFC 3339 text or a unix timestamp.
//!
//! # Examples
//!
//! ```
//! use clientgen_core::ir::{IrDocument, NodeRef};
//! use clientgen_core::types::{ScalarType, Shape, TypeMapper, UsageContext};
//!
//! let doc = IrDocument::parse(r#"{
//!     "service": { "name": "Widgets" },
//!     "schemas": { "when": { "kind": "primitive", "name": "when", "primitive": "dateTime" } }
//! }"#).unwrap();
//! let mapper = TypeMapper::new(&doc);
//! let target = mapper.map_type("when", UsageContext::Property, &NodeRef::service()).unwrap();
//! assert_eq!(target.shape, Shape::Scalar(ScalarType::DateTime));
//! ```

// Internal imports (std, crate)
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::ir::{IrDocument, NodeRef, ParameterLocation, PrimitiveKind, SchemaId, SchemaKind, WireEncoding};

/// Where a mapped type is used; only header parameters change defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageContext {
    Property,
    Parameter(ParameterLocation),
    Return,
}

/// Logical scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Arbitrary precision; never a binary float
    Decimal,
    Bytes,
    DateTime,
    Date,
    Time,
    Duration,
    Url,
    Uuid,
}

impl ScalarType {
    fn from_primitive(primitive: PrimitiveKind) -> Option<Self> {
        Some(match primitive {
            PrimitiveKind::String => Self::String,
            PrimitiveKind::Boolean => Self::Bool,
            PrimitiveKind::Int32 => Self::Int32,
            PrimitiveKind::Int64 => Self::Int64,
            PrimitiveKind::Float32 => Self::Float32,
            PrimitiveKind::Float64 => Self::Float64,
            PrimitiveKind::Decimal => Self::Decimal,
            PrimitiveKind::Bytes => Self::Bytes,
            PrimitiveKind::DateTime => Self::DateTime,
            PrimitiveKind::Date => Self::Date,
            PrimitiveKind::Time => Self::Time,
            PrimitiveKind::Duration => Self::Duration,
            PrimitiveKind::Url => Self::Url,
            PrimitiveKind::Uuid => Self::Uuid,
            PrimitiveKind::Unknown => return None,
        })
    }

    /// Encodings this scalar may travel in
    pub fn allowed_encodings(&self) -> &'static [WireEncoding] {
        match self {
            Self::Bytes => &[WireEncoding::Base64, WireEncoding::Base64Url],
            Self::DateTime => &[
                WireEncoding::Rfc3339,
                WireEncoding::Rfc7231,
                WireEncoding::UnixTimestamp,
            ],
            Self::Duration => &[
                WireEncoding::Iso8601,
                WireEncoding::Seconds,
                WireEncoding::Milliseconds,
            ],
            Self::Int64 => &[WireEncoding::NumericString],
            _ => &[],
        }
    }

    /// Encoding used when the IR gives none
    pub fn default_encoding(&self, context: UsageContext) -> Option<WireEncoding> {
        match self {
            Self::Bytes => Some(WireEncoding::Base64),
            Self::DateTime if context == UsageContext::Parameter(ParameterLocation::Header) => {
                Some(WireEncoding::Rfc7231)
            }
            Self::DateTime => Some(WireEncoding::Rfc3339),
            Self::Duration => Some(WireEncoding::Iso8601),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Kind of a named declaration a type refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKind {
    Model,
    Enum,
    Union,
    Polymorphic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Scalar(ScalarType),
    List(Box<TargetType>),
    Map(Box<TargetType>),
    Named(SchemaId, NamedKind),
    /// Untyped JSON
    Any,
}

/// A mapped type: shape, nullability and wire encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetType {
    pub shape: Shape,
    /// `null` is a legal wire value
    pub nullable: bool,
    pub encoding: Option<WireEncoding>,
}

impl TargetType {
    pub fn scalar(scalar: ScalarType) -> Self {
        Self {
            shape: Shape::Scalar(scalar),
            nullable: false,
            encoding: None,
        }
    }

    pub fn reference(schema_id: impl Into<SchemaId>, kind: NamedKind) -> Self {
        Self {
            shape: Shape::Named(schema_id.into(), kind),
            nullable: false,
            encoding: None,
        }
    }

    /// Schema ids of named declarations this type mentions
    pub fn references(&self) -> Vec<&str> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a str>) {
        match &self.shape {
            Shape::Named(id, _) => found.push(id),
            Shape::List(inner) | Shape::Map(inner) => inner.collect_references(found),
            Shape::Scalar(_) | Shape::Any => {}
        }
    }

    pub fn named(&self) -> Option<(&str, NamedKind)> {
        match &self.shape {
            Shape::Named(id, kind) => Some((id, *kind)),
            _ => None,
        }
    }
}

/// Maps schema ids to target types against one document
pub struct TypeMapper<'a> {
    doc: &'a IrDocument,
    /// Anonymous collection ids being mapped, to reject self-containing aliases
    in_progress: RefCell<HashSet<SchemaId>>,
}

impl<'a> TypeMapper<'a> {
    pub fn new(doc: &'a IrDocument) -> Self {
        Self {
            doc,
            in_progress: RefCell::new(HashSet::new()),
        }
    }

    /// Map `schema_id`, used in `context` by the node `referrer`
    pub fn map_type(&self, schema_id: &str, context: UsageContext, referrer: &NodeRef) -> Result<TargetType> {
        let schema = self.doc.require_schema(schema_id, referrer)?;
        let node = self.doc.schema_ref(schema_id);

        if schema.encoding.is_some() && !matches!(schema.kind, SchemaKind::Primitive { .. }) {
            return Err(Error::malformed(
                node,
                format!("encoding is only allowed on primitives, not on a {}", schema.kind.name()),
            ));
        }

        let (shape, encoding) = match &schema.kind {
            SchemaKind::Primitive { primitive } => match ScalarType::from_primitive(*primitive) {
                None => (Shape::Any, None),
                Some(scalar) => {
                    let encoding = match schema.encoding {
                        Some(encoding) if scalar.allowed_encodings().contains(&encoding) => Some(encoding),
                        Some(encoding) => {
                            return Err(Error::malformed(
                                node,
                                format!("encoding '{}' cannot carry a {} value", encoding, primitive),
                            ))
                        }
                        None => scalar.default_encoding(context),
                    };
                    (Shape::Scalar(scalar), encoding)
                }
            },
            SchemaKind::Array { items } => {
                let inner = self.map_collection(schema_id, items, context, &node.child("items"))?;
                (Shape::List(Box::new(inner)), None)
            }
            SchemaKind::Map { values } => {
                let inner = self.map_collection(schema_id, values, context, &node.child("values"))?;
                (Shape::Map(Box::new(inner)), None)
            }
            SchemaKind::Model { .. } => (Shape::Named(schema_id.to_string(), NamedKind::Model), None),
            SchemaKind::Enum { .. } => (Shape::Named(schema_id.to_string(), NamedKind::Enum), None),
            SchemaKind::Union { .. } => (Shape::Named(schema_id.to_string(), NamedKind::Union), None),
            SchemaKind::DiscriminatedUnion { .. } => {
                (Shape::Named(schema_id.to_string(), NamedKind::Polymorphic), None)
            }
        };

        Ok(TargetType {
            shape,
            nullable: schema.nullable,
            encoding,
        })
    }

    fn map_collection(
        &self,
        owner: &str,
        element: &str,
        context: UsageContext,
        referrer: &NodeRef,
    ) -> Result<TargetType> {
        if !self.in_progress.borrow_mut().insert(owner.to_string()) {
            return Err(Error::malformed(
                self.doc.schema_ref(owner),
                "collection type contains itself without a named model in between",
            ));
        }
        let mapped = self.map_type(element, context, referrer);
        self.in_progress.borrow_mut().remove(owner);
        mapped
    }

    /// Value type of an additional-properties entry: the map's value type
    /// when the property points at a map, otherwise the schema itself
    pub fn map_additional(&self, schema_id: &str, referrer: &NodeRef) -> Result<TargetType> {
        let schema = self.doc.require_schema(schema_id, referrer)?;
        match &schema.kind {
            SchemaKind::Map { values } => self.map_type(values, UsageContext::Property, referrer),
            _ => self.map_type(schema_id, UsageContext::Property, referrer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
service:
  name: Types
schemas:
  string: { kind: primitive, name: string, primitive: string }
  bytes: { kind: primitive, name: bytes, primitive: bytes }
  bytesUrl: { kind: primitive, name: bytes, primitive: bytes, encoding: base64url }
  when: { kind: primitive, name: when, primitive: dateTime }
  whenUnix: { kind: primitive, name: when, primitive: dateTime, encoding: unixTimestamp }
  badWhen: { kind: primitive, name: when, primitive: dateTime, encoding: base64 }
  price: { kind: primitive, name: price, primitive: decimal }
  anything: { kind: primitive, name: anything, primitive: unknown }
  Widget:
    kind: model
    name: Widget
    nullable: true
  WidgetList: { kind: array, name: WidgetList, items: Widget, nullable: true }
  Loop: { kind: array, name: Loop, items: Loop }
  Tags: { kind: map, name: Tags, values: string }
  encodedArray: { kind: array, name: encodedArray, items: string, encoding: base64 }
"#;

    fn doc() -> IrDocument {
        IrDocument::parse(DOC).unwrap()
    }

    #[test]
    fn test_default_encodings() -> crate::Result<()> {
        let doc = doc();
        let mapper = TypeMapper::new(&doc);
        let node = NodeRef::service();

        let bytes = mapper.map_type("bytes", UsageContext::Property, &node)?;
        assert_eq!(bytes.encoding, Some(WireEncoding::Base64));
        let bytes_url = mapper.map_type("bytesUrl", UsageContext::Property, &node)?;
        assert_eq!(bytes_url.encoding, Some(WireEncoding::Base64Url));

        let body_date = mapper.map_type("when", UsageContext::Property, &node)?;
        assert_eq!(body_date.encoding, Some(WireEncoding::Rfc3339));
        let header_date = mapper.map_type(
            "when",
            UsageContext::Parameter(ParameterLocation::Header),
            &node,
        )?;
        assert_eq!(header_date.encoding, Some(WireEncoding::Rfc7231));
        // an explicit encoding wins over the header default
        let unix = mapper.map_type(
            "whenUnix",
            UsageContext::Parameter(ParameterLocation::Header),
            &node,
        )?;
        assert_eq!(unix.encoding, Some(WireEncoding::UnixTimestamp));
        Ok(())
    }

    #[test]
    fn test_incompatible_encodings_are_malformed() {
        let doc = doc();
        let mapper = TypeMapper::new(&doc);
        let err = mapper
            .map_type("badWhen", UsageContext::Property, &NodeRef::service())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedIr(_)));
        assert!(mapper
            .map_type("encodedArray", UsageContext::Property, &NodeRef::service())
            .is_err());
    }

    #[test]
    fn test_decimal_and_unknown() -> crate::Result<()> {
        let doc = doc();
        let mapper = TypeMapper::new(&doc);
        let price = mapper.map_type("price", UsageContext::Property, &NodeRef::service())?;
        assert_eq!(price.shape, Shape::Scalar(ScalarType::Decimal));
        let anything = mapper.map_type("anything", UsageContext::Return, &NodeRef::service())?;
        assert_eq!(anything.shape, Shape::Any);
        Ok(())
    }

    #[test]
    fn test_nullable_list_of_nullable_models() -> crate::Result<()> {
        let doc = doc();
        let mapper = TypeMapper::new(&doc);
        let list = mapper.map_type("WidgetList", UsageContext::Property, &NodeRef::service())?;
        assert!(list.nullable);
        match &list.shape {
            Shape::List(inner) => {
                assert!(inner.nullable);
                assert_eq!(inner.named(), Some(("Widget", NamedKind::Model)));
            }
            other => panic!("expected a list, got {:?}", other),
        }
        assert_eq!(list.references(), vec!["Widget"]);
        Ok(())
    }

    #[test]
    fn test_self_containing_collection_is_rejected() {
        let doc = doc();
        let mapper = TypeMapper::new(&doc);
        assert!(mapper
            .map_type("Loop", UsageContext::Property, &NodeRef::service())
            .is_err());
    }

    #[test]
    fn test_unknown_reference() {
        let doc = doc();
        let mapper = TypeMapper::new(&doc);
        let err = mapper
            .map_type("Missing", UsageContext::Property, &NodeRef::schema("Widget").child("properties").child("x"))
            .unwrap_err();
        assert!(err.to_string().contains("schemas.Widget.properties.x"));
    }
}
