//! Reference wire codec for synthesized declarations.
//!
//! Decodes a JSON wire value against a [`TargetType`] into a [`LogicalValue`]
//! and encodes it back, following the same rules the generated serde code
//! follows: wire encodings from the runtime, flattened fields read from their
//! containers, known fields before additional properties, and discriminator
//! dispatch that falls back to an unknown variant instead of failing.
//!
//! The generator uses it to produce the JSON embedded in round-trip tests,
//! so a sample is only emitted if it survives decode and encode unchanged.

// Internal imports (std, crate)
use super::{DeclarationKind, ModelDeclaration, StructDecl};
use crate::error::{Error, Result};
use crate::ir::{EnumValueType, NodeRef, SchemaId, WireEncoding};
use crate::types::{NamedKind, ScalarType, Shape, TargetType};

// External imports (alphabetized)
use chrono::{DateTime, Duration, Utc};
use clientgen_runtime::path::insert_path;
use clientgen_runtime::{encoding, polymorphic, RuntimeError, UnknownVariant};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value as JsonValue};

/// A decoded value, independent of its wire encoding
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Decimal digits exactly as received
    Decimal(String),
    /// Strings, dates, times, urls and uuids
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Duration(Duration),
    List(Vec<LogicalValue>),
    Map(IndexMap<String, LogicalValue>),
    /// Enum wire value
    Enum(JsonValue),
    Model(ModelValue),
    /// Member `index` of an untagged union
    Union { index: usize, value: Box<LogicalValue> },
    Variant(VariantValue),
    /// Untyped JSON
    Json(JsonValue),
}

/// Field values of one struct, keyed by dotted wire path
#[derive(Debug, Clone, PartialEq)]
pub struct ModelValue {
    pub schema_id: SchemaId,
    pub fields: IndexMap<String, LogicalValue>,
    pub additional: IndexMap<String, LogicalValue>,
}

impl ModelValue {
    pub fn new(schema_id: impl Into<SchemaId>) -> Self {
        Self {
            schema_id: schema_id.into(),
            fields: IndexMap::new(),
            additional: IndexMap::new(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&LogicalValue> {
        self.fields.get(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantValue {
    Known { wire_value: String, value: ModelValue },
    Unknown(UnknownVariant),
}

/// Codec over a set of declarations
pub struct Codec<'a> {
    declarations: &'a IndexMap<SchemaId, ModelDeclaration>,
}

impl<'a> Codec<'a> {
    pub fn new(declarations: &'a IndexMap<SchemaId, ModelDeclaration>) -> Self {
        Self { declarations }
    }

    fn declaration(&self, id: &str, node: &NodeRef) -> Result<&'a ModelDeclaration> {
        self.declarations
            .get(id)
            .ok_or_else(|| Error::codec(node, format!("no declaration for schema '{}'", id)))
    }

    fn struct_decl(&self, id: &str, node: &NodeRef) -> Result<&'a StructDecl> {
        self.declaration(id, node)?
            .as_struct()
            .ok_or_else(|| Error::codec(node, format!("schema '{}' is not a model", id)))
    }

    /// Decode `wire` as `target`; `null` is accepted anywhere
    pub fn decode(&self, target: &TargetType, wire: &JsonValue, node: &NodeRef) -> Result<LogicalValue> {
        if wire.is_null() {
            return Ok(LogicalValue::Null);
        }
        match &target.shape {
            Shape::Any => Ok(LogicalValue::Json(wire.clone())),
            Shape::Scalar(scalar) => decode_scalar(*scalar, target.encoding, wire, node),
            Shape::List(inner) => {
                let items = wire
                    .as_array()
                    .ok_or_else(|| mismatch(node, "an array", wire))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.decode(inner, item, &node.child(index)))
                    .collect::<Result<Vec<_>>>()
                    .map(LogicalValue::List)
            }
            Shape::Map(inner) => {
                let entries = wire
                    .as_object()
                    .ok_or_else(|| mismatch(node, "an object", wire))?;
                let mut map = IndexMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.decode(inner, value, &node.child(key))?);
                }
                Ok(LogicalValue::Map(map))
            }
            Shape::Named(id, NamedKind::Model) => self.decode_model(id, wire, node).map(LogicalValue::Model),
            Shape::Named(id, NamedKind::Enum) => self.decode_enum(id, wire, node),
            Shape::Named(id, NamedKind::Union) => self.decode_union(id, wire, node),
            Shape::Named(id, NamedKind::Polymorphic) => self.decode_polymorphic(id, wire, node),
        }
    }

    /// Encode `value` as `target`
    pub fn encode(&self, target: &TargetType, value: &LogicalValue, node: &NodeRef) -> Result<JsonValue> {
        match (&target.shape, value) {
            (_, LogicalValue::Null) => Ok(JsonValue::Null),
            (Shape::Any, LogicalValue::Json(json)) => Ok(json.clone()),
            (Shape::Scalar(scalar), value) => encode_scalar(*scalar, target.encoding, value, node),
            (Shape::List(inner), LogicalValue::List(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| self.encode(inner, item, &node.child(index)))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            (Shape::Map(inner), LogicalValue::Map(entries)) => {
                let mut map = Map::new();
                for (key, item) in entries {
                    map.insert(key.clone(), self.encode(inner, item, &node.child(key))?);
                }
                Ok(JsonValue::Object(map))
            }
            (Shape::Named(_, NamedKind::Model), LogicalValue::Model(model)) => self.encode_model(model, node),
            (Shape::Named(id, NamedKind::Enum), LogicalValue::Enum(wire)) => {
                self.check_enum(id, wire, node)?;
                Ok(wire.clone())
            }
            (Shape::Named(id, NamedKind::Union), LogicalValue::Union { index, value }) => {
                let decl = self.declaration(id, node)?;
                let DeclarationKind::Union(union) = &decl.kind else {
                    return Err(Error::codec(node, format!("schema '{}' is not a union", id)));
                };
                let variant = union
                    .variants
                    .get(*index)
                    .ok_or_else(|| Error::codec(node, format!("union '{}' has no member {}", id, index)))?;
                self.encode(&variant.target, value, &variant.node)
            }
            (Shape::Named(_, NamedKind::Polymorphic), LogicalValue::Variant(variant)) => match variant {
                VariantValue::Known { value, .. } => self.encode_model(value, node),
                VariantValue::Unknown(unknown) => Ok(JsonValue::Object(unknown.payload().clone())),
            },
            (_, other) => Err(Error::codec(
                node,
                format!("value {:?} does not fit {:?}", other, target.shape),
            )),
        }
    }

    /// Decode an object as the struct declared for `schema_id`
    pub fn decode_model(&self, schema_id: &str, wire: &JsonValue, node: &NodeRef) -> Result<ModelValue> {
        let decl = self.struct_decl(schema_id, node)?;
        let object = wire.as_object().ok_or_else(|| mismatch(node, "an object", wire))?;
        let mut model = ModelValue::new(schema_id);

        for field in &decl.fields {
            let found = lookup_path(object, &field.wire_path);
            if let Some(literal) = &field.literal {
                if let Some(found) = found {
                    if found != literal {
                        return Err(Error::codec(
                            &field.node,
                            format!("expected constant {}, found {}", literal, found),
                        ));
                    }
                }
                continue;
            }
            match found {
                Some(value) => {
                    let decoded = self.decode(&field.target, value, &field.node)?;
                    model.fields.insert(field.path_key(), decoded);
                }
                None if field.is_constructor_arg() => {
                    return Err(Error::codec(
                        &field.node,
                        format!("required property '{}' is missing", field.path_key()),
                    ))
                }
                None => {}
            }
        }

        if let Some(additional) = &decl.additional {
            let known = decl.known_wire_names();
            for (key, value) in object {
                if !known.contains(&key.as_str()) {
                    let decoded = self.decode(&additional.value, value, &additional.node.child(key))?;
                    model.additional.insert(key.clone(), decoded);
                }
            }
        }
        Ok(model)
    }

    /// Encode a struct value: declared fields in wire order, then additional
    /// properties that do not shadow a declared name
    pub fn encode_model(&self, model: &ModelValue, node: &NodeRef) -> Result<JsonValue> {
        let decl = self.struct_decl(&model.schema_id, node)?;
        let mut object = Map::new();

        for field in &decl.fields {
            let encoded = match (&field.literal, model.fields.get(&field.path_key())) {
                (Some(literal), _) => literal.clone(),
                (None, Some(value)) => self.encode(&field.target, value, &field.node)?,
                (None, None) => continue,
            };
            insert_path(&mut object, &field.wire_path, encoded);
        }

        if let Some(additional) = &decl.additional {
            let known = decl.known_wire_names();
            for (key, value) in &model.additional {
                if known.contains(&key.as_str()) || object.contains_key(key) {
                    log::debug!("Skipping additional property '{}' shadowing a declared name", key);
                    continue;
                }
                let encoded = self.encode(&additional.value, value, &additional.node.child(key))?;
                object.insert(key.clone(), encoded);
            }
        }
        Ok(JsonValue::Object(object))
    }

    fn check_enum(&self, id: &str, wire: &JsonValue, node: &NodeRef) -> Result<()> {
        let decl = self.declaration(id, node)?;
        let DeclarationKind::Enum(decl) = &decl.kind else {
            return Err(Error::codec(node, format!("schema '{}' is not an enum", id)));
        };
        let type_matches = match decl.value_type {
            EnumValueType::String => wire.is_string(),
            EnumValueType::Integer => wire.is_i64() || wire.is_u64(),
        };
        if !type_matches {
            return Err(mismatch(node, "an enum value", wire));
        }
        if !decl.extensible && !decl.members.iter().any(|m| &m.value == wire) {
            return Err(Error::codec(node, format!("{} is not a member of '{}'", wire, id)));
        }
        Ok(())
    }

    fn decode_enum(&self, id: &str, wire: &JsonValue, node: &NodeRef) -> Result<LogicalValue> {
        self.check_enum(id, wire, node)?;
        Ok(LogicalValue::Enum(wire.clone()))
    }

    /// First member that accepts the value wins, in declaration order
    fn decode_union(&self, id: &str, wire: &JsonValue, node: &NodeRef) -> Result<LogicalValue> {
        let decl = self.declaration(id, node)?;
        let DeclarationKind::Union(union) = &decl.kind else {
            return Err(Error::codec(node, format!("schema '{}' is not a union", id)));
        };
        for (index, variant) in union.variants.iter().enumerate() {
            if let Ok(value) = self.decode(&variant.target, wire, &variant.node) {
                return Ok(LogicalValue::Union {
                    index,
                    value: Box::new(value),
                });
            }
        }
        Err(Error::codec(node, format!("no member of union '{}' accepts {}", id, wire)))
    }

    fn decode_polymorphic(&self, id: &str, wire: &JsonValue, node: &NodeRef) -> Result<LogicalValue> {
        let decl = self.declaration(id, node)?;
        let DeclarationKind::Polymorphic(poly) = &decl.kind else {
            return Err(Error::codec(node, format!("schema '{}' is not polymorphic", id)));
        };
        let known = polymorphic::discriminator_value(wire, &poly.discriminator)
            .and_then(|value| poly.variants.iter().find(|v| v.wire_value == value));
        match known {
            Some(variant) => Ok(LogicalValue::Variant(VariantValue::Known {
                wire_value: variant.wire_value.clone(),
                value: self.decode_model(&variant.schema_id, wire, node)?,
            })),
            None => UnknownVariant::from_payload(&poly.discriminator, wire.clone())
                .map(|unknown| LogicalValue::Variant(VariantValue::Unknown(unknown)))
                .map_err(|e| runtime(node, e)),
        }
    }
}

fn mismatch(node: &NodeRef, expected: &str, found: &JsonValue) -> Error {
    Error::codec(node, format!("expected {}, found {}", expected, found))
}

fn runtime(node: &NodeRef, error: RuntimeError) -> Error {
    Error::codec(node, error.to_string())
}

fn lookup_path<'v>(object: &'v Map<String, JsonValue>, path: &[String]) -> Option<&'v JsonValue> {
    let (first, rest) = path.split_first()?;
    let value = object.get(first)?;
    if rest.is_empty() {
        return Some(value);
    }
    lookup_path(value.as_object()?, rest)
}

fn decode_scalar(
    scalar: ScalarType,
    encoding: Option<WireEncoding>,
    wire: &JsonValue,
    node: &NodeRef,
) -> Result<LogicalValue> {
    let as_str = || wire.as_str().ok_or_else(|| mismatch(node, "a string", wire));
    let value = match scalar {
        ScalarType::String | ScalarType::Date | ScalarType::Time | ScalarType::Url | ScalarType::Uuid => {
            LogicalValue::String(as_str()?.to_string())
        }
        ScalarType::Bool => LogicalValue::Bool(wire.as_bool().ok_or_else(|| mismatch(node, "a boolean", wire))?),
        ScalarType::Int32 => {
            let value = wire.as_i64().ok_or_else(|| mismatch(node, "an integer", wire))?;
            if i32::try_from(value).is_err() {
                return Err(Error::codec(node, format!("{} does not fit a 32-bit integer", value)));
            }
            LogicalValue::Int(value)
        }
        ScalarType::Int64 => match (encoding, wire) {
            (Some(WireEncoding::NumericString), JsonValue::String(raw)) => LogicalValue::Int(
                raw.parse()
                    .map_err(|_| Error::codec(node, format!("'{}' is not an integer", raw)))?,
            ),
            _ => LogicalValue::Int(wire.as_i64().ok_or_else(|| mismatch(node, "an integer", wire))?),
        },
        ScalarType::Float32 | ScalarType::Float64 => {
            LogicalValue::Float(wire.as_f64().ok_or_else(|| mismatch(node, "a number", wire))?)
        }
        ScalarType::Decimal => match wire {
            JsonValue::Number(number) => LogicalValue::Decimal(number.to_string()),
            JsonValue::String(raw) if raw.parse::<Number>().is_ok() => LogicalValue::Decimal(raw.clone()),
            other => return Err(mismatch(node, "a decimal number", other)),
        },
        ScalarType::Bytes => {
            let raw = as_str()?;
            let bytes = match encoding {
                Some(WireEncoding::Base64Url) => encoding::decode_base64url(raw),
                _ => encoding::decode_base64(raw),
            };
            LogicalValue::Bytes(bytes.map_err(|e| runtime(node, e))?)
        }
        ScalarType::DateTime => {
            let parsed = match encoding {
                Some(WireEncoding::UnixTimestamp) => {
                    let seconds = wire.as_i64().ok_or_else(|| mismatch(node, "a unix timestamp", wire))?;
                    encoding::from_unix_timestamp(seconds)
                }
                Some(WireEncoding::Rfc7231) => encoding::parse_rfc7231(as_str()?),
                _ => encoding::parse_rfc3339(as_str()?),
            };
            LogicalValue::DateTime(parsed.map_err(|e| runtime(node, e))?)
        }
        ScalarType::Duration => {
            let parsed = match encoding {
                Some(WireEncoding::Seconds) => {
                    let seconds = wire.as_f64().ok_or_else(|| mismatch(node, "seconds", wire))?;
                    encoding::duration_from_seconds(seconds)
                }
                Some(WireEncoding::Milliseconds) => {
                    let millis = wire.as_i64().ok_or_else(|| mismatch(node, "milliseconds", wire))?;
                    encoding::duration_from_millis(millis)
                }
                _ => encoding::parse_iso8601_duration(as_str()?),
            };
            LogicalValue::Duration(parsed.map_err(|e| runtime(node, e))?)
        }
    };
    Ok(value)
}

fn encode_scalar(
    scalar: ScalarType,
    encoding: Option<WireEncoding>,
    value: &LogicalValue,
    node: &NodeRef,
) -> Result<JsonValue> {
    let encoded = match (scalar, value) {
        (
            ScalarType::String | ScalarType::Date | ScalarType::Time | ScalarType::Url | ScalarType::Uuid,
            LogicalValue::String(text),
        ) => JsonValue::String(text.clone()),
        (ScalarType::Bool, LogicalValue::Bool(flag)) => JsonValue::Bool(*flag),
        (ScalarType::Int32, LogicalValue::Int(number)) => JsonValue::from(*number),
        (ScalarType::Int64, LogicalValue::Int(number)) => match encoding {
            Some(WireEncoding::NumericString) => JsonValue::String(number.to_string()),
            _ => JsonValue::from(*number),
        },
        (ScalarType::Float32 | ScalarType::Float64, LogicalValue::Float(number)) => float(*number, node)?,
        (ScalarType::Decimal, LogicalValue::Decimal(digits)) => match serde_json::from_str::<JsonValue>(digits) {
            Ok(number @ JsonValue::Number(_)) => number,
            _ => return Err(Error::codec(node, format!("'{}' is not a decimal number", digits))),
        },
        (ScalarType::Bytes, LogicalValue::Bytes(bytes)) => JsonValue::String(match encoding {
            Some(WireEncoding::Base64Url) => encoding::encode_base64url(bytes),
            _ => encoding::encode_base64(bytes),
        }),
        (ScalarType::DateTime, LogicalValue::DateTime(when)) => match encoding {
            Some(WireEncoding::UnixTimestamp) => JsonValue::from(encoding::to_unix_timestamp(when)),
            Some(WireEncoding::Rfc7231) => JsonValue::String(encoding::format_rfc7231(when)),
            _ => JsonValue::String(encoding::format_rfc3339(when)),
        },
        (ScalarType::Duration, LogicalValue::Duration(span)) => match encoding {
            Some(WireEncoding::Seconds) => float(encoding::duration_to_seconds(span), node)?,
            Some(WireEncoding::Milliseconds) => JsonValue::from(encoding::duration_to_millis(span)),
            _ => JsonValue::String(encoding::format_iso8601_duration(span)),
        },
        (scalar, other) => {
            return Err(Error::codec(
                node,
                format!("value {:?} does not fit a {} scalar", other, scalar),
            ))
        }
    };
    Ok(encoded)
}

fn float(number: f64, node: &NodeRef) -> Result<JsonValue> {
    Number::from_f64(number)
        .map(JsonValue::Number)
        .ok_or_else(|| Error::codec(node, format!("{} cannot be written as JSON", number)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrDocument;
    use crate::model::{compute_usage, ModelSynthesizer};
    use crate::types::{TypeMapper, UsageContext};
    use serde_json::json;

    const DOC: &str = r#"
service: { name: Codec }
schemas:
  string: { kind: primitive, name: string, primitive: string }
  nullableString: { kind: primitive, name: string, primitive: string, nullable: true }
  boolean: { kind: primitive, name: boolean, primitive: boolean }
  unknown: { kind: primitive, name: unknown, primitive: unknown }
  price: { kind: primitive, name: price, primitive: decimal }
  when: { kind: primitive, name: when, primitive: dateTime, encoding: unixTimestamp }
  Tags: { kind: array, name: Tags, items: nullableString, nullable: true }
  Extras: { kind: map, name: Extras, values: unknown }
  Item:
    kind: model
    name: Item
    properties:
      - { wireName: flag, schema: boolean, required: true }
      - { wireName: tags, schema: Tags }
      - { wireName: price, schema: price }
      - { wireName: when, schema: when }
      - { wireName: extras, schema: Extras, isAdditionalProperties: true }
  Shape:
    kind: discriminatedUnion
    name: Shape
    discriminatorPropertyName: kind
    variants: { circle: Circle }
  Circle:
    kind: model
    name: Circle
    properties:
      - { wireName: kind, schema: string, required: true, literal: circle }
      - { wireName: radius, schema: price, required: true }
"#;

    fn fixture() -> (IrDocument, IndexMap<SchemaId, ModelDeclaration>) {
        let doc = IrDocument::parse(DOC).unwrap();
        let usage = compute_usage(&doc, &doc.operations);
        let renames = IndexMap::new();
        let declarations = ModelSynthesizer::new(&doc, &usage, &renames)
            .synthesize_all()
            .unwrap();
        (doc, declarations)
    }

    fn roundtrip(codec: &Codec<'_>, target: &TargetType, wire: JsonValue) -> crate::Result<LogicalValue> {
        let decoded = codec.decode(target, &wire, &NodeRef::service())?;
        let encoded = codec.encode(target, &decoded, &NodeRef::service())?;
        assert_eq!(encoded, wire);
        Ok(decoded)
    }

    #[test]
    fn test_additional_properties_keep_known_fields_first() -> crate::Result<()> {
        let (doc, declarations) = fixture();
        let codec = Codec::new(&declarations);
        let target = TypeMapper::new(&doc).map_type("Item", UsageContext::Return, &NodeRef::service())?;

        let decoded = roundtrip(&codec, &target, json!({"flag": true, "prop1": "abc", "prop2": 43.125}))?;
        let LogicalValue::Model(model) = decoded else {
            panic!("expected a model");
        };
        assert_eq!(model.get("flag"), Some(&LogicalValue::Bool(true)));
        assert_eq!(model.additional.keys().collect::<Vec<_>>(), vec!["prop1", "prop2"]);
        assert_eq!(model.additional["prop2"], LogicalValue::Json(json!(43.125)));

        // a known name in the open map is never written twice
        let mut shadowed = model.clone();
        shadowed.additional.insert("flag".to_string(), LogicalValue::Json(json!(false)));
        let encoded = codec.encode_model(&shadowed, &NodeRef::service())?;
        assert_eq!(encoded["flag"], json!(true));
        Ok(())
    }

    #[test]
    fn test_nullable_array_states_stay_distinct() -> crate::Result<()> {
        let (doc, declarations) = fixture();
        let codec = Codec::new(&declarations);
        let target = TypeMapper::new(&doc).map_type("Item", UsageContext::Return, &NodeRef::service())?;

        let absent = roundtrip(&codec, &target, json!({"flag": false}))?;
        let null = roundtrip(&codec, &target, json!({"flag": false, "tags": null}))?;
        let empty = roundtrip(&codec, &target, json!({"flag": false, "tags": []}))?;
        let holes = roundtrip(&codec, &target, json!({"flag": false, "tags": [null, "a"]}))?;

        let tags = |value: &LogicalValue| match value {
            LogicalValue::Model(model) => model.get("tags").cloned(),
            _ => None,
        };
        assert_eq!(tags(&absent), None);
        assert_eq!(tags(&null), Some(LogicalValue::Null));
        assert_eq!(tags(&empty), Some(LogicalValue::List(vec![])));
        assert_eq!(
            tags(&holes),
            Some(LogicalValue::List(vec![
                LogicalValue::Null,
                LogicalValue::String("a".to_string())
            ]))
        );
        Ok(())
    }

    #[test]
    fn test_encodings_and_decimal_precision() -> crate::Result<()> {
        let (doc, declarations) = fixture();
        let codec = Codec::new(&declarations);
        let target = TypeMapper::new(&doc).map_type("Item", UsageContext::Return, &NodeRef::service())?;

        let decoded = roundtrip(&codec, &target, json!({"flag": true, "price": 12.5, "when": 1704164645}))?;
        let LogicalValue::Model(model) = decoded else {
            panic!("expected a model");
        };
        assert_eq!(model.get("price"), Some(&LogicalValue::Decimal("12.5".to_string())));
        assert!(matches!(model.get("when"), Some(LogicalValue::DateTime(_))));

        // more digits than a double holds
        let wire: JsonValue = serde_json::from_str(r#"{"flag": true, "price": 12345678901234567.89}"#)?;
        let decoded = roundtrip(&codec, &target, wire)?;
        let LogicalValue::Model(model) = decoded else {
            panic!("expected a model");
        };
        assert_eq!(
            model.get("price"),
            Some(&LogicalValue::Decimal("12345678901234567.89".to_string()))
        );
        let encoded = codec.encode(&target, &LogicalValue::Model(model), &NodeRef::service())?;
        assert_eq!(
            serde_json::to_string(&encoded)?,
            r#"{"flag":true,"price":12345678901234567.89}"#
        );
        Ok(())
    }

    #[test]
    fn test_unknown_discriminator_falls_back() -> crate::Result<()> {
        let (doc, declarations) = fixture();
        let codec = Codec::new(&declarations);
        let target = TypeMapper::new(&doc).map_type("Shape", UsageContext::Return, &NodeRef::service())?;

        let known = roundtrip(&codec, &target, json!({"kind": "circle", "radius": 2}))?;
        assert!(matches!(known, LogicalValue::Variant(VariantValue::Known { .. })));

        let unknown = roundtrip(&codec, &target, json!({"kind": "hexagon", "sides": 6}))?;
        match unknown {
            LogicalValue::Variant(VariantValue::Unknown(raw)) => {
                assert_eq!(raw.discriminator(), Some("hexagon"));
            }
            other => panic!("expected an unknown variant, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_required_field_missing() {
        let (doc, declarations) = fixture();
        let codec = Codec::new(&declarations);
        let target = TypeMapper::new(&doc)
            .map_type("Item", UsageContext::Return, &NodeRef::service())
            .unwrap();
        let err = codec.decode(&target, &json!({"tags": []}), &NodeRef::service()).unwrap_err();
        assert!(err.to_string().contains("flag"));
    }
}
