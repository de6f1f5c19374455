//! Deterministic sample instances for generated round-trip tests.

// Internal imports (std, crate)
use super::codec::{LogicalValue, ModelValue, VariantValue};
use super::{DeclarationKind, ModelDeclaration};
use crate::error::{Error, Result};
use crate::ir::{NodeRef, SchemaId};
use crate::types::{NamedKind, ScalarType, Shape, TargetType};

// External imports (alphabetized)
use chrono::{Duration, TimeZone, Utc};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// Nesting depth after which optional members are left out
const MAX_DEPTH: usize = 3;

/// Key used for the single additional property of a sample
pub const ADDITIONAL_SAMPLE_KEY: &str = "additionalProp1";

pub struct SampleBuilder<'a> {
    declarations: &'a IndexMap<SchemaId, ModelDeclaration>,
}

impl<'a> SampleBuilder<'a> {
    pub fn new(declarations: &'a IndexMap<SchemaId, ModelDeclaration>) -> Self {
        Self { declarations }
    }

    /// A sample of the struct declared for `schema_id`, with every member it
    /// can fill without recursing forever
    pub fn model(&self, schema_id: &str) -> Result<ModelValue> {
        self.model_at(schema_id, 0, &mut Vec::new())
    }

    fn model_at(&self, schema_id: &str, depth: usize, stack: &mut Vec<SchemaId>) -> Result<ModelValue> {
        let decl = self.declaration(schema_id)?;
        let structure = decl.as_struct().ok_or_else(|| {
            Error::codec(&decl.node, "only models have samples")
        })?;
        if stack.iter().any(|id| id == schema_id) && depth > MAX_DEPTH {
            return Err(Error::codec(&decl.node, "model requires itself; no finite sample exists"));
        }
        stack.push(schema_id.to_string());

        let mut model = ModelValue::new(schema_id);
        for field in &structure.fields {
            if field.is_constant() {
                continue;
            }
            let recursive = field
                .target
                .references()
                .iter()
                .any(|id| stack.iter().any(|seen| seen == id));
            if !field.is_constructor_arg() && (depth >= MAX_DEPTH || recursive) {
                continue;
            }
            let value = self.value(&field.target, depth + 1, stack)?;
            model.fields.insert(field.path_key(), value);
        }
        if let Some(additional) = &structure.additional {
            if depth < MAX_DEPTH {
                let value = self.value(&additional.value, depth + 1, stack)?;
                model.additional.insert(ADDITIONAL_SAMPLE_KEY.to_string(), value);
            }
        }

        stack.pop();
        Ok(model)
    }

    fn declaration(&self, schema_id: &str) -> Result<&'a ModelDeclaration> {
        self.declarations.get(schema_id).ok_or_else(|| {
            Error::codec(
                &NodeRef::schema(schema_id),
                "no declaration to build a sample from",
            )
        })
    }

    fn value(&self, target: &TargetType, depth: usize, stack: &mut Vec<SchemaId>) -> Result<LogicalValue> {
        let value = match &target.shape {
            Shape::Scalar(scalar) => scalar_sample(*scalar),
            Shape::Any => LogicalValue::Json(JsonValue::String("sample".to_string())),
            Shape::List(inner) => {
                let mut items = vec![self.value(inner, depth + 1, stack)?];
                if inner.nullable {
                    items.push(LogicalValue::Null);
                }
                LogicalValue::List(items)
            }
            Shape::Map(inner) => {
                let mut entries = IndexMap::new();
                entries.insert("key".to_string(), self.value(inner, depth + 1, stack)?);
                LogicalValue::Map(entries)
            }
            Shape::Named(id, NamedKind::Model) => LogicalValue::Model(self.model_at(id, depth, stack)?),
            Shape::Named(id, kind) => {
                let decl = self.declaration(id)?;
                match (&decl.kind, kind) {
                    (DeclarationKind::Enum(decl), _) => match decl.members.first() {
                        Some(member) => LogicalValue::Enum(member.value.clone()),
                        None => return Err(Error::codec(&NodeRef::schema(id), "enum has no members")),
                    },
                    (DeclarationKind::Union(decl), _) => match decl.variants.first() {
                        Some(variant) => LogicalValue::Union {
                            index: 0,
                            value: Box::new(self.value(&variant.target, depth + 1, stack)?),
                        },
                        None => return Err(Error::codec(&NodeRef::schema(id), "union has no members")),
                    },
                    (DeclarationKind::Polymorphic(decl), _) => match decl.variants.first() {
                        Some(variant) => LogicalValue::Variant(VariantValue::Known {
                            wire_value: variant.wire_value.clone(),
                            value: self.model_at(&variant.schema_id, depth, stack)?,
                        }),
                        None => return Err(Error::codec(&NodeRef::schema(id), "polymorphic type has no variants")),
                    },
                    (DeclarationKind::Struct(_), _) => LogicalValue::Model(self.model_at(id, depth, stack)?),
                }
            }
        };
        Ok(value)
    }
}

fn scalar_sample(scalar: ScalarType) -> LogicalValue {
    match scalar {
        ScalarType::String => LogicalValue::String("sample".to_string()),
        ScalarType::Bool => LogicalValue::Bool(true),
        ScalarType::Int32 | ScalarType::Int64 => LogicalValue::Int(42),
        // exactly representable in both float widths
        ScalarType::Float32 | ScalarType::Float64 => LogicalValue::Float(1.5),
        // beyond double precision, so a lossy number path shows up in round trips
        ScalarType::Decimal => LogicalValue::Decimal("12345678901234567.89".to_string()),
        ScalarType::Bytes => LogicalValue::Bytes(b"sample".to_vec()),
        ScalarType::DateTime => Utc
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .single()
            .map(LogicalValue::DateTime)
            .unwrap_or(LogicalValue::Null),
        ScalarType::Date => LogicalValue::String("2024-01-02".to_string()),
        ScalarType::Time => LogicalValue::String("03:04:05".to_string()),
        ScalarType::Duration => LogicalValue::Duration(Duration::seconds(90)),
        ScalarType::Url => LogicalValue::String("https://example.com/sample".to_string()),
        ScalarType::Uuid => LogicalValue::String("6a2f41a3-c54c-fce8-32d2-0324e1c32e22".to_string()),
    }
}
