//! Model synthesizer.
//!
//! Turns one schema node into a [`ModelDeclaration`]: inheritance is folded
//! into the field list, flattened properties are hoisted with their wire
//! paths, spread models are merged, and lifecycle projections are computed
//! for models sent to the service.

// Internal imports (std, crate)
use std::collections::HashSet;

use super::{
    AdditionalDecl, ContainerDecl, DeclarationKind, EnumDecl, EnumMember, FieldDecl, FieldOrigin,
    ModelDeclaration, PolymorphicDecl, PolymorphicVariant, StructDecl, SurfaceDecl, UnionDecl,
    UnionVariant, Usage,
};
use crate::error::{Error, Result};
use crate::ir::{IrDocument, Lifecycle, NodeRef, PropertyNode, SchemaId, SchemaKind, SchemaNode};
use crate::naming::{pluralize, to_identifier, CaseConvention, NameContext};
use crate::types::{ScalarType, Shape, TargetType, TypeMapper, UsageContext};

// External imports (alphabetized)
use indexmap::IndexMap;

/// Fields and containers of a model after folding its base chain
#[derive(Debug, Default)]
struct Folded {
    fields: Vec<FieldDecl>,
    containers: Vec<ContainerDecl>,
}

pub struct ModelSynthesizer<'a> {
    doc: &'a IrDocument,
    mapper: TypeMapper<'a>,
    usage: &'a IndexMap<SchemaId, Usage>,
    /// Original type name to pinned replacement
    renames: &'a IndexMap<String, String>,
}

impl<'a> ModelSynthesizer<'a> {
    pub fn new(
        doc: &'a IrDocument,
        usage: &'a IndexMap<SchemaId, Usage>,
        renames: &'a IndexMap<String, String>,
    ) -> Self {
        Self {
            doc,
            mapper: TypeMapper::new(doc),
            usage,
            renames,
        }
    }

    /// Synthesize every declaration-producing schema, in document order
    pub fn synthesize_all(&self) -> Result<IndexMap<SchemaId, ModelDeclaration>> {
        let mut declarations = IndexMap::new();
        for (id, schema) in &self.doc.schemas {
            if schema.is_declaration() {
                declarations.insert(id.clone(), self.synthesize(id)?);
            }
        }
        log::debug!("Synthesized {} model declarations", declarations.len());
        Ok(declarations)
    }

    pub fn synthesize(&self, schema_id: &str) -> Result<ModelDeclaration> {
        let schema = self.doc.require_schema(schema_id, &NodeRef::service())?;
        let node = self.doc.schema_ref(schema_id);
        let usage = self.usage.get(schema_id).copied().unwrap_or_default();

        let (name, pinned) = match self
            .renames
            .get(&schema.name)
            .or_else(|| self.renames.get(schema_id))
        {
            Some(renamed) => (renamed.clone(), true),
            None => (
                to_identifier(&schema.name, CaseConvention::Pascal, NameContext::Type),
                false,
            ),
        };

        let kind = match &schema.kind {
            SchemaKind::Model { properties, .. } => {
                DeclarationKind::Struct(self.synthesize_struct(schema_id, schema, properties, &name, usage)?)
            }
            SchemaKind::Enum {
                value_type,
                values,
                extensible,
            } => DeclarationKind::Enum(EnumDecl {
                value_type: *value_type,
                extensible: *extensible,
                members: values
                    .iter()
                    .map(|value| EnumMember {
                        name: to_identifier(&value.name, CaseConvention::Pascal, NameContext::Variant),
                        value: value.value.clone(),
                        description: value.description.clone(),
                        node: node.child("values").child(&value.name),
                    })
                    .collect(),
            }),
            SchemaKind::Union { variants } => {
                let mut decl = UnionDecl { variants: Vec::new() };
                for (index, variant) in variants.iter().enumerate() {
                    let variant_node = node.child("variants").child(index);
                    let target = self.mapper.map_type(variant, UsageContext::Property, &variant_node)?;
                    decl.variants.push(UnionVariant {
                        name: self.variant_name(&target),
                        target,
                        node: variant_node,
                    });
                }
                DeclarationKind::Union(decl)
            }
            SchemaKind::DiscriminatedUnion {
                discriminator_property_name,
                variants,
                base_model,
            } => {
                let mut decl = PolymorphicDecl {
                    discriminator: discriminator_property_name.clone(),
                    base: base_model.clone(),
                    variants: Vec::new(),
                };
                for (wire_value, variant) in variants {
                    let variant_node = node.child("variants").child(wire_value);
                    let variant_schema = self.doc.require_schema(variant, &variant_node)?;
                    decl.variants.push(PolymorphicVariant {
                        wire_value: wire_value.clone(),
                        schema_id: variant.clone(),
                        name: to_identifier(&variant_schema.name, CaseConvention::Pascal, NameContext::Variant),
                        versioning: variant_schema.versioning.clone(),
                        node: variant_node,
                    });
                }
                DeclarationKind::Polymorphic(decl)
            }
            SchemaKind::Primitive { .. } | SchemaKind::Array { .. } | SchemaKind::Map { .. } => {
                return Err(Error::malformed(
                    node,
                    format!("a {} schema does not produce a declaration", schema.kind.name()),
                ))
            }
        };

        Ok(ModelDeclaration {
            schema_id: schema_id.to_string(),
            node,
            name,
            pinned,
            description: schema.description.clone(),
            usage,
            versioning: schema.versioning.clone(),
            kind,
        })
    }

    fn synthesize_struct(
        &self,
        schema_id: &str,
        schema: &SchemaNode,
        properties: &[PropertyNode],
        name: &str,
        usage: Usage,
    ) -> Result<StructDecl> {
        let folded = self.fold(schema_id, &mut Vec::new())?;
        let node = self.doc.schema_ref(schema_id);

        let additional = self
            .additional_property(schema_id)?
            .map(|(property, owner)| -> Result<AdditionalDecl> {
                let prop_node = NodeRef::schema(&owner)
                    .child("properties")
                    .child(&property.wire_name)
                    .at(property.source.as_ref());
                Ok(AdditionalDecl {
                    value: self.mapper.map_additional(&property.schema, &prop_node)?,
                    node: prop_node,
                })
            })
            .transpose()?;

        let mut decl = StructDecl {
            fields: folded.fields,
            containers: folded.containers,
            additional,
            surfaces: Vec::new(),
        };
        if usage.input {
            let create = usage
                .create
                .then(|| projection(&decl, Lifecycle::Create, name, &node, false))
                .flatten();
            let update = usage
                .update
                .then(|| projection(&decl, Lifecycle::Update, name, &node, usage.merge_patch))
                .flatten();
            decl.surfaces.extend(create);
            decl.surfaces.extend(update);
        }
        log::debug!(
            "Model {} ({}): {} fields, {} containers, {} surfaces, {} own properties",
            schema_id,
            schema.name,
            decl.fields.len(),
            decl.containers.len(),
            decl.surfaces.len(),
            properties.len()
        );
        Ok(decl)
    }

    /// Fold `schema_id`'s base chain, flattened and spread properties
    fn fold(&self, schema_id: &str, visiting: &mut Vec<SchemaId>) -> Result<Folded> {
        let node = self.doc.schema_ref(schema_id);
        if visiting.iter().any(|id| id == schema_id) {
            return Err(Error::malformed(node, "model contains itself through inheritance, flattening or spreading"));
        }
        let schema = self.doc.require_schema(schema_id, &node)?;
        let SchemaKind::Model {
            properties,
            base_model,
        } = &schema.kind
        else {
            return Err(Error::malformed(node, format!("expected a model, found a {}", schema.kind.name())));
        };
        visiting.push(schema_id.to_string());

        let mut folded = Folded::default();
        if let Some(base) = base_model {
            let inherited = self.fold(base, visiting)?;
            folded.containers = inherited.containers;
            folded.fields = inherited
                .fields
                .into_iter()
                .map(|mut field| {
                    if field.origin == FieldOrigin::Own {
                        field.origin = FieldOrigin::Inherited(base.clone());
                    }
                    field
                })
                .collect();
        }

        for property in properties {
            if property.is_additional_properties {
                continue;
            }
            let prop_node = node
                .child("properties")
                .child(&property.wire_name)
                .at(property.source.as_ref());

            if property.flatten {
                let inner = self.fold(&property.schema, visiting)?;
                folded.containers.retain(|c| c.wire_name != property.wire_name);
                folded.containers.push(ContainerDecl {
                    wire_name: property.wire_name.clone(),
                    schema_id: property.schema.clone(),
                    name: member_name(property),
                    required: property.required,
                    node: prop_node.clone(),
                });
                for mut field in inner.fields {
                    field.wire_path.insert(0, property.wire_name.clone());
                    field.origin = FieldOrigin::Flattened {
                        container: property.wire_name.clone(),
                    };
                    field.required = field.required && property.required;
                    if field.versioning.is_empty() {
                        field.versioning = property.versioning.clone();
                    }
                    folded.fields.push(field);
                }
            } else if property.spread {
                let inner = self.fold(&property.schema, visiting)?;
                for mut field in inner.fields {
                    if let Some(existing) = folded.fields.iter().find(|f| f.wire_path[0] == field.wire_path[0]) {
                        return Err(Error::malformed(
                            prop_node,
                            format!(
                                "spread of '{}' collides with wire name '{}' declared at {}",
                                property.schema, field.wire_path[0], existing.node.path
                            ),
                        ));
                    }
                    if matches!(field.origin, FieldOrigin::Own | FieldOrigin::Inherited(_)) {
                        field.origin = FieldOrigin::Spread(property.schema.clone());
                    }
                    folded.fields.push(field);
                }
            } else {
                let field = self.own_field(property, prop_node.clone())?;
                match folded.fields.iter().position(|f| f.wire_path == field.wire_path) {
                    Some(index) if matches!(folded.fields[index].origin, FieldOrigin::Inherited(_)) => {
                        folded.fields[index] = field;
                    }
                    Some(index) => {
                        return Err(Error::malformed(
                            prop_node,
                            format!(
                                "wire name '{}' collides with {}",
                                property.wire_name, folded.fields[index].node.path
                            ),
                        ))
                    }
                    None => folded.fields.push(field),
                }
            }
        }

        visiting.pop();
        Ok(folded)
    }

    fn own_field(&self, property: &PropertyNode, node: NodeRef) -> Result<FieldDecl> {
        Ok(FieldDecl {
            wire_name: property.wire_name.clone(),
            wire_path: vec![property.wire_name.clone()],
            name: member_name(property),
            target: self.mapper.map_type(&property.schema, UsageContext::Property, &node)?,
            required: property.required,
            visibility: property.visibility,
            versioning: property.versioning.clone(),
            origin: FieldOrigin::Own,
            literal: property.literal.clone(),
            description: property.description.clone(),
            node,
        })
    }

    /// The additional-properties entry of a model or its nearest base
    fn additional_property(&self, schema_id: &str) -> Result<Option<(&'a PropertyNode, SchemaId)>> {
        let mut current = Some(schema_id.to_string());
        let mut seen = HashSet::new();
        while let Some(id) = current {
            if !seen.insert(id.clone()) {
                break;
            }
            let schema = self.doc.require_schema(&id, &NodeRef::schema(schema_id))?;
            let SchemaKind::Model {
                properties,
                base_model,
            } = &schema.kind
            else {
                break;
            };
            if let Some(found) = properties.iter().find(|p| p.is_additional_properties) {
                return Ok(Some((found, id)));
            }
            current = base_model.clone();
        }
        Ok(None)
    }

    /// Variant name of an untagged union member, derived from its type
    fn variant_name(&self, target: &TargetType) -> String {
        let raw = self.type_word(target);
        to_identifier(&raw, CaseConvention::Pascal, NameContext::Variant)
    }

    fn type_word(&self, target: &TargetType) -> String {
        match &target.shape {
            Shape::Named(id, _) => self
                .doc
                .schema(id)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| id.clone()),
            Shape::List(inner) => pluralize(&self.type_word(inner)),
            Shape::Map(inner) => format!("{}Map", self.type_word(inner)),
            Shape::Scalar(scalar) => match scalar {
                ScalarType::Bool => "Bool".to_string(),
                other => other.to_string(),
            },
            Shape::Any => "Json".to_string(),
        }
    }
}

fn member_name(property: &PropertyNode) -> String {
    let raw = property.client_name.as_deref().unwrap_or(&property.wire_name);
    to_identifier(raw, CaseConvention::Snake, NameContext::Property)
}

/// The lifecycle projection of a struct, when it differs from the full type.
///
/// A merge-patch body always gets one: its fields must tell an absent
/// property from an explicit `null`.
fn projection(
    decl: &StructDecl,
    lifecycle: Lifecycle,
    name: &str,
    node: &NodeRef,
    merge_patch: bool,
) -> Option<SurfaceDecl> {
    let all_optional = lifecycle == Lifecycle::Update;
    let fields: Vec<String> = decl
        .fields
        .iter()
        .filter(|f| f.is_constant() || f.visibility.allows(lifecycle))
        .map(FieldDecl::path_key)
        .collect();

    let drops_fields = fields.len() != decl.fields.len();
    let relaxes = all_optional && decl.fields.iter().any(|f| f.required && !f.is_constant());
    if !drops_fields && !relaxes && !merge_patch {
        return None;
    }
    let suffix = match lifecycle {
        Lifecycle::Create => "Create",
        Lifecycle::Update => "Update",
        Lifecycle::Read => "Read",
    };
    Some(SurfaceDecl {
        lifecycle,
        name: format!("{}{}", name, suffix),
        node: node.facet(lifecycle.as_str()),
        fields,
        all_optional,
        merge_patch,
    })
}
