//! Structural validation of a loaded service description.
//!
//! Runs once, before any synthesis, and collects every finding instead of
//! stopping at the first so a front-end author sees the whole picture.

// Internal imports (std, crate)
use std::collections::{HashMap, HashSet};

use super::{
    IrDocument, NodeRef, OperationNode, ParameterLocation, SchemaKind, SchemaNode, VersionSet,
    Versioning,
};
use crate::error::{Diagnostics, Result};

// External imports (alphabetized)
use clientgen_runtime::StatusPattern;

/// Validate references and structural invariants of `doc`.
pub fn validate(doc: &IrDocument) -> Result<()> {
    let mut diagnostics = Diagnostics::default();

    let versions = match doc.version_set() {
        Ok(versions) => versions,
        Err(e) => {
            diagnostics.push(NodeRef::service().child("versions"), e.to_string());
            VersionSet::default()
        }
    };

    for (id, schema) in &doc.schemas {
        validate_schema(doc, &versions, id, schema, &mut diagnostics);
    }

    let mut seen_ops = HashSet::new();
    for op in &doc.operations {
        let node = NodeRef::operation(&op.id).at(op.source.as_ref());
        if !seen_ops.insert(op.id.as_str()) {
            diagnostics.push(node.clone(), "duplicate operation id");
        }
        validate_operation(doc, &versions, op, &node, &mut diagnostics);
    }

    log::debug!(
        "Validated {} schemas and {} operations: {} finding(s)",
        doc.schemas.len(),
        doc.operations.len(),
        diagnostics.len()
    );
    diagnostics.into_result()
}

fn check_ref(doc: &IrDocument, id: &str, node: &NodeRef, diagnostics: &mut Diagnostics) -> bool {
    if doc.schema(id).is_some() {
        true
    } else {
        diagnostics.push(node.clone(), format!("references unknown schema '{}'", id));
        false
    }
}

fn check_versioning(
    versions: &VersionSet,
    versioning: &Versioning,
    node: &NodeRef,
    diagnostics: &mut Diagnostics,
) {
    if versioning.added.is_none() && versioning.removed.is_none() {
        return;
    }
    if let Err(e) = versions.window(versioning, node) {
        if let crate::Error::MalformedIr(found) = e {
            diagnostics.0.extend(found.0);
        } else {
            diagnostics.push(node.clone(), e.to_string());
        }
    }
}

fn validate_schema(
    doc: &IrDocument,
    versions: &VersionSet,
    id: &str,
    schema: &SchemaNode,
    diagnostics: &mut Diagnostics,
) {
    let node = NodeRef::schema(id).at(schema.source.as_ref());
    check_versioning(versions, &schema.versioning, &node, diagnostics);

    match &schema.kind {
        SchemaKind::Primitive { .. } => {}
        SchemaKind::Array { items } => {
            check_ref(doc, items, &node.child("items"), diagnostics);
        }
        SchemaKind::Map { values } => {
            check_ref(doc, values, &node.child("values"), diagnostics);
        }
        SchemaKind::Enum { values, .. } => {
            if values.is_empty() {
                diagnostics.push(node.clone(), "enum declares no values");
            }
            let mut seen = HashSet::new();
            for value in values {
                if !(value.value.is_string() || value.value.is_i64() || value.value.is_u64()) {
                    diagnostics.push(
                        node.child("values").child(&value.name),
                        format!("enum value must be a string or an integer, found {}", value.value),
                    );
                }
                if !seen.insert(value.value.to_string()) {
                    diagnostics.push(
                        node.child("values").child(&value.name),
                        format!("duplicate enum value {}", value.value),
                    );
                }
            }
        }
        SchemaKind::Model {
            properties,
            base_model,
        } => {
            if let Some(base) = base_model {
                if check_ref(doc, base, &node.child("baseModel"), diagnostics) {
                    if !matches!(doc.schema(base).map(|s| &s.kind), Some(SchemaKind::Model { .. })) {
                        diagnostics.push(node.child("baseModel"), format!("base '{}' is not a model", base));
                    }
                    if has_base_cycle(doc, id) {
                        diagnostics.push(node.child("baseModel"), "inheritance cycle");
                    }
                }
            }

            let mut wire_names = HashSet::new();
            let mut additional = 0;
            for property in properties {
                let prop_node = node
                    .child("properties")
                    .child(&property.wire_name)
                    .at(property.source.as_ref());
                check_ref(doc, &property.schema, &prop_node, diagnostics);
                check_versioning(versions, &property.versioning, &prop_node, diagnostics);

                if property.is_additional_properties {
                    additional += 1;
                    continue;
                }
                if !property.spread && !wire_names.insert(property.wire_name.as_str()) {
                    diagnostics.push(prop_node.clone(), "duplicate wire name");
                }
                if property.flatten && property.spread {
                    diagnostics.push(prop_node.clone(), "a property cannot be both flattened and spread");
                }
                if property.flatten || property.spread {
                    let target = doc.schema(&property.schema).map(|s| &s.kind);
                    if target.is_some() && !matches!(target, Some(SchemaKind::Model { .. })) {
                        diagnostics.push(prop_node, "only model-typed properties can be flattened or spread");
                    }
                }
            }
            if additional > 1 {
                diagnostics.push(node.clone(), "more than one additional-properties entry");
            }
        }
        SchemaKind::Union { variants } => {
            if variants.is_empty() {
                diagnostics.push(node.clone(), "union declares no variants");
            }
            for (index, variant) in variants.iter().enumerate() {
                check_ref(doc, variant, &node.child("variants").child(index), diagnostics);
            }
        }
        SchemaKind::DiscriminatedUnion {
            discriminator_property_name,
            variants,
            base_model,
        } => {
            if let Some(base) = base_model {
                check_ref(doc, base, &node.child("baseModel"), diagnostics);
            }
            for (wire_value, variant) in variants {
                let variant_node = node.child("variants").child(wire_value);
                if !check_ref(doc, variant, &variant_node, diagnostics) {
                    continue;
                }
                if !matches!(doc.schema(variant).map(|s| &s.kind), Some(SchemaKind::Model { .. })) {
                    diagnostics.push(variant_node, format!("variant '{}' is not a model", variant));
                    continue;
                }
                match doc.find_property(variant, discriminator_property_name) {
                    None => diagnostics.push(
                        variant_node,
                        format!(
                            "variant '{}' lacks discriminator property '{}'",
                            variant, discriminator_property_name
                        ),
                    ),
                    Some(property) => match property.literal.as_ref().and_then(|l| l.as_str()) {
                        Some(literal) if literal == wire_value => {}
                        Some(literal) => diagnostics.push(
                            variant_node,
                            format!(
                                "variant '{}' declares discriminator '{}' but is registered as '{}'",
                                variant, literal, wire_value
                            ),
                        ),
                        None => diagnostics.push(
                            variant_node,
                            format!(
                                "discriminator property '{}' of '{}' has no literal value",
                                discriminator_property_name, variant
                            ),
                        ),
                    },
                }
            }
        }
    }
}

fn has_base_cycle(doc: &IrDocument, start: &str) -> bool {
    let mut seen = HashSet::new();
    let mut current = Some(start);
    while let Some(id) = current {
        if !seen.insert(id) {
            return true;
        }
        current = match doc.schema(id).map(|s| &s.kind) {
            Some(SchemaKind::Model { base_model, .. }) => base_model.as_deref(),
            _ => None,
        };
    }
    false
}

fn validate_operation(
    doc: &IrDocument,
    versions: &VersionSet,
    op: &OperationNode,
    node: &NodeRef,
    diagnostics: &mut Diagnostics,
) {
    check_versioning(versions, &op.versioning, node, diagnostics);

    let mut path_params: HashMap<&str, usize> = HashMap::new();
    let mut api_versions = 0;
    for param in &op.parameters {
        let param_node = node
            .child("parameters")
            .child(&param.wire_name)
            .at(param.source.as_ref());
        check_ref(doc, &param.schema, &param_node, diagnostics);
        check_versioning(versions, &param.versioning, &param_node, diagnostics);

        if param.location == ParameterLocation::Path {
            *path_params.entry(param.wire_name.as_str()).or_default() += 1;
            if !param.required {
                diagnostics.push(param_node.clone(), "path parameters must be required");
            }
        }
        if param.is_api_version {
            api_versions += 1;
            if versions.is_empty() {
                diagnostics.push(param_node.clone(), "api-version parameter on an unversioned service");
            }
        }
        if param.alias_of.is_some() && param.location != ParameterLocation::Body {
            diagnostics.push(param_node, "only body parameters can alias a body property");
        }
    }
    if api_versions > 1 {
        diagnostics.push(node.clone(), "more than one api-version parameter");
    }

    let placeholders = op.path_placeholders();
    for placeholder in &placeholders {
        if !path_params.contains_key(placeholder) {
            diagnostics.push(
                node.child("pathTemplate"),
                format!("placeholder '{{{}}}' has no path parameter", placeholder),
            );
        }
    }
    for (name, count) in &path_params {
        if !placeholders.contains(name) {
            diagnostics.push(
                node.child("parameters").child(name),
                "path parameter does not appear in the path template",
            );
        }
        if *count > 1 {
            diagnostics.push(node.child("parameters").child(name), "path parameter bound twice");
        }
    }

    if let Some(body) = &op.request_body_schema {
        check_ref(doc, body, &node.child("requestBodySchema"), diagnostics);
    }

    let mut has_success = false;
    for (status, schema) in &op.responses {
        let response_node = node.child("responses").child(status);
        match status.parse::<StatusPattern>() {
            Ok(pattern) => has_success |= pattern.is_success(),
            Err(e) => diagnostics.push(response_node.clone(), e.to_string()),
        }
        if let Some(schema) = schema {
            check_ref(doc, schema, &response_node, diagnostics);
        }
    }
    if !op.responses.is_empty() && !has_success {
        diagnostics.push(node.child("responses"), "no success response declared");
    }

    if op.pagination_info.is_some() && op.long_running_info.is_some() {
        diagnostics.push(node.clone(), "paged long-running operations are not supported");
    }
    if op.pagination_info.is_some() && !op.responses.iter().any(|(status, schema)| {
        schema.is_some()
            && status
                .parse::<StatusPattern>()
                .map(|p| p.is_success())
                .unwrap_or(false)
    }) {
        diagnostics.push(node.child("paginationInfo"), "paged operation has no success body");
    }
    if let Some(lro) = &op.long_running_info {
        if let Some(result) = &lro.final_result_schema {
            check_ref(doc, result, &node.child("longRunningInfo").child("finalResultSchema"), diagnostics);
        }
    }
}
