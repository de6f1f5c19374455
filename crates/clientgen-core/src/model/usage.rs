//! How schemas are used by operations.
//!
//! Usage decides which optional artifacts a model gets: input models get
//! create/update surfaces when their projections differ, error models are
//! routed from failure responses, paged models are unwrapped by pagers.

// Internal imports (std, crate)
use crate::ir::{BodyContentType, HttpMethod, IrDocument, OperationNode, ParameterLocation, SchemaId, SchemaKind};

// External imports (alphabetized)
use clientgen_runtime::StatusPattern;
use indexmap::IndexMap;
use serde::Serialize;

/// Usage flags of one schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    /// Sent to the service
    pub input: bool,
    /// Received from the service
    pub output: bool,
    /// Sent as a create body (PUT or POST)
    pub create: bool,
    /// Sent as a patch body
    pub update: bool,
    /// The whole body of a JSON merge patch; nested models are not marked
    pub merge_patch: bool,
    /// Received with a failure status
    pub error: bool,
    /// Top-level page of a paged operation
    pub paged: bool,
}

impl Usage {
    fn merge(&mut self, other: Usage) -> bool {
        let before = *self;
        self.input |= other.input;
        self.output |= other.output;
        self.create |= other.create;
        self.update |= other.update;
        self.merge_patch |= other.merge_patch;
        self.error |= other.error;
        self.paged |= other.paged;
        before != *self
    }

    pub fn is_unused(&self) -> bool {
        *self == Usage::default()
    }
}

/// Usage of every schema reached from `operations`
pub fn compute_usage<'a, I>(doc: &IrDocument, operations: I) -> IndexMap<SchemaId, Usage>
where
    I: IntoIterator<Item = &'a OperationNode>,
{
    let mut usage: IndexMap<SchemaId, Usage> = IndexMap::new();

    for op in operations {
        let merge_patch = op.request_content_type == BodyContentType::MergePatch;
        let body_usage = Usage {
            input: true,
            create: !merge_patch && matches!(op.http_method, HttpMethod::Put | HttpMethod::Post),
            update: merge_patch || op.http_method == HttpMethod::Patch,
            ..Usage::default()
        };
        let whole_body = Usage {
            merge_patch,
            ..body_usage
        };
        if let Some(body) = &op.request_body_schema {
            usage.entry(body.clone()).or_default().merge(whole_body);
            propagate(doc, body, body_usage, &mut usage);
        }
        for param in &op.parameters {
            let flags = if param.location == ParameterLocation::Body {
                if param.alias_of.is_none() {
                    usage.entry(param.schema.clone()).or_default().merge(whole_body);
                }
                body_usage
            } else {
                Usage {
                    input: true,
                    ..Usage::default()
                }
            };
            propagate(doc, &param.schema, flags, &mut usage);
        }

        for (key, schema) in &op.responses {
            let Some(schema) = schema else { continue };
            let is_error = key
                .parse::<StatusPattern>()
                .map(|pattern| !pattern.is_success())
                .unwrap_or(false);
            let flags = Usage {
                output: true,
                error: is_error,
                paged: op.pagination_info.is_some() && !is_error,
                ..Usage::default()
            };
            // paged applies to the page itself, not to what it contains
            usage.entry(schema.clone()).or_default().merge(flags);
            propagate(
                doc,
                schema,
                Usage {
                    paged: false,
                    ..flags
                },
                &mut usage,
            );
        }

        if let Some(final_schema) = op
            .long_running_info
            .as_ref()
            .and_then(|lro| lro.final_result_schema.as_ref())
        {
            propagate(
                doc,
                final_schema,
                Usage {
                    output: true,
                    ..Usage::default()
                },
                &mut usage,
            );
        }
    }

    log::debug!("Computed usage for {} schemas", usage.len());
    usage
}

/// Merge `flags` into `id` and everything it references
fn propagate(doc: &IrDocument, id: &str, flags: Usage, usage: &mut IndexMap<SchemaId, Usage>) {
    let mut stack = vec![id.to_string()];
    // the root was possibly marked by the caller already, so always expand it once
    let mut first = true;
    while let Some(current) = stack.pop() {
        let changed = usage.entry(current.clone()).or_default().merge(flags);
        let force = std::mem::replace(&mut first, false);
        if !changed && !force {
            continue;
        }
        let Some(schema) = doc.schema(&current) else { continue };
        match &schema.kind {
            SchemaKind::Primitive { .. } | SchemaKind::Enum { .. } => {}
            SchemaKind::Array { items } => stack.push(items.clone()),
            SchemaKind::Map { values } => stack.push(values.clone()),
            SchemaKind::Model {
                properties,
                base_model,
            } => {
                stack.extend(properties.iter().map(|p| p.schema.clone()));
                stack.extend(base_model.iter().cloned());
            }
            SchemaKind::Union { variants } => stack.extend(variants.iter().cloned()),
            SchemaKind::DiscriminatedUnion {
                variants,
                base_model,
                ..
            } => {
                stack.extend(variants.values().cloned());
                stack.extend(base_model.iter().cloned());
            }
        }
    }
}
