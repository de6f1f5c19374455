//! The single naming pass.
//!
//! Every identifier of the generated crate is registered here, in IR order,
//! and written back into the declarations. Model names go first so that a
//! pinned `rename-model` name is never displaced by a derived one; surface,
//! group and options types come after and take a suffix on collision.

// Internal imports (std, crate)
use crate::error::Result;
use crate::ir::{Lifecycle, NodeRef};
use crate::model::{DeclarationKind, OTHER_VARIANT, UNKNOWN_VARIANT};
use crate::naming::{
    to_identifier, to_upper_camel_case, CaseConvention, NameContext, NameRegistry, Namespace,
};
use crate::operation::{BindingSource, SignatureSlot, OPTIONS_KEY};
use crate::versioning::{ShimTarget, VersionedSurface};

// External imports (alphabetized)
use indexmap::IndexMap;

/// Types every generated crate declares
const RESERVED_TYPES: &[&str] = &["Client", "ClientOptions", "ServiceVersion"];
/// Module stems taken by the crate layout
const RESERVED_FILES: &[&str] = &["mod", "lib", "client", "version", "models", "options"];
/// Methods every generated model defines
const RESERVED_MEMBERS: &[&str] = &["new", "additional_properties", "insert_additional_property"];
/// Methods and fields of the generated client
const RESERVED_METHODS: &[&str] = &["new", "options", "endpoint", "transport", "with_default_endpoint"];
/// Locals of generated method bodies
const RESERVED_PARAMS: &[&str] = &[
    OPTIONS_KEY, "request", "response", "builder", "next_link", "link", "value", "payload", "patterns", "first",
    "location",
];

/// Names that are not stored on a declaration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedNames {
    /// Type name to module stem
    pub files: IndexMap<String, String>,
    /// (operation id, group id) to the argument carrying the group
    pub group_arguments: IndexMap<(String, String), String>,
    /// Version token to `ServiceVersion` variant, oldest first
    pub versions: IndexMap<String, String>,
}

impl ResolvedNames {
    pub fn file(&self, type_name: &str) -> Option<&str> {
        self.files.get(type_name).map(String::as_str)
    }

    pub fn group_argument(&self, operation_id: &str, group_id: &str) -> Option<&str> {
        self.group_arguments
            .get(&(operation_id.to_string(), group_id.to_string()))
            .map(String::as_str)
    }

    pub fn version_variant(&self, token: &str) -> Option<&str> {
        self.versions.get(token).map(String::as_str)
    }
}

fn member_owner(owner: &NodeRef, key: &str) -> NodeRef {
    NodeRef::new(format!("{}#{}", owner.path, key))
}

/// Register every name of `surface` and write the results back into it
pub fn resolve_names(surface: &mut VersionedSurface) -> Result<ResolvedNames> {
    let mut registry = NameRegistry::new();
    let mut resolved = ResolvedNames::default();

    for name in RESERVED_TYPES {
        registry.reserve(Namespace::Types, name);
    }
    for name in RESERVED_FILES {
        registry.reserve(Namespace::Files, name);
    }
    for name in RESERVED_METHODS {
        registry.reserve(Namespace::Methods, name);
    }

    // models first, in IR order
    for decl in surface.models.values_mut() {
        decl.name = registry.register(Namespace::Types, &decl.node, &decl.name, decl.pinned)?;
    }
    for decl in surface.models.values_mut() {
        let base = decl.name.clone();
        if let DeclarationKind::Struct(structure) = &mut decl.kind {
            for projection in &mut structure.surfaces {
                let suffix = match projection.lifecycle {
                    Lifecycle::Create => "Create",
                    Lifecycle::Update => "Update",
                    Lifecycle::Read => "Read",
                };
                projection.name = registry.register(
                    Namespace::Types,
                    &projection.node,
                    &format!("{}{}", base, suffix),
                    false,
                )?;
            }
        }
    }
    for group in surface.operations.groups.values_mut() {
        group.name = registry.register(Namespace::Types, &group.node, &group.name, false)?;
    }

    // methods before options types, which are named after them
    for op in &mut surface.operations.operations {
        op.name = registry.register(Namespace::Methods, &op.node, &op.name, false)?;
        if let Some(options) = &mut op.options {
            let proposed = format!("{}Options", to_upper_camel_case(&op.name));
            options.name = registry.register(Namespace::Types, &options.node, &proposed, false)?;
        }
    }

    // module stems, one per file-level type
    let mut file_owners: Vec<(String, NodeRef)> = Vec::new();
    for decl in surface.models.values() {
        file_owners.push((decl.name.clone(), decl.node.clone()));
    }
    for group in surface.operations.groups.values() {
        file_owners.push((group.name.clone(), group.node.clone()));
    }
    for op in &surface.operations.operations {
        if let Some(options) = &op.options {
            file_owners.push((options.name.clone(), options.node.clone()));
        }
    }
    for (type_name, node) in file_owners {
        let stem = registry.register(
            Namespace::Files,
            &node.facet("file"),
            &to_identifier(&type_name, CaseConvention::Snake, NameContext::Module),
            false,
        )?;
        resolved.files.insert(type_name, stem);
    }

    // members and variants of each model
    for (id, decl) in surface.models.iter_mut() {
        match &mut decl.kind {
            DeclarationKind::Struct(structure) => {
                let namespace = Namespace::Members(id.clone());
                for name in RESERVED_MEMBERS {
                    registry.reserve(namespace.clone(), name);
                }
                for field in &mut structure.fields {
                    let owner = member_owner(&decl.node, &field.path_key());
                    field.name = registry.register(namespace.clone(), &owner, &field.name, false)?;
                }
                for container in &mut structure.containers {
                    let owner = member_owner(&decl.node, &format!("container:{}", container.wire_name));
                    container.name = registry.register(namespace.clone(), &owner, &container.name, false)?;
                }
            }
            DeclarationKind::Enum(enumeration) => {
                let namespace = Namespace::Variants(id.clone());
                if enumeration.extensible {
                    registry.reserve(namespace.clone(), OTHER_VARIANT);
                }
                for member in &mut enumeration.members {
                    member.name = registry.register(namespace.clone(), &member.node, &member.name, false)?;
                }
            }
            DeclarationKind::Union(union) => {
                let namespace = Namespace::Variants(id.clone());
                for variant in &mut union.variants {
                    variant.name = registry.register(namespace.clone(), &variant.node, &variant.name, false)?;
                }
            }
            DeclarationKind::Polymorphic(poly) => {
                let namespace = Namespace::Variants(id.clone());
                registry.reserve(namespace.clone(), UNKNOWN_VARIANT);
                for variant in &mut poly.variants {
                    variant.name = registry.register(namespace.clone(), &variant.node, &variant.name, false)?;
                }
            }
        }
    }

    // an old name never displaces a current one
    for shim in &mut surface.shims {
        shim.name = match &shim.target {
            ShimTarget::Model(_) => registry.register(
                Namespace::Types,
                &shim.node,
                &to_identifier(&shim.old_name, CaseConvention::Pascal, NameContext::Type),
                false,
            )?,
            ShimTarget::Property { schema_id, path_key } => {
                let namespace = Namespace::Members(schema_id.clone());
                registry.register(
                    namespace,
                    &member_owner(&shim.node, path_key),
                    &to_identifier(&shim.old_name, CaseConvention::Snake, NameContext::Property),
                    false,
                )?
            }
            ShimTarget::Operation(_) => registry.register(
                Namespace::Methods,
                &shim.node,
                &to_identifier(&shim.old_name, CaseConvention::Snake, NameContext::Method),
                false,
            )?,
        };
    }

    for (group_id, group) in surface.operations.groups.iter_mut() {
        let namespace = Namespace::Members(format!("group:{}", group_id));
        for field in &mut group.fields {
            let owner = member_owner(&group.node, &field.wire_name);
            field.name = registry.register(namespace.clone(), &owner, &field.name, false)?;
        }
    }

    let groups = surface.operations.groups.clone();
    for op in &mut surface.operations.operations {
        for group in &mut op.groups {
            if let Some(shared) = groups.get(&group.group_id) {
                group.name = shared.name.clone();
                for field in &mut group.fields {
                    if let Some(named) = shared.field(&field.wire_name) {
                        field.name = named.name.clone();
                    }
                }
            }
        }

        let params = Namespace::Params(op.operation_id.clone());
        for name in RESERVED_PARAMS {
            registry.reserve(params.clone(), name);
        }
        let options_members = Namespace::Members(format!("options:{}", op.operation_id));

        let option_indexes: Vec<usize> = op.options.as_ref().map(|o| o.fields.clone()).unwrap_or_default();
        for slot in op.signature.clone() {
            match slot {
                SignatureSlot::Param(index) | SignatureSlot::Body(index) => {
                    let binding = &mut op.bindings[index];
                    binding.name = registry.register(params.clone(), &binding.node, &binding.name, false)?;
                }
                SignatureSlot::Group(group_id) => {
                    let type_name = groups
                        .get(&group_id)
                        .map(|g| g.name.clone())
                        .unwrap_or_else(|| group_id.clone());
                    let owner = member_owner(&op.node, &format!("group:{}", group_id));
                    let argument = registry.register(
                        params.clone(),
                        &owner,
                        &to_identifier(&type_name, CaseConvention::Snake, NameContext::Parameter),
                        false,
                    )?;
                    resolved
                        .group_arguments
                        .insert((op.operation_id.clone(), group_id), argument);
                }
                SignatureSlot::Options => {}
            }
        }

        for binding in &mut op.bindings {
            match &binding.source {
                BindingSource::Group(group_id) => {
                    if let Some(field) = groups.get(group_id).and_then(|g| g.field(&binding.wire_name)) {
                        binding.name = field.name.clone();
                    }
                }
                BindingSource::ApiVersion => binding.name = "api_version".to_string(),
                BindingSource::Argument | BindingSource::Options => {}
            }
        }
        for index in option_indexes {
            let binding = &mut op.bindings[index];
            binding.name = registry.register(options_members.clone(), &binding.node, &binding.name, false)?;
        }
    }

    for version in &surface.versions {
        let variant = registry.register(
            Namespace::Variants("ServiceVersion".to_string()),
            &NodeRef::new(format!("service.versions.{}", version.token)),
            &to_identifier(&version.token, CaseConvention::Pascal, NameContext::Variant),
            false,
        )?;
        resolved.versions.insert(version.token.clone(), variant);
    }

    log::debug!(
        "Named {} models, {} operations and {} files",
        surface.models.len(),
        surface.operations.operations.len(),
        resolved.files.len()
    );
    Ok(resolved)
}
