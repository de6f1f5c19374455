//! Versioning resolver.
//!
//! Narrows synthesized declarations to the surface visible at one service
//! version. Everything whose `[added, removed)` window excludes the target is
//! dropped; what stays must not point at anything that was dropped. The
//! generated client can pin any version from the oldest up to the target, so
//! operations and parameters added later than the oldest version carry a
//! gate that the client checks before sending a request.
//!
//! # Examples
//!
//! ```
//! use clientgen_core::ir::IrDocument;
//! use clientgen_core::versioning::VersioningResolver;
//!
//! let doc = IrDocument::parse(r#"{
//!     "service": { "name": "Widgets", "versions": ["v1", "v2"] },
//!     "operations": [
//!         { "id": "ping", "httpMethod": "GET", "pathTemplate": "/ping", "addedInVersion": "v2" }
//!     ]
//! }"#).unwrap();
//! let resolver = VersioningResolver::new(&doc, Some("v1")).unwrap();
//! assert!(resolver.require_operation("ping").is_err());
//! ```

// Internal imports (std, crate)
use crate::error::{Error, Result};
use crate::ir::{IrDocument, NodeRef, SchemaId, ServiceVersion, VersionSet, VersionWindow, Versioning};
use crate::model::{DeclarationKind, ModelDeclaration};
use crate::operation::{OperationDeclaration, OperationSet, ReturnShape};
use crate::types::{NamedKind, TargetType};

// External imports (alphabetized)
use indexmap::IndexMap;

/// What a compatibility shim aliases
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShimTarget {
    /// A deprecated type alias
    Model(SchemaId),
    /// A deprecated getter on a model; the field's wire path key
    Property { schema_id: SchemaId, path_key: String },
    /// A deprecated client method
    Operation(String),
}

/// Deprecated alias for something declared under a previous name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameShim {
    pub target: ShimTarget,
    /// The previous name, raw; the registry turns it into an identifier
    pub old_name: String,
    /// Registered identifier of the alias
    pub name: String,
    pub node: NodeRef,
}

/// Minimum versions the generated client checks at call time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gates {
    /// Operation id to the version it was added in
    pub operations: IndexMap<String, ServiceVersion>,
    /// (operation id, parameter wire name) to the version it was added in
    pub parameters: IndexMap<(String, String), ServiceVersion>,
}

impl Gates {
    pub fn operation(&self, operation_id: &str) -> Option<&ServiceVersion> {
        self.operations.get(operation_id)
    }

    pub fn parameter(&self, operation_id: &str, wire_name: &str) -> Option<&ServiceVersion> {
        self.parameters
            .get(&(operation_id.to_string(), wire_name.to_string()))
    }
}

/// Declarations visible at the target version
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedSurface {
    /// `None` for an unversioned service
    pub target: Option<ServiceVersion>,
    /// Versions a generated client may pin, oldest first, ending at the target
    pub versions: Vec<ServiceVersion>,
    pub models: IndexMap<SchemaId, ModelDeclaration>,
    pub operations: OperationSet,
    pub gates: Gates,
    pub shims: Vec<RenameShim>,
}

pub struct VersioningResolver<'a> {
    doc: &'a IrDocument,
    versions: VersionSet,
    target: Option<ServiceVersion>,
}

impl<'a> VersioningResolver<'a> {
    /// Resolve the target version; `None` picks the latest declared one
    pub fn new(doc: &'a IrDocument, target: Option<&str>) -> Result<Self> {
        let versions = doc.version_set()?;
        let target = match target {
            Some(token) => Some(versions.get(token).cloned().ok_or_else(|| {
                Error::config(format!(
                    "api version '{}' is not declared by the service (known: {})",
                    token,
                    versions
                        .iter()
                        .map(|v| v.token.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?),
            None => versions.latest().cloned(),
        };
        Ok(Self { doc, versions, target })
    }

    pub fn target(&self) -> Option<&ServiceVersion> {
        self.target.as_ref()
    }

    fn window(&self, versioning: &Versioning, node: &NodeRef) -> Result<VersionWindow> {
        self.versions.window(versioning, node)
    }

    fn visible(&self, window: &VersionWindow) -> bool {
        self.target.as_ref().map_or(true, |target| window.contains(target))
    }

    /// Fail unless `operation_id` exists at the target version
    pub fn require_operation(&self, operation_id: &str) -> Result<()> {
        let op = self.doc.operation(operation_id).ok_or_else(|| {
            Error::config(format!("operation '{}' is not declared by the service", operation_id))
        })?;
        let node = NodeRef::operation(&op.id).at(op.source.as_ref());
        let window = self.window(&op.versioning, &node)?;
        if self.visible(&window) {
            return Ok(());
        }
        let target = self.target.as_ref().map(|t| t.token.as_str()).unwrap_or_default();
        let reason = match (&window.added, &window.removed) {
            (Some(added), _) if self.target.as_ref().map_or(false, |t| t < added) => {
                format!("added in {}", added)
            }
            (_, Some(removed)) => format!("removed in {}", removed),
            _ => "outside its version window".to_string(),
        };
        Err(Error::versioning(
            node,
            format!("operation is not available at version {}: {}", target, reason),
        ))
    }

    pub fn resolve(
        &self,
        models: IndexMap<SchemaId, ModelDeclaration>,
        operations: OperationSet,
    ) -> Result<VersionedSurface> {
        let mut shims = Vec::new();

        let mut visible_models = IndexMap::new();
        for (id, mut decl) in models {
            let window = self.window(&decl.versioning, &decl.node)?;
            if !self.visible(&window) {
                log::debug!("Dropping {} at the target version", decl.node);
                continue;
            }
            self.narrow_model(&mut decl, &window, &mut shims)?;
            if let Some(old) = &decl.versioning.renamed_from {
                shims.push(RenameShim {
                    target: ShimTarget::Model(id.clone()),
                    old_name: old.clone(),
                    name: String::new(),
                    node: decl.node.facet("renamed"),
                });
            }
            visible_models.insert(id, decl);
        }

        let mut gates = Gates::default();
        let mut visible_ops = OperationSet::default();
        for mut decl in operations.operations {
            let window = self.window(&decl.versioning, &decl.node)?;
            if !self.visible(&window) {
                log::debug!("Dropping {} at the target version", decl.node);
                continue;
            }
            self.narrow_operation(&mut decl, &window, &mut gates)?;
            if let Some(added) = self.versions.gate(&window) {
                gates.operations.insert(decl.operation_id.clone(), added.clone());
            }
            if let Some(old) = &decl.versioning.renamed_from {
                shims.push(RenameShim {
                    target: ShimTarget::Operation(decl.operation_id.clone()),
                    old_name: old.clone(),
                    name: String::new(),
                    node: decl.node.facet("renamed"),
                });
            }
            visible_ops.operations.push(decl);
        }
        for (group_id, mut group) in operations.groups {
            let mut fields = Vec::with_capacity(group.fields.len());
            for field in group.fields {
                if self.visible(&self.window(&field.versioning, &field.node)?) {
                    fields.push(field);
                }
            }
            group.fields = fields;
            let used = visible_ops
                .operations
                .iter()
                .any(|op| op.groups.iter().any(|g| g.group_id == group_id));
            if used && !group.fields.is_empty() {
                visible_ops.groups.insert(group_id, group);
            }
        }

        check_references(&visible_models, &visible_ops, self.target.as_ref())?;

        let versions: Vec<ServiceVersion> = self
            .versions
            .iter()
            .filter(|v| self.target.as_ref().map_or(true, |t| *v <= t))
            .cloned()
            .collect();
        log::debug!(
            "Resolved {} models and {} operations at version {}",
            visible_models.len(),
            visible_ops.operations.len(),
            self.target.as_ref().map(|t| t.token.as_str()).unwrap_or("(unversioned)")
        );

        Ok(VersionedSurface {
            target: self.target.clone(),
            versions,
            models: visible_models,
            operations: visible_ops,
            gates,
            shims,
        })
    }

    fn narrow_model(
        &self,
        decl: &mut ModelDeclaration,
        window: &VersionWindow,
        shims: &mut Vec<RenameShim>,
    ) -> Result<()> {
        match &mut decl.kind {
            DeclarationKind::Struct(structure) => {
                let mut fields = Vec::with_capacity(structure.fields.len());
                for field in structure.fields.drain(..) {
                    let field_window = self.window(&field.versioning, &field.node)?;
                    if !field_window.within(window) {
                        return Err(Error::versioning(
                            field.node.clone(),
                            "property exists in versions its model does not",
                        ));
                    }
                    if !self.visible(&field_window) {
                        continue;
                    }
                    if let Some(old) = &field.versioning.renamed_from {
                        shims.push(RenameShim {
                            target: ShimTarget::Property {
                                schema_id: decl.schema_id.clone(),
                                path_key: field.path_key(),
                            },
                            old_name: old.clone(),
                            name: String::new(),
                            node: field.node.facet("renamed"),
                        });
                    }
                    fields.push(field);
                }
                structure.fields = fields;

                let kept: Vec<String> = structure.fields.iter().map(|f| f.path_key()).collect();
                for surface in &mut structure.surfaces {
                    surface.fields.retain(|key| kept.contains(key));
                }
                let fields = &structure.fields;
                structure
                    .containers
                    .retain(|c| fields.iter().any(|f| f.wire_path[0] == c.wire_name));
            }
            DeclarationKind::Polymorphic(poly) => {
                let mut variants = Vec::with_capacity(poly.variants.len());
                for variant in poly.variants.drain(..) {
                    if self.visible(&self.window(&variant.versioning, &variant.node)?) {
                        variants.push(variant);
                    }
                }
                poly.variants = variants;
            }
            DeclarationKind::Enum(_) | DeclarationKind::Union(_) => {}
        }
        Ok(())
    }

    fn narrow_operation(
        &self,
        decl: &mut OperationDeclaration,
        window: &VersionWindow,
        gates: &mut Gates,
    ) -> Result<()> {
        let mut keep = Vec::with_capacity(decl.bindings.len());
        for binding in &decl.bindings {
            let param_window = self.window(&binding.versioning, &binding.node)?;
            if !param_window.within(window) {
                return Err(Error::versioning(
                    binding.node.clone(),
                    "parameter exists in versions its operation does not",
                ));
            }
            let visible = self.visible(&param_window);
            if visible {
                // only gate what the operation's own gate does not cover
                if let Some(added) = self.versions.gate(&param_window) {
                    if window.added.as_ref() != Some(added) {
                        gates.parameters.insert(
                            (decl.operation_id.clone(), binding.wire_name.clone()),
                            added.clone(),
                        );
                    }
                }
            }
            keep.push(visible);
        }
        let mut flags = keep.into_iter();
        decl.retain_bindings(|_| flags.next().unwrap_or(false));
        Ok(())
    }
}

/// Every type mentioned by a visible declaration must itself be visible
fn check_references(
    models: &IndexMap<SchemaId, ModelDeclaration>,
    operations: &OperationSet,
    target: Option<&ServiceVersion>,
) -> Result<()> {
    visit_references(models, operations, |id, node| {
        if models.contains_key(id) {
            return Ok(());
        }
        let at = target.map(|t| t.token.as_str()).unwrap_or("the target version");
        Err(Error::versioning(
            node.clone(),
            format!("references '{}', which does not exist at {}", id, at),
        ))
    })
}

/// Call `visit` with every schema id a declaration or operation mentions,
/// along with the node that mentions it
pub(crate) fn visit_references<F>(
    models: &IndexMap<SchemaId, ModelDeclaration>,
    operations: &OperationSet,
    mut visit: F,
) -> Result<()>
where
    F: FnMut(&str, &NodeRef) -> Result<()>,
{
    let mut check = |ty: &TargetType, node: &NodeRef| -> Result<()> {
        for id in ty.references() {
            visit(id, node)?;
        }
        Ok(())
    };

    for decl in models.values() {
        match &decl.kind {
            DeclarationKind::Struct(structure) => {
                for field in &structure.fields {
                    check(&field.target, &field.node)?;
                }
                for container in &structure.containers {
                    check(&TargetType::reference(container.schema_id.clone(), NamedKind::Model), &container.node)?;
                }
                if let Some(additional) = &structure.additional {
                    check(&additional.value, &additional.node)?;
                }
            }
            DeclarationKind::Union(union) => {
                for variant in &union.variants {
                    check(&variant.target, &variant.node)?;
                }
            }
            DeclarationKind::Polymorphic(poly) => {
                for variant in &poly.variants {
                    check(&TargetType::reference(variant.schema_id.clone(), NamedKind::Model), &variant.node)?;
                }
            }
            DeclarationKind::Enum(_) => {}
        }
    }

    for op in &operations.operations {
        for binding in &op.bindings {
            check(&binding.target, &binding.node)?;
        }
        for route in &op.responses {
            if let Some(target) = &route.target {
                check(target, &route.node)?;
            }
        }
        match &op.shape {
            ReturnShape::Paged { page, item, .. } => {
                check(page, &op.node)?;
                check(item, &op.node)?;
            }
            ReturnShape::LongRunning { result: Some(result), .. } | ReturnShape::Single(Some(result)) => {
                check(result, &op.node)?
            }
            ReturnShape::LongRunning { result: None, .. } | ReturnShape::Single(None) => {}
        }
    }
    for group in operations.groups.values() {
        for field in &group.fields {
            check(&field.target, &field.node)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{compute_usage, ModelSynthesizer};
    use crate::operation::OperationSynthesizer;

    const DOC: &str = r#"
service: { name: Widgets, versions: ["v1", "v2", "v3"] }
schemas:
  string: { kind: primitive, name: string, primitive: string }
  Widget:
    kind: model
    name: Widget
    properties:
      - { wireName: name, schema: string, required: true }
      - { wireName: color, schema: string, addedInVersion: v2 }
      - { wireName: legacy, schema: string, removedInVersion: v2 }
      - { wireName: title, schema: string, renamedFrom: caption }
  Gadget:
    kind: model
    name: Gadget
    addedInVersion: v2
    properties:
      - { wireName: id, schema: string, required: true }
operations:
  - id: Widgets_Get
    httpMethod: GET
    pathTemplate: /widgets/{id}
    parameters:
      - { location: path, wireName: id, schema: string, required: true }
      - { location: query, wireName: expand, schema: string, addedInVersion: v3 }
    responses:
      "200": Widget
  - id: Gadgets_Get
    httpMethod: GET
    pathTemplate: /gadgets/{id}
    addedInVersion: v2
    renamedFrom: Gizmos_Get
    parameters:
      - { location: path, wireName: id, schema: string, required: true }
    responses:
      "200": Gadget
"#;

    fn resolve(doc: &IrDocument, target: Option<&str>) -> crate::Result<VersionedSurface> {
        let usage = compute_usage(doc, &doc.operations);
        let renames = IndexMap::new();
        let models = ModelSynthesizer::new(doc, &usage, &renames).synthesize_all()?;
        let operations = OperationSynthesizer::new(doc).synthesize_all(&doc.operations)?;
        VersioningResolver::new(doc, target)?.resolve(models, operations)
    }

    fn field_names(surface: &VersionedSurface, id: &str) -> Vec<String> {
        surface.models[id]
            .as_struct()
            .map(|s| s.fields.iter().map(|f| f.wire_name.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_visible_surface_per_version() -> crate::Result<()> {
        let doc = IrDocument::parse(DOC)?;

        let v1 = resolve(&doc, Some("v1"))?;
        assert_eq!(field_names(&v1, "Widget"), vec!["name", "legacy", "title"]);
        assert!(!v1.models.contains_key("Gadget"));
        assert_eq!(v1.operations.operations.len(), 1);
        assert_eq!(v1.operations.operations[0].bindings.len(), 1);
        assert_eq!(v1.versions.len(), 1);

        let v3 = resolve(&doc, None)?;
        assert_eq!(v3.target.as_ref().map(|t| t.token.as_str()), Some("v3"));
        assert_eq!(field_names(&v3, "Widget"), vec!["name", "color", "title"]);
        assert_eq!(v3.operations.operations.len(), 2);
        Ok(())
    }

    #[test]
    fn test_gates_and_shims() -> crate::Result<()> {
        let doc = IrDocument::parse(DOC)?;
        let surface = resolve(&doc, Some("v3"))?;
        assert_eq!(surface.gates.operation("Gadgets_Get").map(|v| v.token.as_str()), Some("v2"));
        assert!(surface.gates.operation("Widgets_Get").is_none());
        assert_eq!(
            surface.gates.parameter("Widgets_Get", "expand").map(|v| v.token.as_str()),
            Some("v3")
        );

        let olds: Vec<&str> = surface.shims.iter().map(|s| s.old_name.as_str()).collect();
        assert_eq!(olds, vec!["caption", "Gizmos_Get"]);
        Ok(())
    }

    #[test]
    fn test_dropped_reference_is_an_error() -> crate::Result<()> {
        let broken = DOC.replace(
            "      - { wireName: title, schema: string, renamedFrom: caption }",
            "      - { wireName: title, schema: string, renamedFrom: caption }\n      - { wireName: gadget, schema: Gadget }",
        );
        let doc = IrDocument::parse(&broken)?;
        let err = resolve(&doc, Some("v1")).unwrap_err();
        assert!(matches!(err, Error::Versioning { .. }));
        assert!(err.to_string().contains("Gadget"));
        Ok(())
    }

    #[test]
    fn test_parameter_outside_operation_window() -> crate::Result<()> {
        let broken = DOC.replace(
            "      - { location: path, wireName: id, schema: string, required: true }\n    responses:\n      \"200\": Gadget",
            "      - { location: path, wireName: id, schema: string, required: true, addedInVersion: v1 }\n    responses:\n      \"200\": Gadget",
        );
        assert_ne!(broken, DOC);
        let doc = IrDocument::parse(&broken)?;
        let err = resolve(&doc, Some("v3")).unwrap_err();
        assert!(err.to_string().contains("versions its operation does not"));
        Ok(())
    }

    #[test]
    fn test_require_operation() -> crate::Result<()> {
        let doc = IrDocument::parse(DOC)?;
        let resolver = VersioningResolver::new(&doc, Some("v1"))?;
        assert!(resolver.require_operation("Widgets_Get").is_ok());
        let err = resolver.require_operation("Gadgets_Get").unwrap_err();
        assert!(err.to_string().contains("added in v2"));
        assert!(matches!(
            VersioningResolver::new(&doc, Some("v9")),
            Err(Error::Config(_))
        ));
        Ok(())
    }
}
