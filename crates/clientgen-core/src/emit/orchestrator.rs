//! The generation pipeline as a forward-only state machine.
//!
//! Each call to [`Orchestrator::step`] runs one stage and moves to the next;
//! there is no way back. A failing stage returns its error with the
//! offending node and the run is over, since every driver consumes the
//! orchestrator.

// Internal imports (std, crate)
use std::collections::HashSet;
use std::fmt;

use super::names::{resolve_names, ResolvedNames};
use super::output::OutputTree;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ir::validate::validate;
use crate::ir::{IrDocument, OperationNode, SchemaId, ServiceInfo};
use crate::model::{compute_usage, ModelDeclaration, ModelSynthesizer};
use crate::operation::{OperationSet, OperationSynthesizer};
use crate::templates::{TemplateManager, TemplateOptions};
use crate::versioning::{visit_references, ShimTarget, VersionedSurface, VersioningResolver};

// External imports (alphabetized)
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Initialize,
    SynthesizeModels,
    SynthesizeOperations,
    ResolveVersioning,
    ResolveNames,
    Emit,
    Done,
}

impl Stage {
    /// The stage after this one; `Done` stays `Done`
    pub fn next(self) -> Self {
        match self {
            Self::Initialize => Self::SynthesizeModels,
            Self::SynthesizeModels => Self::SynthesizeOperations,
            Self::SynthesizeOperations => Self::ResolveVersioning,
            Self::ResolveVersioning => Self::ResolveNames,
            Self::ResolveNames => Self::Emit,
            Self::Emit | Self::Done => Self::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::SynthesizeModels => "synthesize-models",
            Self::SynthesizeOperations => "synthesize-operations",
            Self::ResolveVersioning => "resolve-versioning",
            Self::ResolveNames => "resolve-names",
            Self::Emit => "emit",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named declarations, ready to render
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSurface {
    pub service: ServiceInfo,
    pub surface: VersionedSurface,
    pub names: ResolvedNames,
}

pub struct Orchestrator<'a> {
    doc: &'a IrDocument,
    config: &'a Config,
    stage: Stage,
    resolver: Option<VersioningResolver<'a>>,
    selected: Vec<&'a OperationNode>,
    models: Option<IndexMap<SchemaId, ModelDeclaration>>,
    operations: Option<OperationSet>,
    surface: Option<VersionedSurface>,
    resolved: Option<ResolvedSurface>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(doc: &'a IrDocument, config: &'a Config) -> Self {
        Self {
            doc,
            config,
            stage: Stage::Initialize,
            resolver: None,
            selected: Vec::new(),
            models: None,
            operations: None,
            surface: None,
            resolved: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run the current stage and advance.
    ///
    /// `Emit` needs templates and only runs through [`Orchestrator::generate`].
    pub fn step(&mut self) -> Result<Stage> {
        log::debug!("Running stage {}", self.stage);
        match self.stage {
            Stage::Initialize => self.initialize()?,
            Stage::SynthesizeModels => self.synthesize_models()?,
            Stage::SynthesizeOperations => self.synthesize_operations()?,
            Stage::ResolveVersioning => self.resolve_versioning()?,
            Stage::ResolveNames => self.resolve_names()?,
            Stage::Emit => {
                return Err(Error::template("the emit stage runs through generate()"));
            }
            Stage::Done => return Ok(Stage::Done),
        }
        self.stage = self.stage.next();
        Ok(self.stage)
    }

    /// Run every stage before `Emit` and return the named declarations
    pub fn check(mut self) -> Result<ResolvedSurface> {
        while self.stage < Stage::Emit {
            self.step()?;
        }
        self.take_resolved()
    }

    /// Run the whole pipeline and return the rendered tree
    pub fn generate(mut self, templates: &TemplateManager, options: &TemplateOptions) -> Result<OutputTree> {
        while self.stage < Stage::Emit {
            self.step()?;
        }
        let resolved = self.take_resolved()?;
        log::debug!("Running stage {}", self.stage);
        let tree = templates.render(&resolved, self.config, options)?;
        self.stage = self.stage.next();
        log::info!("Rendered {} files", tree.len());
        Ok(tree)
    }

    fn take_resolved(&mut self) -> Result<ResolvedSurface> {
        self.resolved
            .take()
            .ok_or_else(|| out_of_order("resolved names"))
    }

    fn initialize(&mut self) -> Result<()> {
        validate(self.doc)?;
        self.config.validate()?;

        let resolver = VersioningResolver::new(self.doc, self.config.api_version.as_deref())?;
        for id in &self.config.include_operations {
            resolver.require_operation(id)?;
        }
        for id in &self.config.exclude_operations {
            if self.doc.operation(id).is_none() {
                log::warn!("Excluded operation '{}' is not declared by the service", id);
            }
        }
        for from in self.config.options.rename_model.keys() {
            let known = self.doc.schemas.contains_key(from) || self.doc.schemas.values().any(|s| &s.name == from);
            if !known {
                log::warn!("rename-model names unknown schema '{}'", from);
            }
        }

        let config = self.config;
        self.selected = self.doc.operations.iter().filter(|op| config.selects(&op.id)).collect();
        log::debug!(
            "Selected {} of {} operations",
            self.selected.len(),
            self.doc.operations.len()
        );
        self.resolver = Some(resolver);
        Ok(())
    }

    fn synthesize_models(&mut self) -> Result<()> {
        let usage = compute_usage(self.doc, self.selected.iter().copied());
        let models = ModelSynthesizer::new(self.doc, &usage, &self.config.options.rename_model).synthesize_all()?;
        self.models = Some(models);
        Ok(())
    }

    fn synthesize_operations(&mut self) -> Result<()> {
        let operations = OperationSynthesizer::new(self.doc).synthesize_all(self.selected.iter().copied())?;
        log::debug!("Synthesized {} operations", operations.operations.len());
        self.operations = Some(operations);
        Ok(())
    }

    fn resolve_versioning(&mut self) -> Result<()> {
        let resolver = self.resolver.as_ref().ok_or_else(|| out_of_order("version resolver"))?;
        let models = self.models.take().ok_or_else(|| out_of_order("models"))?;
        let operations = self.operations.take().ok_or_else(|| out_of_order("operations"))?;
        let mut surface = resolver.resolve(models, operations)?;
        remove_inner(self.doc, &self.config.options.remove_inner, &mut surface)?;
        self.surface = Some(surface);
        Ok(())
    }

    fn resolve_names(&mut self) -> Result<()> {
        let mut surface = self.surface.take().ok_or_else(|| out_of_order("versioned surface"))?;
        let names = resolve_names(&mut surface)?;
        self.resolved = Some(ResolvedSurface {
            service: self.doc.service.clone(),
            surface,
            names,
        });
        Ok(())
    }
}

fn out_of_order(what: &str) -> Error {
    Error::template(format!("pipeline stage ran before its {} existed", what))
}

/// Drop the `remove-inner` types; anything still pointing at one is an error
fn remove_inner(doc: &IrDocument, names: &[String], surface: &mut VersionedSurface) -> Result<()> {
    if names.is_empty() {
        return Ok(());
    }
    let mut removed: HashSet<SchemaId> = HashSet::new();
    for name in names {
        let matches: Vec<SchemaId> = surface
            .models
            .iter()
            .filter(|(id, decl)| {
                *id == name || decl.name == *name || doc.schema(id).map_or(false, |s| &s.name == name)
            })
            .map(|(id, _)| id.clone())
            .collect();
        if matches.is_empty() {
            log::warn!("remove-inner names '{}', which is not emitted", name);
        }
        removed.extend(matches);
    }

    surface.models.retain(|id, _| !removed.contains(id));
    surface
        .shims
        .retain(|shim| !matches!(&shim.target, ShimTarget::Model(id) if removed.contains(id)));

    visit_references(&surface.models, &surface.operations, |id, node| {
        if removed.contains(id) {
            return Err(Error::config(format!(
                "remove-inner drops '{}', but {} still references it",
                id, node
            )));
        }
        Ok(())
    })?;
    log::debug!("Removed {} inner types", removed.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
service: { name: Widgets, versions: [v1, v2] }
schemas:
  string: { kind: primitive, name: string, primitive: string }
  Widget:
    kind: model
    name: Widget
    properties:
      - { wireName: name, schema: string, required: true }
      - { wireName: audit, schema: Audit }
  Audit:
    kind: model
    name: Audit
    properties:
      - { wireName: by, schema: string }
  Trace:
    kind: model
    name: Trace
    properties:
      - { wireName: id, schema: string }
operations:
  - id: Widgets_Get
    httpMethod: GET
    pathTemplate: /widgets/{name}
    parameters:
      - { location: path, wireName: name, schema: string, required: true }
    responses: { "200": Widget }
  - id: Widgets_Analyze
    httpMethod: POST
    pathTemplate: /widgets/{name}:analyze
    addedInVersion: v2
    parameters:
      - { location: path, wireName: name, schema: string, required: true }
    responses: { "204": null }
"#;

    #[test]
    fn test_stages_run_in_order_once() -> crate::Result<()> {
        let doc = IrDocument::parse(DOC)?;
        let config = Config::new("widgets", "widgets.yaml", "out");
        let mut orchestrator = Orchestrator::new(&doc, &config);

        let mut seen = vec![orchestrator.stage()];
        while orchestrator.stage() < Stage::Emit {
            seen.push(orchestrator.step()?);
        }
        assert_eq!(
            seen,
            vec![
                Stage::Initialize,
                Stage::SynthesizeModels,
                Stage::SynthesizeOperations,
                Stage::ResolveVersioning,
                Stage::ResolveNames,
                Stage::Emit,
            ]
        );
        // emit needs templates
        assert!(orchestrator.step().is_err());
        assert_eq!(orchestrator.stage(), Stage::Emit);
        Ok(())
    }

    #[test]
    fn test_check_selects_operations() -> crate::Result<()> {
        let doc = IrDocument::parse(DOC)?;
        let mut config = Config::new("widgets", "widgets.yaml", "out");
        config.exclude_operations = vec!["Widgets_Analyze".to_string()];

        let resolved = Orchestrator::new(&doc, &config).check()?;
        let ops: Vec<&str> = resolved
            .surface
            .operations
            .operations
            .iter()
            .map(|op| op.name.as_str())
            .collect();
        assert_eq!(ops, vec!["widgets_get"]);
        Ok(())
    }

    #[test]
    fn test_included_operation_must_exist_at_version() -> crate::Result<()> {
        let doc = IrDocument::parse(DOC)?;
        let mut config = Config::new("widgets", "widgets.yaml", "out");
        config.api_version = Some("v1".to_string());
        config.include_operations = vec!["Widgets_Analyze".to_string()];

        let error = Orchestrator::new(&doc, &config).check().err();
        assert!(matches!(error, Some(Error::Versioning { .. })), "{:?}", error);
        Ok(())
    }

    #[test]
    fn test_remove_inner() -> crate::Result<()> {
        let doc = IrDocument::parse(DOC)?;
        let mut config = Config::new("widgets", "widgets.yaml", "out");
        config.options.remove_inner = vec!["Trace".to_string()];
        let resolved = Orchestrator::new(&doc, &config).check()?;
        assert!(!resolved.surface.models.contains_key("Trace"));

        // Widget still points at Audit
        config.options.remove_inner = vec!["Audit".to_string()];
        match Orchestrator::new(&doc, &config).check() {
            Err(Error::Config(message)) => assert!(message.contains("Audit"), "{}", message),
            other => panic!("expected a config error, got {:?}", other.map(|_| ())),
        }
        Ok(())
    }
}
