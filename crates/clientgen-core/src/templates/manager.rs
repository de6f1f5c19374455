//! Template loading and rendering.
//!
//! The [`TemplateManager`] owns a Tera instance and the manifest that says
//! which templates become which files. Rendering never touches the
//! filesystem: it produces an [`OutputTree`] that the caller commits.

// Internal imports (std, crate)
use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{TemplateDir, TemplateKind, TemplateOptions};
use crate::builders::{builder_for, ItemContext};
use crate::config::Config;
use crate::emit::{EmittedFile, OutputTree, ResolvedSurface};
use crate::error::{Error, Result};
use crate::manifest::{TemplateFile, TemplateManifest, FILE_PLACEHOLDER};

// External imports (alphabetized)
use serde_json::{Map, Value as JsonValue};
use tera::{Context, Tera};

const RUST_CLIENT_MANIFEST: &str = include_str!("../../templates/rust_client/manifest.yaml");

const RUST_CLIENT_TEMPLATES: &[(&str, &str)] = &[
    ("Cargo.toml.tera", include_str!("../../templates/rust_client/Cargo.toml.tera")),
    ("lib.rs.tera", include_str!("../../templates/rust_client/lib.rs.tera")),
    ("version.rs.tera", include_str!("../../templates/rust_client/version.rs.tera")),
    ("client.rs.tera", include_str!("../../templates/rust_client/client.rs.tera")),
    ("models_mod.rs.tera", include_str!("../../templates/rust_client/models_mod.rs.tera")),
    ("model.rs.tera", include_str!("../../templates/rust_client/model.rs.tera")),
    ("enum.rs.tera", include_str!("../../templates/rust_client/enum.rs.tera")),
    ("union.rs.tera", include_str!("../../templates/rust_client/union.rs.tera")),
    ("polymorphic.rs.tera", include_str!("../../templates/rust_client/polymorphic.rs.tera")),
    ("options_mod.rs.tera", include_str!("../../templates/rust_client/options_mod.rs.tera")),
    ("options.rs.tera", include_str!("../../templates/rust_client/options.rs.tera")),
    ("roundtrip.rs.tera", include_str!("../../templates/rust_client/roundtrip.rs.tera")),
];

/// Where the templates were loaded from
#[derive(Debug, Clone)]
pub enum TemplateSource {
    /// Embedded in the binary
    Builtin(TemplateKind),
    Directory(TemplateDir),
}

/// Manages loading and rendering of templates
#[derive(Debug, Clone)]
pub struct TemplateManager {
    tera: Arc<Tera>,
    source: TemplateSource,
    manifest: TemplateManifest,
}

impl TemplateManager {
    /// Load templates for `kind`.
    ///
    /// An explicit directory always wins. Otherwise the standard locations
    /// are searched, and built-in kinds fall back to the embedded templates.
    pub async fn new(kind: TemplateKind, template_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = template_dir {
            let dir = TemplateDir::discover(kind, Some(&dir))?;
            return Self::from_dir(dir).await;
        }
        match TemplateDir::discover(kind, None) {
            Ok(dir) => Self::from_dir(dir).await,
            Err(e) if e.kind() == io::ErrorKind::NotFound && kind.is_builtin() => {
                log::debug!("Using built-in '{}' templates", kind);
                Self::builtin(kind)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::config(format!(
                "'{}' templates need a template directory ({})",
                kind, e
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// The templates embedded in the binary
    pub fn builtin(kind: TemplateKind) -> Result<Self> {
        let (manifest, templates) = match kind {
            TemplateKind::RustClient => (RUST_CLIENT_MANIFEST, RUST_CLIENT_TEMPLATES),
            TemplateKind::Custom => {
                return Err(Error::config("there are no built-in 'custom' templates"));
            }
        };
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().copied())
            .map_err(|e| Error::template(format!("Failed to parse built-in templates: {}", describe(&e))))?;
        Ok(Self {
            tera: Arc::new(tera),
            source: TemplateSource::Builtin(kind),
            manifest: TemplateManifest::from_yaml(manifest)?,
        })
    }

    /// Templates and manifest read from a directory
    pub async fn from_dir(template_dir: TemplateDir) -> Result<Self> {
        let template_path = template_dir.template_path();
        let template_dir_str = template_path.to_str().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "Template path contains invalid UTF-8",
            )
        })?;
        log::debug!("Loading templates from {}", template_dir.display());

        let manifest = TemplateManifest::load_from_dir(template_path).await?;
        let tera = Tera::new(&format!("{}/**/*.tera", template_dir_str))
            .map_err(|e| Error::template(format!("Failed to parse templates: {}", describe(&e))))?;

        Ok(Self {
            tera: Arc::new(tera),
            source: TemplateSource::Directory(template_dir),
            manifest,
        })
    }

    pub fn template_kind(&self) -> TemplateKind {
        match &self.source {
            TemplateSource::Builtin(kind) => *kind,
            TemplateSource::Directory(dir) => dir.kind(),
        }
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    /// The template directory, when the templates came from disk
    pub fn template_dir(&self) -> Option<&TemplateDir> {
        match &self.source {
            TemplateSource::Directory(dir) => Some(dir),
            TemplateSource::Builtin(_) => None,
        }
    }

    pub fn manifest(&self) -> &TemplateManifest {
        &self.manifest
    }

    pub fn tera(&self) -> &Tera {
        &self.tera
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render every manifest file against the resolved declarations
    pub fn render(&self, resolved: &ResolvedSurface, config: &Config, options: &TemplateOptions) -> Result<OutputTree> {
        let builder = builder_for(&self.manifest.language)?;
        let context = builder.build(resolved, config, options)?;
        let header = options.header_comment();

        let mut tree = OutputTree::new();
        for file in &self.manifest.files {
            if file.tests && !options.include_tests {
                log::debug!("Skipping test template {}", file.source);
                continue;
            }
            if !self.has_template(&file.source) {
                return Err(Error::template(format!(
                    "manifest lists '{}', which is not a loaded template",
                    file.source
                )));
            }

            match file.for_each.as_deref() {
                Some(kind) => {
                    let items = context.items(kind).ok_or_else(|| {
                        Error::template(format!("Unknown for_each directive: {}", kind))
                    })?;
                    for item in items {
                        let destination = file.destination.replace(FILE_PLACEHOLDER, &item.file);
                        let merged = merge_contexts(&context.base, Some(item), file);
                        let rendered = self.render_file(file, &destination, merged, vec![item.name.clone()], header.as_deref())?;
                        tree.push(rendered)?;
                    }
                }
                None => {
                    let merged = merge_contexts(&context.base, None, file);
                    let rendered = self.render_file(file, &file.destination, merged, Vec::new(), header.as_deref())?;
                    tree.push(rendered)?;
                }
            }
        }
        Ok(tree)
    }

    fn render_file(
        &self,
        file: &TemplateFile,
        destination: &str,
        context: Map<String, JsonValue>,
        declarations: Vec<String>,
        header: Option<&str>,
    ) -> Result<EmittedFile> {
        log::debug!("Rendering {} -> {}", file.source, destination);
        let mut tera_context = Context::new();
        for (k, v) in &context {
            tera_context.insert(k, v);
        }

        let mut contents = self.tera.render(&file.source, &tera_context).map_err(|e| {
            log::error!(
                "Template rendering failed for '{}'; context keys: {:?}",
                file.source,
                context.keys().collect::<Vec<_>>()
            );
            Error::template(format!(
                "Failed to render template '{}' for {}: {}",
                file.source,
                destination,
                describe(&e)
            ))
        })?;
        if let Some(header) = header {
            if destination.ends_with(".rs") {
                contents.insert_str(0, header);
            }
        }

        let (namespace, file_name) = match destination.rsplit_once('/') {
            Some((namespace, file_name)) => (namespace.trim_matches('/').to_string(), file_name.to_string()),
            None => (String::new(), destination.to_string()),
        };
        Ok(EmittedFile {
            namespace,
            file_name,
            declarations,
            contents,
        })
    }

    /// Run the manifest's post-generate hooks in `output_dir`
    pub async fn run_post_generate_hooks(&self, output_dir: &Path) -> Result<()> {
        use tokio::process::Command as AsyncCommand;

        for command in &self.manifest.hooks.post_generate {
            log::info!("Running post-generation hook: {}", command);
            let output = AsyncCommand::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(output_dir)
                .output()
                .await?;

            if !output.status.success() {
                return Err(Error::template(format!(
                    "Post-generation hook '{}' failed with status {}\n{}{}",
                    command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr),
                    String::from_utf8_lossy(&output.stdout)
                )));
            }
        }
        Ok(())
    }
}

/// Base context, then the declaration's, then the manifest's own keys
fn merge_contexts(base: &Map<String, JsonValue>, item: Option<&ItemContext>, file: &TemplateFile) -> Map<String, JsonValue> {
    let mut merged = base.clone();
    if let Some(item) = item {
        for (k, v) in &item.context {
            merged.insert(k.clone(), v.clone());
        }
    }
    if let JsonValue::Object(extra) = &file.context {
        for (k, v) in extra {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}

/// Tera keeps the useful part of a message in the source chain
fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::Orchestrator;
    use crate::ir::IrDocument;
    use tempfile::tempdir;

    const DOC: &str = r#"
service: { name: Tiny, versions: ["v1"] }
schemas:
  string: { kind: primitive, name: string, primitive: string }
  Note:
    kind: model
    name: Note
    properties:
      - { wireName: text, schema: string, required: true }
operations:
  - id: Notes_Get
    httpMethod: GET
    pathTemplate: /notes/{id}
    parameters:
      - { location: path, wireName: id, schema: string, required: true }
    responses: { "200": Note }
"#;

    fn config() -> Config {
        Config::new("tiny-client", "tiny.yaml", "out")
    }

    #[test]
    fn test_builtin_templates_parse() -> crate::Result<()> {
        let manager = TemplateManager::builtin(TemplateKind::RustClient)?;
        for file in &manager.manifest().files {
            assert!(manager.has_template(&file.source), "missing {}", file.source);
        }
        assert!(manager.template_dir().is_none());
        assert!(TemplateManager::builtin(TemplateKind::Custom).is_err());
        Ok(())
    }

    #[test]
    fn test_render_skips_tests_and_applies_header() -> crate::Result<()> {
        let doc = IrDocument::parse(DOC)?;
        let config = config();
        let resolved = Orchestrator::new(&doc, &config).check()?;
        let manager = TemplateManager::builtin(TemplateKind::RustClient)?;

        let options = TemplateOptions {
            include_tests: false,
            license_header: Some("Licensed under MIT".to_string()),
            ..Default::default()
        };
        let tree = manager.render(&resolved, &config, &options)?;
        assert!(tree.get("tests/roundtrip.rs").is_none());
        let note = tree.get("src/models/note.rs").ok_or("no model file")?;
        assert!(note.contents.starts_with("// Licensed under MIT\n"));
        assert_eq!(note.declarations, vec!["Note".to_string()]);
        let cargo = tree.get("Cargo.toml").ok_or("no manifest")?;
        assert!(!cargo.contents.starts_with("//"));
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_directory() -> crate::Result<()> {
        let dir = tempdir()?;
        let kind_dir = dir.path().join("custom");
        tokio::fs::create_dir_all(&kind_dir).await?;
        tokio::fs::write(
            kind_dir.join("manifest.yaml"),
            "name: listing\nfiles:\n  - source: list.txt.tera\n    destination: models.txt\n  - source: one.txt.tera\n    destination: \"each/{file}.txt\"\n    for_each: model\n",
        )
        .await?;
        tokio::fs::write(
            kind_dir.join("list.txt.tera"),
            "{% for m in models %}{{ m.name }}\n{% endfor %}",
        )
        .await?;
        tokio::fs::write(kind_dir.join("one.txt.tera"), "{{ name }} in {{ crate_name }}").await?;

        let manager = TemplateManager::new(TemplateKind::Custom, Some(dir.path().to_path_buf())).await?;
        assert_eq!(manager.template_kind(), TemplateKind::Custom);

        let doc = IrDocument::parse(DOC)?;
        let config = config();
        let resolved = Orchestrator::new(&doc, &config).check()?;
        let tree = manager.render(&resolved, &config, &TemplateOptions::default())?;
        assert_eq!(tree.get("models.txt").map(|f| f.contents.as_str()), Some("Note\n"));
        assert_eq!(
            tree.get("each/note.txt").map(|f| f.contents.as_str()),
            Some("Note in tiny_client")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_for_each_is_rejected() -> crate::Result<()> {
        let dir = tempdir()?;
        let kind_dir = dir.path().join("custom");
        tokio::fs::create_dir_all(&kind_dir).await?;
        tokio::fs::write(
            kind_dir.join("manifest.yaml"),
            "name: bad\nfiles:\n  - source: x.tera\n    destination: x\n    for_each: endpoint\n",
        )
        .await?;
        tokio::fs::write(kind_dir.join("x.tera"), "x").await?;

        let manager = TemplateManager::new(TemplateKind::Custom, Some(kind_dir)).await?;
        let doc = IrDocument::parse(DOC)?;
        let config = config();
        let resolved = Orchestrator::new(&doc, &config).check()?;
        let err = manager
            .render(&resolved, &config, &TemplateOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("endpoint"));
        Ok(())
    }
}
