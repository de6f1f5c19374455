//! End-to-end runs of the pipeline over the widgets fixture.

use std::path::PathBuf;
use std::process::Command;

use clientgen_core::{
    check, generate, Config, Error, IrDocument, Orchestrator, OutputTree, TemplateKind, TemplateManager,
    TemplateOptions,
};
use tempfile::tempdir;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/widgets.ir.yaml")
}

fn config(output_dir: &str) -> Config {
    let ir_path = fixture_path().display().to_string();
    Config::new("widgets-client", ir_path, output_dir)
}

async fn render(config: &Config) -> clientgen_core::Result<OutputTree> {
    let doc = IrDocument::from_file(fixture_path()).await?;
    let templates = TemplateManager::builtin(TemplateKind::RustClient)?;
    Orchestrator::new(&doc, config).generate(&templates, &TemplateOptions::default())
}

fn contents<'t>(tree: &'t OutputTree, path: &str) -> &'t str {
    tree.get(path)
        .map(|file| file.contents.as_str())
        .unwrap_or_else(|| panic!("{} was not emitted", path))
}

#[tokio::test]
async fn test_crate_layout() -> clientgen_core::Result<()> {
    let tree = render(&config("out")).await?;
    for path in [
        "Cargo.toml",
        "src/lib.rs",
        "src/version.rs",
        "src/client.rs",
        "src/models/mod.rs",
        "src/models/widget.rs",
        "src/models/color.rs",
        "src/models/fish.rs",
        "src/models/shark.rs",
        "src/options/mod.rs",
        "src/options/widget_scope.rs",
        "tests/roundtrip.rs",
    ] {
        assert!(tree.get(path).is_some(), "missing {}", path);
    }
    assert!(contents(&tree, "Cargo.toml").contains("name = \"widgets-client\""));
    assert!(contents(&tree, "src/lib.rs").contains("pub use version::ServiceVersion;"));
    assert!(contents(&tree, "src/models/mod.rs").contains("pub use self::widget::*;"));
    Ok(())
}

#[tokio::test]
async fn test_shared_parameter_group() -> clientgen_core::Result<()> {
    let tree = render(&config("out")).await?;
    let group = contents(&tree, "src/options/widget_scope.rs");
    assert!(group.contains("pub struct WidgetScope {"));
    assert!(group.contains("pub scope: String,"));
    assert!(group.contains("pub id: String,"));

    let client = contents(&tree, "src/client.rs");
    assert!(client.contains("pub fn widgets_get(&self, widget_scope: &WidgetScope)"));
    assert!(client.contains("let value = &widget_scope.scope;"));
    assert!(client.contains("let value = self.options.api_version.as_str();"));
    Ok(())
}

#[tokio::test]
async fn test_generated_items_keep_their_indentation() -> clientgen_core::Result<()> {
    let tree = render(&config("out")).await?;
    let client = contents(&tree, "src/client.rs");
    assert!(client.contains("\n    pub fn widgets_get(&self, widget_scope: &WidgetScope)"));
    assert!(!client.contains("\npub fn "));
    assert!(!client.contains("\n///"));

    let widget = contents(&tree, "src/models/widget.rs");
    assert!(widget.contains("\n    #[serde(rename = \"name\")]\n    name: String,"));
    assert!(widget.contains("\n    pub fn new("));

    let color = contents(&tree, "src/models/color.rs");
    assert!(color.contains("\n            Self::Red => \"red\","));
    Ok(())
}

#[tokio::test]
async fn test_models_keep_wire_semantics() -> clientgen_core::Result<()> {
    let tree = render(&config("out")).await?;
    let widget = contents(&tree, "src/models/widget.rs");

    // absent, null and a value are three different states
    assert!(widget.contains("counts: rt::Nullable<Vec<Option<i32>>>,"));
    assert!(widget.contains("pub const KNOWN_PROPERTIES"));
    assert!(widget.contains("pub fn insert_additional_property("));

    let (_, create) = widget
        .split_once("pub struct WidgetCreate {")
        .ok_or("no create projection")?;
    let create = create.split('}').next().unwrap_or_default();
    assert!(create.contains("pub secret: Option<String>,"));
    assert!(!create.contains("pub id:"));

    let color = contents(&tree, "src/models/color.rs");
    assert!(color.contains("Other(String),"));
    Ok(())
}

#[tokio::test]
async fn test_request_body_encodings() -> clientgen_core::Result<()> {
    let tree = render(&config("out")).await?;
    let client = contents(&tree, "src/client.rs");
    assert!(client.contains("body: &WidgetUpdate"));
    assert!(client.contains("let builder = builder.merge_patch_body(&value)?;"));
    assert!(client.contains(
        "let builder = builder.multipart_body(&value, &[rt::PartSpec::text(\"caption\"), \
         rt::PartSpec::text(\"color\"), rt::PartSpec::file(\"photo\"), \
         rt::PartSpec::files(\"thumbnails\"), rt::PartSpec::json(\"tags\")])?;"
    ));
    assert!(client.contains("let builder = builder.json_body(&value)?;"));

    // every merge-patch field can be cleared with an explicit null
    let widget = contents(&tree, "src/models/widget.rs");
    let (_, update) = widget
        .split_once("pub struct WidgetUpdate {")
        .ok_or("no update projection")?;
    let update = update.split('}').next().unwrap_or_default();
    assert!(update.contains("pub name: rt::Nullable<String>,"));
    assert!(update.contains("pub color: rt::Nullable<Color>,"));
    assert!(update.contains("pub price: rt::Nullable<rust_decimal::Decimal>,"));
    assert!(!update.contains("pub secret:"));
    Ok(())
}

#[tokio::test]
async fn test_decimals_stay_exact() -> clientgen_core::Result<()> {
    let tree = render(&config("out")).await?;
    let manifest = contents(&tree, "Cargo.toml");
    assert!(manifest.contains("\"serde-float\", \"serde-arbitrary-precision\""));
    assert!(manifest.contains("\"preserve_order\", \"arbitrary_precision\""));

    let widget = contents(&tree, "src/models/widget.rs");
    assert!(widget.contains("rust_decimal::Decimal"));
    // a value past f64 precision, so a lossy path fails the generated test
    assert!(contents(&tree, "tests/roundtrip.rs").contains("12345678901234567.89"));
    Ok(())
}

#[tokio::test]
async fn test_status_routing_and_polymorphism() -> clientgen_core::Result<()> {
    let tree = render(&config("out")).await?;
    let client = contents(&tree, "src/client.rs");
    assert!(client.contains("rt::StatusPattern::Exact(404)"));
    assert!(client.contains("rt::StatusPattern::Range { low: 400, high: 499 }"));
    assert!(client.contains("response.service_error::<NotFound>(\"404\")"));
    assert!(client.contains("response.service_error::<ClientFault>(\"4XX\")"));

    let fish = contents(&tree, "src/models/fish.rs");
    assert!(fish.contains("Unknown(rt::UnknownVariant),"));
    assert!(fish.contains("Some(\"shark\") => serde_json::from_value(payload)"));
    assert!(contents(&tree, "tests/roundtrip.rs").contains("fn fish_unknown_roundtrip()"));
    Ok(())
}

#[tokio::test]
async fn test_version_gate() -> clientgen_core::Result<()> {
    let tree = render(&config("out")).await?;
    let client = contents(&tree, "src/client.rs");
    assert!(client.contains(
        "rt::ensure_available(\"Fish_Catch\", self.options.api_version, Some(ServiceVersion::V20240601), None)?;"
    ));
    assert!(contents(&tree, "src/version.rs").contains("Self::V20240101 => \"2024-01-01\","));

    // pinned to the older version the operation is not generated at all
    let mut pinned = config("out");
    pinned.api_version = Some("2024-01-01".to_string());
    let tree = render(&pinned).await?;
    assert!(!contents(&tree, "src/client.rs").contains("pub fn fish_catch("));
    Ok(())
}

#[tokio::test]
async fn test_rename_and_filter() -> clientgen_core::Result<()> {
    let mut renamed = config("out");
    renamed
        .options
        .rename_model
        .insert("Widget".to_string(), "Gizmo".to_string());
    renamed.exclude_operations = vec!["Fish_Catch".to_string()];
    let tree = render(&renamed).await?;
    assert!(contents(&tree, "src/models/gizmo.rs").contains("pub struct Gizmo {"));
    assert!(tree.get("src/models/widget.rs").is_none());
    assert!(!contents(&tree, "src/client.rs").contains("fish_catch"));
    Ok(())
}

#[tokio::test]
async fn test_generate_writes_output() -> clientgen_core::Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("widgets-client");
    let config = config(&output.display().to_string());
    generate(&config, None).await?;

    let lib = tokio::fs::read_to_string(output.join("src/lib.rs")).await?;
    assert!(lib.starts_with("//! Client for the Widgets service."));
    assert!(output.join("tests/roundtrip.rs").exists());
    Ok(())
}

/// Builds the generated crate against the local runtime and runs its tests.
/// Needs network access for the registry dependencies.
#[tokio::test]
#[ignore]
async fn test_generated_crate_passes_its_own_tests() -> clientgen_core::Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("widgets-client");
    let runtime = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../clientgen-runtime");
    let options = TemplateOptions {
        runtime_path: Some(runtime.canonicalize()?.display().to_string()),
        ..TemplateOptions::default()
    };
    generate(&config(&output.display().to_string()), Some(options)).await?;

    let status = Command::new(env!("CARGO"))
        .arg("test")
        .arg("--quiet")
        .current_dir(&output)
        .env("CARGO_TARGET_DIR", dir.path().join("target"))
        .status()?;
    assert!(status.success(), "cargo test failed in {}", output.display());
    Ok(())
}

#[tokio::test]
async fn test_check_reports_malformed_input() -> clientgen_core::Result<()> {
    let resolved = check(&config("out")).await?;
    assert_eq!(resolved.service.name, "Widgets");

    let dir = tempdir()?;
    let broken = dir.path().join("broken.ir.yaml");
    tokio::fs::write(
        &broken,
        "service: { name: Broken }\nschemas:\n  Thing:\n    kind: model\n    name: Thing\n    properties:\n      - { wireName: part, schema: Missing }\n",
    )
    .await?;
    let config = Config::new("broken", broken.display().to_string(), "out");
    let result = check(&config).await;
    assert!(matches!(result, Err(Error::MalformedIr(_))), "{:?}", result.err());
    Ok(())
}
