//! Configuration management for client generation.
//!
//! This module defines the `Config` struct and related functionality for managing
//! generation settings. The configuration can be loaded from a YAML, JSON or
//! TOML file (picked by extension), created programmatically, or assembled
//! from command-line arguments.
//!
//! # Examples
//!
//! ```no_run
//! use clientgen_core::config::Config;
//!
//! // Create a new config programmatically
//! let mut config = Config::new("widgets-client", "widgets.ir.yaml", "output");
//! config.api_version = Some("2024-06-01".to_string());
//! config
//!     .options
//!     .rename_model
//!     .insert("WidgetResource".to_string(), "Widget".to_string());
//!
//! // Or load from a config file
//! # async fn load() -> clientgen_core::Result<()> {
//! let config = Config::from_file("clientgen.yaml").await?;
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::Path;

use crate::error::{Error, Result};
use crate::naming::namer::is_reserved_type_name;

// External imports (alphabetized)
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_value::Value as SerdeValue;
use tokio::fs;

/// A schema name on the left of a rename, a Rust type name on the right
static RENAME_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*:\s*([A-Za-z_][A-Za-z0-9_]*)\s*$").unwrap()
});

static TYPE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Configuration for client generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Project name; also the generated crate's package name
    pub project_name: String,

    /// Path or URL of the IR document
    pub ir_path: String,

    /// Output directory for generated code
    pub output_dir: String,

    /// Template to use for code generation
    #[serde(default = "default_template")]
    pub template_kind: String,

    /// Optional path to template directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<String>,

    /// Service version to generate for; the latest declared one when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Operations to generate; every operation when empty
    #[serde(default)]
    pub include_operations: Vec<String>,

    /// Operations to leave out
    #[serde(default)]
    pub exclude_operations: Vec<String>,

    /// Emitter options
    #[serde(default)]
    pub options: EmitterOptions,
}

/// Options that change what is emitted rather than where
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmitterOptions {
    /// Schema name to the type name it is emitted under
    #[serde(
        rename = "rename-model",
        default,
        deserialize_with = "deserialize_renames",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub rename_model: IndexMap<String, String>,

    /// Types to leave out of the output entirely
    #[serde(
        rename = "remove-inner",
        default,
        deserialize_with = "deserialize_names",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub remove_inner: Vec<String>,
}

/// Serialization format of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(Error::config(format!(
                "cannot tell the format of '{}' (extension {:?}); use .yaml, .json or .toml",
                path.display(),
                other.unwrap_or("")
            ))),
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new(
        project_name: impl Into<String>,
        ir_path: impl Into<String>,
        output_dir: impl Into<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            ir_path: ir_path.into(),
            output_dir: output_dir.into(),
            template_kind: default_template(),
            template_dir: None,
            api_version: None,
            include_operations: Vec::new(),
            exclude_operations: Vec::new(),
            options: EmitterOptions::default(),
        }
    }

    /// Load configuration from a file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let content = fs::read_to_string(path).await?;
        let config = Self::parse(&content, format)
            .map_err(|e| Error::config(format!("invalid configuration in {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str, format: Format) -> std::result::Result<Self, String> {
        match format {
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str::<serde_json::Value>(content)
                .and_then(serde_json::from_value)
                .map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Save configuration to a file
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match Format::of(path)? {
            Format::Yaml => serde_yaml::to_string(self)?,
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };
        fs::write(path, content).await?;
        Ok(())
    }

    /// Checks that do not need the IR
    pub fn validate(&self) -> Result<()> {
        let mut targets: IndexMap<&str, &str> = IndexMap::new();
        for (from, to) in &self.options.rename_model {
            if !TYPE_NAME.is_match(to) {
                return Err(Error::config(format!(
                    "rename-model target '{}' for '{}' is not a valid type name",
                    to, from
                )));
            }
            if is_reserved_type_name(to) {
                return Err(Error::config(format!(
                    "rename-model target '{}' for '{}' is a reserved name",
                    to, from
                )));
            }
            if let Some(previous) = targets.insert(to.as_str(), from.as_str()) {
                return Err(Error::config(format!(
                    "rename-model maps both '{}' and '{}' to '{}'",
                    previous, from, to
                )));
            }
        }
        if let Some(op) = self
            .include_operations
            .iter()
            .find(|op| self.exclude_operations.contains(op))
        {
            return Err(Error::config(format!(
                "operation '{}' is both included and excluded",
                op
            )));
        }
        Ok(())
    }

    /// Whether the operation passes the include and exclude lists
    pub fn selects(&self, operation_id: &str) -> bool {
        let included = self.include_operations.is_empty()
            || self.include_operations.iter().any(|op| op == operation_id);
        included && !self.exclude_operations.iter().any(|op| op == operation_id)
    }
}

/// Parse the compact `From:To,From2:To2` form of `rename-model`
pub fn parse_renames(raw: &str) -> Result<IndexMap<String, String>> {
    let mut renames = IndexMap::new();
    for pair in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let captures = RENAME_PAIR.captures(pair).ok_or_else(|| {
            Error::config(format!(
                "rename-model entry '{}' is not of the form From:To",
                pair.trim()
            ))
        })?;
        renames.insert(captures[1].to_string(), captures[2].to_string());
    }
    Ok(renames)
}

/// Parse the compact `A,B` form of `remove-inner`
pub fn parse_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn describe(value: &SerdeValue) -> &'static str {
    match value {
        SerdeValue::Bool(_) => "a boolean",
        SerdeValue::U8(_)
        | SerdeValue::U16(_)
        | SerdeValue::U32(_)
        | SerdeValue::U64(_)
        | SerdeValue::I8(_)
        | SerdeValue::I16(_)
        | SerdeValue::I32(_)
        | SerdeValue::I64(_)
        | SerdeValue::F32(_)
        | SerdeValue::F64(_) => "a number",
        SerdeValue::String(_) | SerdeValue::Char(_) => "a string",
        SerdeValue::Seq(_) => "a list",
        SerdeValue::Map(_) => "a map",
        SerdeValue::Unit | SerdeValue::Option(None) => "null",
        _ => "an unsupported value",
    }
}

/// Accept a `{From: To}` map or the compact string form
fn deserialize_renames<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;
    match value {
        SerdeValue::String(raw) => parse_renames(&raw).map_err(serde::de::Error::custom),
        SerdeValue::Map(entries) => {
            let mut renames = IndexMap::new();
            for (from, to) in entries {
                match (from, to) {
                    (SerdeValue::String(from), SerdeValue::String(to)) => {
                        renames.insert(from, to);
                    }
                    (SerdeValue::String(from), other) => {
                        return Err(serde::de::Error::custom(format!(
                            "rename-model target for '{}' must be a string, found {}",
                            from,
                            describe(&other)
                        )))
                    }
                    (other, _) => {
                        return Err(serde::de::Error::custom(format!(
                            "rename-model keys must be strings, found {}",
                            describe(&other)
                        )))
                    }
                }
            }
            Ok(renames)
        }
        other => Err(serde::de::Error::custom(format!(
            "rename-model must be a map or a 'From:To,...' string, found {}",
            describe(&other)
        ))),
    }
}

/// Accept a list of names or the compact string form
fn deserialize_names<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;
    match value {
        SerdeValue::String(raw) => Ok(parse_names(&raw)),
        SerdeValue::Seq(items) => items
            .into_iter()
            .map(|item| match item {
                SerdeValue::String(name) => Ok(name),
                other => Err(serde::de::Error::custom(format!(
                    "remove-inner entries must be strings, found {}",
                    describe(&other)
                ))),
            })
            .collect(),
        other => Err(serde::de::Error::custom(format!(
            "remove-inner must be a list or an 'A,B' string, found {}",
            describe(&other)
        ))),
    }
}

fn default_template() -> String {
    "rust_client".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_config_roundtrip() -> crate::Result<()> {
        let dir = tempdir()?;

        let mut config = Config::new("widgets-client", "widgets.ir.json", "output");
        config.api_version = Some("v2".to_string());
        config.options.remove_inner = vec!["Audit".to_string()];
        config
            .options
            .rename_model
            .insert("WidgetResource".to_string(), "Widget".to_string());

        for name in ["config.yaml", "config.json", "config.toml"] {
            let file_path = dir.path().join(name);
            config.save(&file_path).await?;
            let loaded = Config::from_file(&file_path).await?;
            assert_eq!(loaded, config, "{}", name);
        }
        assert_eq!(config.template_kind, default_template());
        Ok(())
    }

    #[tokio::test]
    async fn test_compact_options() -> crate::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("clientgen.yaml");
        fs::write(
            &file_path,
            r#"
project_name: widgets
ir_path: widgets.yaml
output_dir: out
options:
  rename-model: "WidgetResource:Widget, Thing:Gizmo"
  remove-inner: "Audit, Trace"
"#,
        )
        .await?;

        let config = Config::from_file(&file_path).await?;
        assert_eq!(config.options.rename_model.get("Thing").map(String::as_str), Some("Gizmo"));
        assert_eq!(config.options.remove_inner, vec!["Audit", "Trace"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_option_types_are_config_errors() -> crate::Result<()> {
        let dir = tempdir()?;
        let cases = [
            ("number.json", r#"{"project_name": "a", "ir_path": "b", "output_dir": "c", "options": {"rename-model": 3}}"#, "found a number"),
            ("bool.json", r#"{"project_name": "a", "ir_path": "b", "output_dir": "c", "options": {"remove-inner": true}}"#, "found a boolean"),
            ("nested.json", r#"{"project_name": "a", "ir_path": "b", "output_dir": "c", "options": {"rename-model": {"A": {"B": "C"}}}}"#, "found a map"),
            ("pair.json", r#"{"project_name": "a", "ir_path": "b", "output_dir": "c", "options": {"rename-model": "A-B"}}"#, "From:To"),
        ];
        for (name, content, expected) in cases {
            let file_path = dir.path().join(name);
            fs::write(&file_path, content).await?;
            match Config::from_file(&file_path).await {
                Err(Error::Config(message)) => assert!(message.contains(expected), "{}: {}", name, message),
                other => panic!("{}: expected a config error, got {:?}", name, other),
            }
        }
        Ok(())
    }

    #[test]
    fn test_validate_and_selection() {
        let mut config = Config::new("a", "b", "c");
        config.options.rename_model.insert("A".to_string(), "Same".to_string());
        config.options.rename_model.insert("B".to_string(), "Same".to_string());
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::new("a", "b", "c");
        config.exclude_operations = vec!["Widgets_Delete".to_string()];
        assert!(config.selects("Widgets_Get"));
        assert!(!config.selects("Widgets_Delete"));
        config.include_operations = vec!["Widgets_Get".to_string()];
        assert!(!config.selects("Widgets_List"));
    }

    #[test]
    fn test_reserved_rename_targets_are_rejected() {
        for target in ["Self", "type", "String", "Option"] {
            let mut config = Config::new("a", "b", "c");
            config.options.rename_model.insert("Widget".to_string(), target.to_string());
            match config.validate() {
                Err(Error::Config(message)) => assert!(message.contains("reserved"), "{}", message),
                other => panic!("{}: expected a config error, got {:?}", target, other),
            }
        }

        let mut config = Config::new("a", "b", "c");
        config.options.rename_model.insert("Widget".to_string(), "Gadget".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_extension() {
        assert!(Format::of(Path::new("clientgen.ini")).is_err());
    }
}
