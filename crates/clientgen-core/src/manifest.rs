//! Manifest file format for clientgen templates.
//!
//! A template directory holds a `manifest.yaml` (or `manifest.toml`) listing
//! the files to render. A file with `for_each` is rendered once per
//! declaration of that kind, and `{file}` in its destination is replaced by
//! the declaration's module stem.

// Internal imports (std, crate)
use std::path::Path;

use crate::error::{Error, Result};

// External imports (alphabetized)
use serde::{Deserialize, Deserializer, Serialize};
use serde_value::Value as SerdeValue;
use tokio::fs;

/// Placeholder replaced by the module stem in per-declaration destinations
pub const FILE_PLACEHOLDER: &str = "{file}";

/// The root manifest structure for a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateManifest {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Target language; picks the context builder
    #[serde(default = "default_language")]
    pub language: String,

    /// Files to render, in order
    #[serde(default)]
    pub files: Vec<TemplateFile>,

    #[serde(default)]
    pub hooks: TemplateHooks,
}

/// Describes a single file to be rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFile {
    /// Template name, relative to the template directory
    pub source: String,

    /// Output path relative to the output root
    pub destination: String,

    /// One of `model`, `enum`, `union`, `polymorphic` or `options`
    #[serde(default)]
    pub for_each: Option<String>,

    /// Only rendered when tests are requested
    #[serde(default)]
    pub tests: bool,

    /// Extra context merged over the generated one
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Commands run after the output has been committed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateHooks {
    /// Run in the output directory, in order
    #[serde(default, deserialize_with = "deserialize_commands")]
    pub post_generate: Vec<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_language() -> String {
    "rust".to_string()
}

impl Default for TemplateManifest {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            description: String::new(),
            version: default_version(),
            language: default_language(),
            files: Vec::new(),
            hooks: TemplateHooks::default(),
        }
    }
}

impl TemplateManifest {
    /// Load `manifest.yaml`, falling back to `manifest.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither file exists or the one found does not parse.
    pub async fn load_from_dir(template_dir: &Path) -> Result<Self> {
        let yaml_path = template_dir.join("manifest.yaml");
        let toml_path = template_dir.join("manifest.toml");

        if fs::try_exists(&yaml_path).await? {
            log::debug!("Reading template manifest {}", yaml_path.display());
            let content = fs::read_to_string(&yaml_path).await?;
            return Self::from_yaml(&content).map_err(|e| {
                Error::template(format!("Invalid template manifest {}: {}", yaml_path.display(), e))
            });
        }
        if fs::try_exists(&toml_path).await? {
            log::debug!("Reading template manifest {}", toml_path.display());
            let content = fs::read_to_string(&toml_path).await?;
            return toml::from_str(&content).map_err(|e| {
                Error::template(format!("Invalid template manifest {}: {}", toml_path.display(), e))
            });
        }
        Err(Error::template(format!(
            "No manifest.yaml or manifest.toml in {}",
            template_dir.display()
        )))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Helper function to deserialize either a single command or a list of commands
fn deserialize_commands<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;

    match value {
        SerdeValue::String(s) => Ok(vec![s]),
        SerdeValue::Seq(seq) => {
            let mut result = Vec::new();
            for item in seq {
                if let SerdeValue::String(s) = item {
                    result.push(s);
                } else {
                    return Err(serde::de::Error::custom(
                        "Expected string or array of strings",
                    ));
                }
            }
            Ok(result)
        }
        _ => Err(serde::de::Error::custom(
            "Expected string or array of strings",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_yaml_manifest() -> crate::Result<()> {
        let manifest = TemplateManifest::from_yaml(
            r#"
name: rust_client
files:
  - source: model.rs.tera
    destination: "src/models/{file}.rs"
    for_each: model
  - source: roundtrip.rs.tera
    destination: tests/roundtrip.rs
    tests: true
hooks:
  post_generate: cargo fmt
"#,
        )?;
        assert_eq!(manifest.language, "rust");
        assert_eq!(manifest.files[0].for_each.as_deref(), Some("model"));
        assert!(manifest.files[1].tests);
        assert_eq!(manifest.hooks.post_generate, vec!["cargo fmt".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_toml_fallback_and_missing() -> crate::Result<()> {
        let dir = tempdir()?;
        assert!(TemplateManifest::load_from_dir(dir.path()).await.is_err());

        fs::write(
            dir.path().join("manifest.toml"),
            "name = \"mini\"\n\n[[files]]\nsource = \"lib.rs.tera\"\ndestination = \"src/lib.rs\"\n",
        )
        .await?;
        let manifest = TemplateManifest::load_from_dir(dir.path()).await?;
        assert_eq!(manifest.name, "mini");
        assert_eq!(manifest.files.len(), 1);
        assert!(manifest.hooks.post_generate.is_empty());
        Ok(())
    }

    #[test]
    fn test_hook_commands_must_be_strings() {
        let result = TemplateManifest::from_yaml("name: x\nhooks:\n  post_generate: [1, 2]\n");
        assert!(result.is_err());
    }
}
