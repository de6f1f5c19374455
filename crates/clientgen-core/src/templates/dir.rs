//! Template directory resolution

use std::io;
use std::path::{Path, PathBuf};

use super::TemplateKind;

/// Environment variable naming a directory of template kinds
pub const TEMPLATE_DIR_ENV: &str = "CLIENTGEN_TEMPLATE_DIR";

/// A template directory with resolved paths
#[derive(Debug, Clone)]
pub struct TemplateDir {
    /// Root directory containing one subdirectory per template kind
    root_dir: PathBuf,
    /// Path to the specific template directory (root_dir/kind)
    template_path: PathBuf,
    kind: TemplateKind,
}

impl TemplateDir {
    pub fn new(root_dir: PathBuf, template_path: PathBuf, kind: TemplateKind) -> Self {
        Self {
            root_dir,
            template_path,
            kind,
        }
    }

    /// Returns a displayable version of the template path
    pub fn display(&self) -> std::path::Display<'_> {
        self.template_path.display()
    }

    /// Resolve the directory for `kind`.
    ///
    /// `custom_dir` may point either at the kind's own directory (it holds a
    /// manifest) or at a root containing a subdirectory named after the kind.
    /// Without it the standard locations are searched.
    pub fn discover(kind: TemplateKind, custom_dir: Option<&Path>) -> io::Result<Self> {
        if let Some(dir) = custom_dir {
            if !dir.exists() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Template directory not found: {}", dir.display()),
                ));
            }
            if has_manifest(dir) {
                let root = dir.parent().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                return Ok(Self::new(root, dir.to_path_buf(), kind));
            }
            return Self::in_root(dir.to_path_buf(), kind);
        }

        let root_dir = Self::find_template_base_dir(kind).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "Could not find a '{}' template directory in any standard location",
                    kind
                ),
            )
        })?;
        Self::in_root(root_dir, kind)
    }

    fn in_root(root_dir: PathBuf, kind: TemplateKind) -> io::Result<Self> {
        let template_path = root_dir.join(kind.as_str());
        if !template_path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Template directory not found: {}", template_path.display()),
            ));
        }
        Ok(Self::new(root_dir, template_path, kind))
    }

    /// First standard location holding a directory for `kind`
    fn find_template_base_dir(kind: TemplateKind) -> Option<PathBuf> {
        let mut candidates = Vec::new();

        // 1. Environment variable
        if let Ok(dir) = std::env::var(TEMPLATE_DIR_ENV) {
            candidates.push(PathBuf::from(dir));
        }

        // 2. ./templates in the working directory
        candidates.push(PathBuf::from(".").join("templates"));

        // 3. ~/.clientgen/templates
        if let Some(home_dir) = dirs::home_dir() {
            candidates.push(home_dir.join(".clientgen").join("templates"));
        }

        candidates
            .into_iter()
            .find(|root| root.join(kind.as_str()).is_dir())
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    pub fn exists(&self) -> bool {
        self.template_path.exists()
    }
}

fn has_manifest(dir: &Path) -> bool {
    dir.join("manifest.yaml").exists() || dir.join("manifest.toml").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_template_dir_validation() -> crate::Result<()> {
        let temp_dir = tempdir()?;
        let template_dir = temp_dir.path().join("templates/custom");
        fs::create_dir_all(&template_dir)?;

        // a root holding one directory per kind
        let found = TemplateDir::discover(
            TemplateKind::Custom,
            Some(temp_dir.path().join("templates").as_path()),
        )?;
        assert_eq!(found.template_path(), template_dir.as_path());

        // the kind directory itself, recognised by its manifest
        fs::write(template_dir.join("manifest.yaml"), "name: x\n")?;
        let direct = TemplateDir::discover(TemplateKind::Custom, Some(template_dir.as_path()))?;
        assert_eq!(direct.template_path(), template_dir.as_path());

        let result = TemplateDir::discover(TemplateKind::Custom, Some(Path::new("/nonexistent")));
        assert!(result.is_err());
        Ok(())
    }
}
