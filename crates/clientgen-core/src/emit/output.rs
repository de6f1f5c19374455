//! In-memory output tree and its atomic commit.
//!
//! Nothing reaches the destination until every file has been rendered. The
//! commit writes the whole tree into a staging directory next to the
//! destination and swaps it in with renames, so a failed run leaves the
//! previous output untouched.
//!
//! Every committed tree carries an [`OUTPUT_MARKER`] file. An existing,
//! non-empty destination is only replaced when it carries the marker too.

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

// External imports (alphabetized)
use tokio::fs;

/// File written at the root of every committed tree
pub const OUTPUT_MARKER: &str = ".clientgen";

const MARKER_CONTENTS: &str = "Generated by clientgen. This directory is replaced on every run.\n";

/// One rendered file
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedFile {
    /// Directory relative to the output root, `/` separated; empty for the root
    pub namespace: String,
    pub file_name: String,
    /// Names of the declarations rendered into the file, in order
    pub declarations: Vec<String>,
    pub contents: String,
}

impl EmittedFile {
    /// Path relative to the output root
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in self.namespace.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path.push(&self.file_name);
        path
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTree {
    files: Vec<EmittedFile>,
}

impl OutputTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; two files may not share a path
    pub fn push(&mut self, file: EmittedFile) -> Result<()> {
        let path = file.relative_path();
        if self.files.iter().any(|f| f.relative_path() == path) {
            return Err(Error::template(format!(
                "two templates render to '{}'",
                path.display()
            )));
        }
        self.files.push(file);
        Ok(())
    }

    pub fn files(&self) -> &[EmittedFile] {
        &self.files
    }

    pub fn get(&self, relative_path: impl AsRef<Path>) -> Option<&EmittedFile> {
        let wanted = relative_path.as_ref();
        self.files.iter().find(|f| f.relative_path() == wanted)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write the tree to `dest`, replacing earlier generated output.
    ///
    /// The tree is staged in a sibling temporary directory first; `dest`
    /// only changes once every file has been written. A destination that
    /// holds anything but an earlier run's output is refused.
    pub async fn commit(&self, dest: &Path) -> Result<()> {
        ensure_replaceable(dest).await?;
        let parent = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).await?;

        let staging = tempfile::Builder::new()
            .prefix(".clientgen-")
            .tempdir_in(&parent)?;
        for file in &self.files {
            let path = staging.path().join(file.relative_path());
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).await?;
            }
            fs::write(&path, &file.contents).await?;
            log::debug!("Staged {}", path.display());
        }
        fs::write(staging.path().join(OUTPUT_MARKER), MARKER_CONTENTS).await?;

        let backup = if fs::try_exists(dest).await? {
            let backup = tempfile::Builder::new()
                .prefix(".clientgen-previous-")
                .tempdir_in(&parent)?
                .keep();
            // rename needs the target to be absent
            fs::remove_dir(&backup).await?;
            fs::rename(dest, &backup).await?;
            Some(backup)
        } else {
            None
        };

        let staged = staging.keep();
        if let Err(e) = fs::rename(&staged, dest).await {
            if let Some(backup) = &backup {
                fs::rename(backup, dest).await?;
            }
            let _ = fs::remove_dir_all(&staged).await;
            return Err(e.into());
        }

        if let Some(backup) = backup {
            fs::remove_dir_all(&backup).await?;
        }
        log::info!("Wrote {} files to {}", self.files.len(), dest.display());
        Ok(())
    }
}

/// Fails unless `dest` is absent, empty, or an earlier run's output
async fn ensure_replaceable(dest: &Path) -> Result<()> {
    if !fs::try_exists(dest).await? {
        return Ok(());
    }
    if !fs::metadata(dest).await?.is_dir() {
        return Err(Error::config(format!(
            "output path {} exists and is not a directory",
            dest.display()
        )));
    }
    if fs::try_exists(dest.join(OUTPUT_MARKER)).await? {
        return Ok(());
    }
    let mut entries = fs::read_dir(dest).await?;
    if entries.next_entry().await?.is_some() {
        log::warn!("{} has no {} marker; leaving it alone", dest.display(), OUTPUT_MARKER);
        return Err(Error::config(format!(
            "output directory {} holds files clientgen did not write; pick an empty or new directory",
            dest.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file(namespace: &str, name: &str, contents: &str) -> EmittedFile {
        EmittedFile {
            namespace: namespace.to_string(),
            file_name: name.to_string(),
            declarations: Vec::new(),
            contents: contents.to_string(),
        }
    }

    #[test]
    fn test_duplicate_paths_are_rejected() -> crate::Result<()> {
        let mut tree = OutputTree::new();
        tree.push(file("src/models", "widget.rs", "a"))?;
        assert!(tree.push(file("src/models", "widget.rs", "b")).is_err());
        assert_eq!(
            tree.get("src/models/widget.rs").map(|f| f.contents.as_str()),
            Some("a")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_replaces_previous_output() -> crate::Result<()> {
        let dir = tempdir()?;
        let dest = dir.path().join("out");
        fs::create_dir_all(dest.join("stale")).await?;
        fs::write(dest.join("stale/old.rs"), "old").await?;
        fs::write(dest.join(OUTPUT_MARKER), MARKER_CONTENTS).await?;

        let mut tree = OutputTree::new();
        tree.push(file("", "Cargo.toml", "[package]"))?;
        tree.push(file("src", "lib.rs", "pub mod models;"))?;
        tree.commit(&dest).await?;

        assert_eq!(fs::read_to_string(dest.join("src/lib.rs")).await?, "pub mod models;");
        assert!(!dest.join("stale").exists());
        assert!(dest.join(OUTPUT_MARKER).exists());

        // no staging or backup directories are left next to the output
        let mut entries = fs::read_dir(dir.path()).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["out".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_leaves_foreign_directories_alone() -> crate::Result<()> {
        let dir = tempdir()?;
        let dest = dir.path().join("project");
        fs::create_dir_all(dest.join(".git")).await?;
        fs::write(dest.join("README.md"), "hand written").await?;

        let mut tree = OutputTree::new();
        tree.push(file("src", "lib.rs", "pub mod models;"))?;
        let result = tree.commit(&dest).await;
        assert!(matches!(result, Err(Error::Config(_))), "{:?}", result);
        assert_eq!(fs::read_to_string(dest.join("README.md")).await?, "hand written");
        assert!(dest.join(".git").exists());
        assert!(!dest.join("src").exists());

        // an empty directory is fair game
        let empty = dir.path().join("empty");
        fs::create_dir_all(&empty).await?;
        tree.commit(&empty).await?;
        assert!(empty.join("src/lib.rs").exists());
        Ok(())
    }
}
