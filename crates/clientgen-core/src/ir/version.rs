//! Service versions.
//!
//! Version tokens are opaque; the service's declaration order (oldest first)
//! is the only ordering, so `2022-12-01-preview < 2024-06-01` holds because
//! the preview was declared first, not because of how the strings compare.

// Internal imports (std, crate)
use std::cmp::Ordering;
use std::fmt;

use super::{NodeRef, Versioning};
use crate::error::{Error, Result};

/// A declared version token and its position in the declaration order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceVersion {
    pub token: String,
    pub ordinal: usize,
}

impl Ord for ServiceVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal.cmp(&other.ordinal)
    }
}

impl PartialOrd for ServiceVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ServiceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

/// `[added, removed)` interval of versions in which a node exists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionWindow {
    pub added: Option<ServiceVersion>,
    pub removed: Option<ServiceVersion>,
}

impl VersionWindow {
    pub fn contains(&self, version: &ServiceVersion) -> bool {
        self.added.as_ref().map_or(true, |added| version >= added)
            && self.removed.as_ref().map_or(true, |removed| version < removed)
    }

    /// Whether the bounds `self` declares lie inside `outer`; an unset
    /// bound inherits the outer one.
    pub fn within(&self, outer: &VersionWindow) -> bool {
        let after_start = |v: &ServiceVersion| outer.added.as_ref().map_or(true, |a| v >= a);
        let before_end = |v: &ServiceVersion| outer.removed.as_ref().map_or(true, |r| v < r);
        let added_ok = self.added.as_ref().map_or(true, |a| after_start(a) && before_end(a));
        let removed_ok = self
            .removed
            .as_ref()
            .map_or(true, |r| outer.added.as_ref().map_or(true, |a| r > a) && outer.removed.as_ref().map_or(true, |end| r <= end));
        added_ok && removed_ok
    }
}

/// Ordered set of versions declared by a service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSet {
    versions: Vec<ServiceVersion>,
}

impl VersionSet {
    pub fn new(tokens: &[String]) -> Result<Self> {
        let mut versions: Vec<ServiceVersion> = Vec::with_capacity(tokens.len());
        for (ordinal, token) in tokens.iter().enumerate() {
            if versions.iter().any(|v| &v.token == token) {
                return Err(Error::malformed(
                    NodeRef::service().child("versions"),
                    format!("version '{}' is declared twice", token),
                ));
            }
            versions.push(ServiceVersion {
                token: token.clone(),
                ordinal,
            });
        }
        Ok(Self { versions })
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceVersion> {
        self.versions.iter()
    }

    pub fn get(&self, token: &str) -> Option<&ServiceVersion> {
        self.versions.iter().find(|v| v.token == token)
    }

    pub fn oldest(&self) -> Option<&ServiceVersion> {
        self.versions.first()
    }

    pub fn latest(&self) -> Option<&ServiceVersion> {
        self.versions.last()
    }

    /// Resolve a token referenced by `node`
    pub fn require(&self, token: &str, node: &NodeRef) -> Result<ServiceVersion> {
        self.get(token).cloned().ok_or_else(|| {
            Error::malformed(
                node.clone(),
                format!("references undeclared service version '{}'", token),
            )
        })
    }

    /// Resolve a node's version window
    pub fn window(&self, versioning: &Versioning, node: &NodeRef) -> Result<VersionWindow> {
        let added = versioning
            .added
            .as_deref()
            .map(|token| self.require(token, node))
            .transpose()?;
        let removed = versioning
            .removed
            .as_deref()
            .map(|token| self.require(token, node))
            .transpose()?;

        if let (Some(added), Some(removed)) = (&added, &removed) {
            if added >= removed {
                return Err(Error::malformed(
                    node.clone(),
                    format!("added in {} but removed in {}", added, removed),
                ));
            }
        }
        Ok(VersionWindow { added, removed })
    }

    /// The window's `added` bound, unless it is the oldest version and thus implied
    pub fn gate<'a>(&self, window: &'a VersionWindow) -> Option<&'a ServiceVersion> {
        window
            .added
            .as_ref()
            .filter(|added| Some(*added) != self.oldest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> Vec<String> {
        ["2022-12-01-preview", "2024-06-01", "2023-01-01"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_declaration_order_defines_ordering() -> crate::Result<()> {
        let set = VersionSet::new(&tokens())?;
        let preview = set.require("2022-12-01-preview", &NodeRef::service())?;
        let mid = set.require("2024-06-01", &NodeRef::service())?;
        let last = set.require("2023-01-01", &NodeRef::service())?;
        assert!(preview < mid && mid < last);
        assert_eq!(set.latest(), Some(&last));
        Ok(())
    }

    #[test]
    fn test_window_checks() -> crate::Result<()> {
        let set = VersionSet::new(&tokens())?;
        let node = NodeRef::operation("Widgets_Analyze");
        let window = set.window(
            &Versioning {
                added: Some("2024-06-01".into()),
                removed: None,
                renamed_from: None,
            },
            &node,
        )?;
        assert!(!window.contains(&set.require("2022-12-01-preview", &node)?));
        assert!(window.contains(&set.require("2023-01-01", &node)?));
        assert!(set.gate(&window).is_some());

        // unset bounds inherit the enclosing window
        assert!(VersionWindow::default().within(&window));
        let earlier = set.window(
            &Versioning {
                added: Some("2022-12-01-preview".into()),
                ..Default::default()
            },
            &node,
        )?;
        assert!(!earlier.within(&window));

        let backwards = Versioning {
            added: Some("2023-01-01".into()),
            removed: Some("2024-06-01".into()),
            renamed_from: None,
        };
        assert!(set.window(&backwards, &node).is_err());

        let unknown = Versioning {
            added: Some("1999-01-01".into()),
            ..Default::default()
        };
        assert!(set.window(&unknown, &node).is_err());
        Ok(())
    }

    #[test]
    fn test_duplicate_tokens_rejected() {
        let dup = vec!["v1".to_string(), "v1".to_string()];
        assert!(VersionSet::new(&dup).is_err());
    }
}
