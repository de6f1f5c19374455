//! Error handling for the clientgen code generation library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. Every error that concerns the
//! service description names the offending node through a [`NodeRef`], so a
//! failed run always points at the construct that caused it.
//!
//! # Examples
//!
//! ```
//! use clientgen_core::error::{Error, Result};
//! use clientgen_core::ir::NodeRef;
//!
//! fn check(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(Error::malformed(NodeRef::schema("Widget"), "empty name"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check("").is_err());
//! ```

// Internal imports (std, crate)
use std::fmt;

use crate::ir::NodeRef;

// External imports (alphabetized)
use thiserror::Error;

/// Result type for clientgen generation operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single finding against the service description
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub node: NodeRef,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.node, self.message)
    }
}

/// Findings collected by one validation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, node: NodeRef, message: impl Into<String>) {
        self.0.push(Diagnostic {
            node,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// `Ok(())` when nothing was found, otherwise a [`Error::MalformedIr`]
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::MalformedIr(self))
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, diagnostic) in self.0.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}", diagnostic)?;
        }
        Ok(())
    }
}

/// Main error type for clientgen generation operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Template engine error
    #[error("Template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// The service description is inconsistent
    #[error("malformed service description:\n{0}")]
    MalformedIr(Diagnostics),

    /// Two declarations could not be given distinct names
    #[error("naming collision in {namespace} at {node}: {message}")]
    NamingCollision {
        namespace: String,
        node: NodeRef,
        message: String,
    },

    /// Versioning metadata cannot be satisfied
    #[error("versioning error at {node}: {message}")]
    Versioning { node: NodeRef, message: String },

    /// A value does not match its declaration
    #[error("wire codec error at {node}: {message}")]
    Codec { node: NodeRef, message: String },

    /// Fetching a remote service description failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Template error
    #[error("Template error: {0}")]
    Template(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Create a malformed-description error with a single finding
    pub fn malformed<S: Into<String>>(node: NodeRef, msg: S) -> Self {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(node, msg);
        Self::MalformedIr(diagnostics)
    }

    /// Create a new versioning error
    pub fn versioning<S: Into<String>>(node: NodeRef, msg: S) -> Self {
        Self::Versioning {
            node,
            message: msg.into(),
        }
    }

    /// Create a new codec error
    pub fn codec<S: Into<String>>(node: &NodeRef, msg: S) -> Self {
        Self::Codec {
            node: node.clone(),
            message: msg.into(),
        }
    }

    /// The node an error points at, when it concerns the description
    pub fn node(&self) -> Option<&NodeRef> {
        match self {
            Self::MalformedIr(diagnostics) => diagnostics.0.first().map(|d| &d.node),
            Self::NamingCollision { node, .. }
            | Self::Versioning { node, .. }
            | Self::Codec { node, .. } => Some(node),
            _ => None,
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Config(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Config(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::SourceLocation;

    #[test]
    fn test_malformed_reports_location() {
        let node = NodeRef::schema("Widget").child("properties").child("color").at(Some(&SourceLocation {
            file: "widgets.tsp".to_string(),
            line: Some(12),
            column: Some(3),
        }));
        let err = Error::malformed(node, "references unknown schema 'Colour'");
        let text = err.to_string();
        assert!(text.contains("schemas.Widget.properties.color"));
        assert!(text.contains("widgets.tsp:12:3"));
        assert!(err.node().is_some());
    }

    #[test]
    fn test_empty_diagnostics_are_ok() {
        assert!(Diagnostics::default().into_result().is_ok());
    }
}
