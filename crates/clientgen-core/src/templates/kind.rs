//! Template kinds known to clientgen.
//!
//! # Examples
//!
//! ```
//! use clientgen_core::templates::TemplateKind;
//! use std::str::FromStr;
//!
//! let template = TemplateKind::from_str("rust_client").unwrap();
//! assert_eq!(template, TemplateKind::RustClient);
//! assert_eq!(template.as_str(), "rust_client");
//! assert_eq!(template.to_string(), "rust_client");
//! assert_eq!(TemplateKind::default(), TemplateKind::RustClient);
//! ```
//!
//! Built-in kinds ship inside the binary; a template directory on disk
//! (see [`TemplateDir`](super::TemplateDir)) overrides them.

// Internal imports (std, crate)
use std::fmt;
use std::str::FromStr;

/// Supported template kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TemplateKind {
    /// Synchronous Rust client over `clientgen-runtime`
    #[default]
    RustClient,
    /// Templates loaded from a user-supplied directory
    Custom,
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rust_client" | "rust" => Ok(TemplateKind::RustClient),
            "custom" => Ok(TemplateKind::Custom),
            _ => Err(format!("Unknown template kind: {}", s)),
        }
    }
}

impl TemplateKind {
    /// Returns the template identifier as a string slice
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RustClient => "rust_client",
            Self::Custom => "custom",
        }
    }

    /// Whether the templates for this kind are embedded in the binary
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::RustClient)
    }

    /// Returns an iterator over all available template kinds
    pub fn all() -> impl Iterator<Item = Self> {
        use TemplateKind::*;
        [RustClient, Custom].iter().copied()
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
