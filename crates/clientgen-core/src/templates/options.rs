//! Options controlling how templates are rendered.
//!
//! # Example
//!
//! ```rust
//! use clientgen_core::templates::TemplateOptions;
//!
//! let options = TemplateOptions {
//!     include_tests: false,
//!     crate_version: "1.2.0".to_string(),
//!     ..Default::default()
//! };
//! assert!(options.license_header.is_none());
//! ```

/// Rendering options that do not change what is generated, only how
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOptions {
    /// Render the generated round-trip tests
    pub include_tests: bool,

    /// Text placed as a line comment at the top of every generated `.rs` file
    pub license_header: Option<String>,

    /// Version of the generated crate
    pub crate_version: String,

    /// Local path of `clientgen-runtime` for the generated manifest; the
    /// registry version is used when unset
    pub runtime_path: Option<String>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            include_tests: true,
            license_header: None,
            crate_version: "0.1.0".to_string(),
            runtime_path: None,
        }
    }
}

impl TemplateOptions {
    /// The license header as `//` comment lines, ready to prepend
    pub fn header_comment(&self) -> Option<String> {
        let header = self.license_header.as_deref()?.trim_end();
        if header.is_empty() {
            return None;
        }
        let mut comment = String::new();
        for line in header.lines() {
            if line.is_empty() {
                comment.push_str("//\n");
            } else {
                comment.push_str("// ");
                comment.push_str(line);
                comment.push('\n');
            }
        }
        comment.push('\n');
        Some(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_comment() {
        let options = TemplateOptions {
            license_header: Some("Copyright Widgets Inc.\n\nMIT\n".to_string()),
            ..Default::default()
        };
        assert_eq!(
            options.header_comment().as_deref(),
            Some("// Copyright Widgets Inc.\n//\n// MIT\n\n")
        );
        assert!(TemplateOptions::default().header_comment().is_none());
    }
}
