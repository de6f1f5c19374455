//! Context builders for language-specific templates.
//!
//! A builder turns the resolved declarations into plain JSON contexts: one
//! crate-wide context and one per declaration for `for_each` templates.
//! Everything language-specific (type spellings, expressions) is worked out
//! here so that templates stay declarative.
pub mod rust;

use crate::config::Config;
use crate::emit::ResolvedSurface;
use crate::error::{Error, Result};
use crate::templates::TemplateOptions;
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

pub use rust::RustContextBuilder;

/// `for_each` values a manifest may use
pub const FOR_EACH_KINDS: &[&str] = &["model", "enum", "union", "polymorphic", "options"];

/// Context of one declaration rendered into its own file
#[derive(Debug, Clone, PartialEq)]
pub struct ItemContext {
    /// Declared type name
    pub name: String,
    /// Module stem substituted for `{file}`
    pub file: String,
    pub context: Map<String, JsonValue>,
}

/// Everything a template set is rendered against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    pub base: Map<String, JsonValue>,
    items: IndexMap<&'static str, Vec<ItemContext>>,
}

impl RenderContext {
    pub fn new(base: Map<String, JsonValue>) -> Self {
        let items = FOR_EACH_KINDS.iter().map(|kind| (*kind, Vec::new())).collect();
        Self { base, items }
    }

    /// Add a declaration under one of [`FOR_EACH_KINDS`]
    pub fn push(&mut self, kind: &str, item: ItemContext) -> Result<()> {
        let items = self
            .items
            .get_mut(kind)
            .ok_or_else(|| Error::template(format!("Unknown for_each directive: {}", kind)))?;
        items.push(item);
        Ok(())
    }

    /// Declarations of `kind`; `None` for an unknown kind
    pub fn items(&self, kind: &str) -> Option<&[ItemContext]> {
        self.items.get(kind).map(Vec::as_slice)
    }
}

/// Turns resolved declarations into template contexts
pub trait ContextBuilder {
    fn build(&self, resolved: &ResolvedSurface, config: &Config, options: &TemplateOptions) -> Result<RenderContext>;
}

/// The builder for a manifest's `language`
pub fn builder_for(language: &str) -> Result<Box<dyn ContextBuilder>> {
    match language.to_lowercase().as_str() {
        "rust" => Ok(Box::new(RustContextBuilder)),
        other => Err(Error::template(format!(
            "no context builder for template language '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_context_kinds() -> crate::Result<()> {
        let mut context = RenderContext::new(Map::new());
        let item = ItemContext {
            name: "Widget".to_string(),
            file: "widget".to_string(),
            context: Map::new(),
        };
        context.push("model", item.clone())?;
        assert!(context.push("endpoint", item).is_err());
        assert_eq!(context.items("model").map(<[ItemContext]>::len), Some(1));
        assert_eq!(context.items("options").map(<[ItemContext]>::len), Some(0));
        assert!(context.items("endpoint").is_none());
        assert!(builder_for("Rust").is_ok());
        assert!(builder_for("python").is_err());
        Ok(())
    }
}
