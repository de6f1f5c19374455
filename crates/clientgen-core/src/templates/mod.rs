//! Template discovery, loading and rendering.

pub mod dir;
pub mod kind;
pub mod manager;
pub mod options;

pub use dir::TemplateDir;
pub use kind::TemplateKind;
pub use manager::{TemplateManager, TemplateSource};
pub use options::TemplateOptions;
