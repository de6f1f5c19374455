//! Identifier naming: pure case conversion plus the per-run registry that
//! keeps generated names unique.

pub mod case;
pub mod namer;
pub mod registry;

pub use case::{split_words, to_lower_camel_case, to_snake_case, to_upper_camel_case};
pub use namer::{pluralize, singularize, to_identifier, CaseConvention, NameContext};
pub use registry::{NameRegistry, Namespace};
