//! Emission: the staged pipeline from IR to a rendered output tree.
//!
//! [`Orchestrator`] drives the stages, [`names`] runs the one naming pass,
//! and [`OutputTree`] holds the rendered files until they are committed.

pub mod names;
pub mod orchestrator;
pub mod output;

pub use names::{resolve_names, ResolvedNames};
pub use orchestrator::{Orchestrator, ResolvedSurface, Stage};
pub use output::{EmittedFile, OutputTree, OUTPUT_MARKER};
