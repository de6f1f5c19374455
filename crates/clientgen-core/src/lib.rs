//! Clientgen Core Library
//!
//! This library turns a normalized service description (the IR) into the
//! source of a typed Rust client crate. The pipeline runs in fixed stages:
//! model and operation synthesis, version resolution, naming, and finally
//! template rendering.
//!
//! # Examples
//!
//! ```no_run
//! use clientgen_core::{generate, Config};
//!
//! # async fn run() -> clientgen_core::Result<()> {
//! let config = Config::new("widgets-client", "widgets.ir.yaml", "out/widgets-client");
//! generate(&config, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod builders;
pub mod config;
pub mod emit;
pub mod error;
pub mod generate;
pub mod ir;
pub mod manifest;
pub mod model;
pub mod naming;
pub mod operation;
pub mod templates;
pub mod types;
pub mod versioning;

pub use crate::{
    config::Config,
    emit::{Orchestrator, OutputTree, ResolvedSurface},
    error::{Error, Result},
    generate::{check, generate},
    ir::IrDocument,
    templates::{TemplateDir, TemplateKind, TemplateManager, TemplateOptions},
};
