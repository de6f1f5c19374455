//! Entry points tying the pipeline to the filesystem.

use std::{path::Path, path::PathBuf, str::FromStr};

use crate::{
    config::Config,
    emit::{Orchestrator, ResolvedSurface},
    error::{Error, Result},
    ir::IrDocument,
    templates::{TemplateKind, TemplateManager, TemplateOptions},
};

/// Main entry point for code generation
pub async fn generate(config: &Config, template_opts: Option<TemplateOptions>) -> Result<()> {
    config.validate()?;
    let template_opts = template_opts.unwrap_or_default();

    // 1. Load the IR document
    let doc = IrDocument::from_file_or_url(&config.ir_path).await?;

    // 2. Initialize template manager with template_dir from config if available
    let template_kind = TemplateKind::from_str(&config.template_kind).map_err(Error::config)?;
    let template_dir = config.template_dir.as_ref().map(PathBuf::from);
    let template_manager = TemplateManager::new(template_kind, template_dir).await?;

    // 3. Run the pipeline; nothing is written unless every stage succeeds
    let tree = Orchestrator::new(&doc, config).generate(&template_manager, &template_opts)?;

    // 4. Write the output and run the template's hooks
    let output_dir = Path::new(&config.output_dir);
    tree.commit(output_dir).await?;
    template_manager.run_post_generate_hooks(output_dir).await?;

    log::info!("Generated {} files in {}", tree.len(), output_dir.display());
    Ok(())
}

/// Run every stage up to emission and report the named declarations
pub async fn check(config: &Config) -> Result<ResolvedSurface> {
    config.validate()?;
    let doc = IrDocument::from_file_or_url(&config.ir_path).await?;
    Orchestrator::new(&doc, config).check()
}
