//! clientgen CLI entrypoint
//! Parses command-line arguments and dispatches to the core pipeline.

// Internal imports (std, crate)
use std::fmt::Write as _;
use std::path::PathBuf;

// External imports (alphabetized)
use anyhow::Context;
use clap::{Args, Parser};
use clientgen_core::config::{parse_names, parse_renames};
use clientgen_core::{Config, ResolvedSurface, TemplateOptions};
use serde::Serialize;
use tokio::fs;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clientgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log more (-v for debug, -vv for trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Generate a client crate from an IR document
    Generate {
        #[command(flatten)]
        input: InputArgs,
        /// Template to use for code generation (e.g., rust_client, custom)
        #[arg(long)]
        template_kind: Option<String>,
        /// Custom template directory
        #[arg(long)]
        template_dir: Option<PathBuf>,
        /// Output directory for generated code (default: the project name)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Version of the generated crate
        #[arg(long, default_value = "0.1.0")]
        crate_version: String,
        /// Depend on a local clientgen-runtime checkout instead of the registry
        #[arg(long)]
        runtime_path: Option<String>,
        /// File whose text heads every generated source file as a comment
        #[arg(long)]
        license_header: Option<PathBuf>,
        /// Do not generate the round-trip tests
        #[arg(long)]
        no_tests: bool,
    },
    /// Run every stage short of emission and summarize the declarations
    Check {
        #[command(flatten)]
        input: InputArgs,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where the IR comes from and what to take from it
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Path or URL of the IR document (YAML or JSON)
    ///
    /// Example: --ir widgets.ir.yaml
    /// Example: --ir https://example.com/widgets.ir.json
    #[arg(long)]
    ir: Option<String>,
    /// Configuration file (YAML, JSON or TOML); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Project name; also the generated package name
    #[arg(long)]
    project_name: Option<String>,
    /// Service version to generate for (default: the latest declared)
    #[arg(long)]
    api_version: Option<String>,
    /// Operation ids to generate, comma-separated
    #[arg(long, value_delimiter = ',')]
    include: Vec<String>,
    /// Operation ids to leave out, comma-separated
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,
    /// Model renames as `From:To,From2:To2`
    #[arg(long)]
    rename_model: Option<String>,
    /// Types to leave out, comma-separated
    #[arg(long)]
    remove_inner: Option<String>,
}

impl InputArgs {
    /// The configuration file, if any, with flags applied on top
    async fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .await
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => {
                let ir = self.ir.clone().context("either --ir or --config is required")?;
                let project_name = self
                    .project_name
                    .clone()
                    .unwrap_or_else(|| default_project_name(&ir));
                Config::new(project_name.clone(), ir, project_name)
            }
        };

        if let Some(ir) = &self.ir {
            config.ir_path = ir.clone();
        }
        if let Some(project_name) = &self.project_name {
            config.project_name = project_name.clone();
        }
        if self.api_version.is_some() {
            config.api_version = self.api_version.clone();
        }
        if !self.include.is_empty() {
            config.include_operations = self.include.clone();
        }
        if !self.exclude.is_empty() {
            config.exclude_operations = self.exclude.clone();
        }
        if let Some(raw) = &self.rename_model {
            config.options.rename_model.extend(parse_renames(raw)?);
        }
        if let Some(raw) = &self.remove_inner {
            config.options.remove_inner.extend(parse_names(raw));
        }
        config.validate()?;
        Ok(config)
    }
}

/// `widgets.ir.yaml` becomes `widgets-client`
fn default_project_name(ir: &str) -> String {
    let file = ir.rsplit(['/', '\\']).next().unwrap_or(ir);
    match file.split('.').next() {
        Some(stem) if !stem.is_empty() => format!("{}-client", stem),
        _ => "client".to_string(),
    }
}

/// What `check` reports
#[derive(Debug, Serialize)]
struct Summary {
    service: String,
    target_version: Option<String>,
    versions: Vec<String>,
    models: Vec<ModelSummary>,
    operations: Vec<OperationSummary>,
    renamed: usize,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ModelSummary {
    name: String,
    kind: &'static str,
    file: Option<String>,
}

#[derive(Debug, Serialize)]
struct OperationSummary {
    id: String,
    method: String,
    http_method: String,
    path: String,
    shape: &'static str,
}

impl From<&ResolvedSurface> for Summary {
    fn from(resolved: &ResolvedSurface) -> Self {
        let surface = &resolved.surface;
        Self {
            service: resolved.service.name.clone(),
            target_version: surface.target.as_ref().map(|v| v.token.clone()),
            versions: surface.versions.iter().map(|v| v.token.clone()).collect(),
            models: surface
                .models
                .values()
                .map(|decl| ModelSummary {
                    name: decl.name.clone(),
                    kind: decl.kind_name(),
                    file: resolved.names.file(&decl.name).map(str::to_string),
                })
                .collect(),
            operations: surface
                .operations
                .operations
                .iter()
                .map(|op| OperationSummary {
                    id: op.operation_id.clone(),
                    method: op.name.clone(),
                    http_method: op.method.to_string(),
                    path: op.path_template.clone(),
                    shape: op.shape.kind_name(),
                })
                .collect(),
            renamed: surface.shims.len(),
            warnings: surface
                .operations
                .operations
                .iter()
                .flat_map(|op| op.warnings.iter().map(ToString::to_string))
                .collect(),
        }
    }
}

impl Summary {
    fn render(&self) -> String {
        let mut out = String::new();
        let _ = match &self.target_version {
            Some(version) => writeln!(out, "{} (version {})", self.service, version),
            None => writeln!(out, "{}", self.service),
        };
        let _ = writeln!(out, "models: {}", self.models.len());
        for model in &self.models {
            let _ = writeln!(
                out,
                "  {} ({}) -> {}",
                model.name,
                model.kind,
                model.file.as_deref().unwrap_or("-")
            );
        }
        let _ = writeln!(out, "operations: {}", self.operations.len());
        for op in &self.operations {
            let _ = writeln!(out, "  {} {} {} [{}]", op.method, op.http_method, op.path, op.shape);
        }
        if self.renamed > 0 {
            let _ = writeln!(out, "deprecated aliases: {}", self.renamed);
        }
        for warning in &self.warnings {
            let _ = writeln!(out, "warning: {}", warning);
        }
        out
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Generate {
            input,
            template_kind,
            template_dir,
            output_dir,
            crate_version,
            runtime_path,
            license_header,
            no_tests,
        } => {
            let mut config = input.config().await?;
            if let Some(kind) = template_kind {
                config.template_kind = kind.clone();
            }
            if let Some(dir) = template_dir {
                config.template_dir = Some(dir.to_string_lossy().to_string());
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir.to_string_lossy().to_string();
            }

            let license_header = match license_header {
                Some(path) => Some(
                    fs::read_to_string(path)
                        .await
                        .with_context(|| format!("Failed to read license header {}", path.display()))?,
                ),
                None => None,
            };
            let template_opts = TemplateOptions {
                include_tests: !no_tests,
                license_header,
                crate_version: crate_version.clone(),
                runtime_path: runtime_path.clone(),
            };

            tracing::info!(
                ir = %config.ir_path,
                template = %config.template_kind,
                output = %config.output_dir,
                "Generating client"
            );
            clientgen_core::generate(&config, Some(template_opts))
                .await
                .context("Generation failed")?;
            println!("Generated {} in {}", config.project_name, config.output_dir);
        }
        Commands::Check { input, json } => {
            let config = input.config().await?;
            let resolved = clientgen_core::check(&config).await.context("Check failed")?;
            let summary = Summary::from(&resolved);
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary.render());
            }
        }
    }
    Ok(())
}
