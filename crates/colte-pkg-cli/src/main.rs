//! colte-pkg - build and release orchestration for the CoLTE package archive
//!
//! ## Commands
//!
//! - `build`: check out colte and haulage and build their packages for
//!   every distribution into `<workspace>/build-volume`
//! - `release`: add everything in the build volume to the reprepro
//!   archive and export it

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colte_pkg_build::{BuildPipeline, BuildPlan, BuildSummary, RefSelection};
use colte_pkg_core::{init_tracing, PipelineConfig, ProcessRunner};
use colte_pkg_release::{PublishReport, ReleasePipeline, Reprepro};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "colte-pkg")]
#[command(author = "UW ICTD")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and release CoLTE packages", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Pipeline configuration file (TOML); built-in defaults when omitted
    #[arg(long, global = true, env = "COLTE_PKG_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured workspace directory
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check out the source trees and build packages for every distribution
    Build {
        /// Build the unstable branch of every target
        #[arg(long, conflicts_with = "tags")]
        main: bool,

        /// Ref to build for one target, e.g. `--tag colte=v0.9.2`.
        /// Required once per configured target unless --main is given.
        #[arg(long = "tag", value_name = "TARGET=REF", value_parser = parse_tag)]
        tags: Vec<(String, String)>,

        /// Remove the workspace before building
        #[arg(long)]
        clean: bool,
    },

    /// Publish built packages to the archive and export it
    Release,
}

/// Parse a `target=ref` pair.
fn parse_tag(raw: &str) -> std::result::Result<(String, String), String> {
    let (target, label) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TARGET=REF, got '{raw}'"))?;
    if target.is_empty() || label.is_empty() {
        return Err(format!("expected TARGET=REF, got '{raw}'"));
    }
    Ok((target.to_string(), label.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref(), cli.workspace)?;

    match cli.command {
        Commands::Build { main, tags, clean } => {
            // Everything is validated before the pipeline touches disk.
            let plan = plan_build(&config, main, tags, clean)?;
            cmd_build(config, &plan).await
        }
        Commands::Release => cmd_release(config).await,
    }
}

fn load_config(path: Option<&Path>, workspace: Option<PathBuf>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(workspace) = workspace {
        config.workspace = workspace;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn plan_build(
    config: &PipelineConfig,
    main: bool,
    tags: Vec<(String, String)>,
    clean: bool,
) -> Result<BuildPlan> {
    let selection = if main {
        RefSelection::Unstable
    } else {
        RefSelection::pinned(tags).context("Invalid --tag arguments")?
    };
    let plan = BuildPlan::new(config, &selection, clean).context("Invalid build request")?;
    Ok(plan)
}

async fn cmd_build(config: PipelineConfig, plan: &BuildPlan) -> Result<()> {
    info!(workspace = %config.workspace.display(), clean = plan.clean, "Starting build");

    let pipeline = BuildPipeline::new(Arc::new(ProcessRunner), config);
    let summary = pipeline.run(plan).await.context("Build failed")?;

    print_build_summary(&summary);
    Ok(())
}

fn print_build_summary(summary: &BuildSummary) {
    println!("Build complete in {}ms", summary.duration_ms);
    println!();
    for checkout in &summary.checkouts {
        let short = checkout.revision.get(..8).unwrap_or(&checkout.revision);
        println!("  {:<10} {:<16} {}", checkout.target, checkout.label, short);
    }
    if !summary.collected.is_empty() {
        println!();
        println!("Collected artifacts:");
        for (dist, count) in &summary.collected {
            println!("  {dist:<10} {count}");
        }
    }
}

async fn cmd_release(config: PipelineConfig) -> Result<()> {
    info!(archive = %config.archive_dir.display(), "Starting release");

    let archive = Reprepro::new(
        Arc::new(ProcessRunner),
        &config.archive_dir,
        &config.artifact_extension,
    )
    .with_context(|| format!("Failed to open archive at {}", config.archive_dir.display()))?;

    let report = ReleasePipeline::new(Arc::new(archive), config)
        .run()
        .await
        .context("Release failed")?;

    print_release_report(&report);
    Ok(())
}

fn print_release_report(report: &PublishReport) {
    println!(
        "Release complete: {} added, {} already present, {} failed",
        report.included.len(),
        report.already_present.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        println!(
            "  FAILED {} ({}): {}",
            failure.artifact.display(),
            failure.distribution,
            failure.error
        );
    }
}
