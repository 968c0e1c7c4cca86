//! Package archive backends.

use async_trait::async_trait;
use colte_pkg_core::error::{PipelineError, Result};
use colte_pkg_core::{CommandRunner, Distribution, ToolCommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Text reprepro prints when a file of the same name is already in the pool.
pub const ALREADY_INCLUDED_MARKER: &str =
    "Already existing files can only be included again, if they are the same, but:";

/// Whether archive tool output reports an artifact that was already
/// included. Re-publishing an unchanged build hits this for every file,
/// so it is not treated as a failure.
pub fn is_already_included(output: &str) -> bool {
    output.contains(ALREADY_INCLUDED_MARKER)
}

/// What happened to a submitted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeOutcome {
    Added,
    AlreadyPresent,
}

/// A persistent package archive keyed by distribution.
#[async_trait]
pub trait ArchiveTool: Send + Sync {
    /// Add one artifact to a distribution.
    async fn include(&self, dist: &Distribution, artifact: &Path) -> Result<IncludeOutcome>;

    /// Regenerate the published indices.
    async fn export(&self) -> Result<()>;
}

/// reprepro include subcommand for an artifact extension.
pub fn include_verb(extension: &str) -> Result<&'static str> {
    match extension {
        "deb" => Ok("includedeb"),
        "udeb" => Ok("includeudeb"),
        "dsc" => Ok("includedsc"),
        other => Err(PipelineError::InvalidConfig(format!(
            "reprepro cannot include .{other} files"
        ))),
    }
}

/// reprepro driven through a [`CommandRunner`].
pub struct Reprepro {
    runner: Arc<dyn CommandRunner>,
    base_dir: PathBuf,
    verb: &'static str,
}

impl Reprepro {
    /// Archive at `base_dir` (must exist) for artifacts with `extension`.
    pub fn new(runner: Arc<dyn CommandRunner>, base_dir: &Path, extension: &str) -> Result<Self> {
        if !base_dir.is_dir() {
            return Err(PipelineError::MissingInput(base_dir.to_path_buf()));
        }
        Ok(Self {
            runner,
            base_dir: std::fs::canonicalize(base_dir)?,
            verb: include_verb(extension)?,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn command(&self) -> ToolCommand {
        ToolCommand::new("reprepro")
            .arg("--basedir")
            .path_arg(&self.base_dir)
            .current_dir(&self.base_dir)
    }
}

#[async_trait]
impl ArchiveTool for Reprepro {
    async fn include(&self, dist: &Distribution, artifact: &Path) -> Result<IncludeOutcome> {
        let artifact = std::fs::canonicalize(artifact)?;
        let cmd = self
            .command()
            .args([self.verb, dist.as_str()])
            .path_arg(&artifact)
            .captured();

        let output = self.runner.run(&cmd).await?;
        if !output.success() && is_already_included(&output.combined()) {
            debug!(artifact = %artifact.display(), distribution = %dist, "Already in archive");
            return Ok(IncludeOutcome::AlreadyPresent);
        }
        output.check(&cmd)?;
        Ok(IncludeOutcome::Added)
    }

    async fn export(&self) -> Result<()> {
        info!(base_dir = %self.base_dir.display(), "Exporting archive");
        self.runner.run_checked(&self.command().arg("export")).await?;
        Ok(())
    }
}
