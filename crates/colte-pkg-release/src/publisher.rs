//! Release pipeline: submit every built artifact, then export once.
//!
//! Unlike the build pipeline this stage is best-effort: an artifact the
//! archive rejects is logged and recorded, and the remaining artifacts
//! are still submitted. Export always runs after the loop.

use crate::archive::{ArchiveTool, IncludeOutcome};
use colte_pkg_core::error::Result;
use colte_pkg_core::{ArtifactExchange, Distribution, DistributionSet, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// An artifact the archive refused, or a distribution directory that
/// could not be listed (`artifact` is then the directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishFailure {
    pub distribution: Distribution,
    pub artifact: PathBuf,
    pub error: String,
}

/// Per-artifact outcome of a publish run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Newly added to the archive.
    pub included: Vec<(Distribution, PathBuf)>,

    /// Already present; left untouched.
    pub already_present: Vec<(Distribution, PathBuf)>,

    /// Rejected for any other reason.
    pub failures: Vec<PublishFailure>,
}

impl PublishReport {
    /// Artifacts submitted, whatever the outcome.
    pub fn submitted(&self) -> usize {
        self.included.len() + self.already_present.len() + self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Submit every artifact of every distribution to `archive`.
///
/// Never stops early: a distribution that cannot be listed and an
/// artifact the archive rejects are both recorded in the report.
pub async fn publish(
    archive: &dyn ArchiveTool,
    exchange: &ArtifactExchange,
    distributions: &DistributionSet,
    extension: &str,
) -> PublishReport {
    let mut report = PublishReport::default();

    for dist in distributions {
        let artifacts = match exchange.list_artifacts(dist, extension) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                let dir = exchange.distribution_dir(dist);
                error!(
                    path = %dir.display(),
                    distribution = %dist,
                    error = %e,
                    "Cannot list artifacts"
                );
                report.failures.push(PublishFailure {
                    distribution: dist.clone(),
                    artifact: dir,
                    error: e.to_string(),
                });
                continue;
            }
        };
        if artifacts.is_empty() {
            info!(distribution = %dist, "Nothing to publish");
            continue;
        }

        for artifact in artifacts {
            info!("Adding {} to {}", artifact.display(), dist);
            match archive.include(dist, &artifact).await {
                Ok(IncludeOutcome::Added) => report.included.push((dist.clone(), artifact)),
                Ok(IncludeOutcome::AlreadyPresent) => {
                    report.already_present.push((dist.clone(), artifact))
                }
                Err(e) => {
                    error!(
                        artifact = %artifact.display(),
                        distribution = %dist,
                        error = %e,
                        "Include failed"
                    );
                    report.failures.push(PublishFailure {
                        distribution: dist.clone(),
                        artifact,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    report
}

/// Make the archive's new state visible to consumers.
pub async fn finalize(archive: &dyn ArchiveTool) -> Result<()> {
    archive.export().await
}

/// Release pipeline orchestrator.
pub struct ReleasePipeline {
    archive: Arc<dyn ArchiveTool>,
    config: PipelineConfig,
}

impl ReleasePipeline {
    pub fn new(archive: Arc<dyn ArchiveTool>, config: PipelineConfig) -> Self {
        Self { archive, config }
    }

    /// Publish everything in the workspace's build volume, then export.
    ///
    /// Export runs once after the loop whatever the publish outcome; only
    /// an incompatible layout stamp or an export failure is returned as
    /// an error.
    pub async fn run(&self) -> Result<PublishReport> {
        let exchange = ArtifactExchange::new(&self.config.workspace);
        exchange.check_layout()?;

        let report = publish(
            self.archive.as_ref(),
            &exchange,
            &self.config.distributions,
            &self.config.artifact_extension,
        )
        .await;

        finalize(self.archive.as_ref()).await?;

        info!(
            included = report.included.len(),
            already_present = report.already_present.len(),
            failed = report.failures.len(),
            "Release complete"
        );
        Ok(report)
    }
}
