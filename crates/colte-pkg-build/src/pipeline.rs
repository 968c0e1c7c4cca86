//! Build pipeline orchestration.
//!
//! Workspace setup, then every target is checked out, then every target
//! is built in configuration order. The first failure stops the run.

use crate::checkout::{checkout, resolved_revision};
use crate::container::{build_image, current_uid, dockerfile_path, image_tag, run_build};
use crate::native::{collect_artifacts, run_native_build};
use crate::workspace::{clean_workspace, setup_workspace};
use colte_pkg_core::error::{PipelineError, Result};
use colte_pkg_core::{
    ArtifactExchange, BuildStrategy, CommandRunner, PipelineConfig, TargetConfig,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Which revision of each target to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefSelection {
    /// Each target's configured unstable branch.
    Unstable,

    /// An explicit ref for every target, keyed by target name.
    Pinned(BTreeMap<String, String>),
}

impl RefSelection {
    /// Build a pinned selection from `(target, ref)` pairs.
    pub fn pinned<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut refs = BTreeMap::new();
        for (target, label) in pairs {
            if label.is_empty() {
                return Err(PipelineError::InvalidRequest(format!(
                    "empty ref for target {target}"
                )));
            }
            if refs.insert(target.clone(), label).is_some() {
                return Err(PipelineError::InvalidRequest(format!(
                    "target {target} was given more than one ref"
                )));
            }
        }
        Ok(Self::Pinned(refs))
    }
}

/// A validated build request: one ref label per configured target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// `(target name, ref label)` in build order.
    pub labels: Vec<(String, String)>,

    /// Wipe the workspace first.
    pub clean: bool,
}

impl BuildPlan {
    /// Resolve `selection` against the configured targets.
    ///
    /// A pinned selection must name every target and nothing else.
    pub fn new(config: &PipelineConfig, selection: &RefSelection, clean: bool) -> Result<Self> {
        let labels = match selection {
            RefSelection::Unstable => config
                .targets
                .iter()
                .map(|t| (t.name.clone(), t.unstable_ref.clone()))
                .collect(),
            RefSelection::Pinned(refs) => {
                if let Some(unknown) = refs.keys().find(|name| config.target(name).is_none()) {
                    return Err(PipelineError::InvalidRequest(format!(
                        "unknown target {unknown} (configured: {})",
                        config.target_names().join(", ")
                    )));
                }
                let missing: Vec<&str> = config
                    .target_names()
                    .into_iter()
                    .filter(|name| !refs.contains_key(*name))
                    .collect();
                if !missing.is_empty() {
                    return Err(PipelineError::InvalidRequest(format!(
                        "either --main must be given or a ref for every target; missing: {}",
                        missing.join(", ")
                    )));
                }
                config
                    .targets
                    .iter()
                    .map(|t| (t.name.clone(), refs[&t.name].clone()))
                    .collect()
            }
        };
        Ok(Self { labels, clean })
    }
}

/// One checked-out target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRecord {
    pub target: String,
    pub label: String,
    pub revision: String,
    pub path: PathBuf,
}

/// One completed build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// e.g. `colte/focal`, `haulage`.
    pub name: String,
    pub duration_ms: u64,
}

/// Result of a successful build run.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub checkouts: Vec<CheckoutRecord>,
    pub steps: Vec<StepRecord>,
    /// Files collected from native builds, per distribution.
    pub collected: BTreeMap<String, usize>,
    pub duration_ms: u64,
}

/// Build pipeline orchestrator.
pub struct BuildPipeline {
    runner: Arc<dyn CommandRunner>,
    config: PipelineConfig,
    host_uid: u32,
}

impl BuildPipeline {
    pub fn new(runner: Arc<dyn CommandRunner>, config: PipelineConfig) -> Self {
        Self {
            runner,
            config,
            host_uid: current_uid(),
        }
    }

    /// Override the uid handed to build containers.
    pub fn with_host_uid(mut self, uid: u32) -> Self {
        self.host_uid = uid;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute the plan. Stops at the first failing step.
    pub async fn run(&self, plan: &BuildPlan) -> Result<BuildSummary> {
        let start = Instant::now();
        let workspace = self.config.workspace.as_path();
        let mut summary = BuildSummary::default();

        clean_workspace(workspace, plan.clean)?;
        let exchange = setup_workspace(workspace, &self.config.entrypoint_script)?;

        let mut checkouts = Vec::new();
        for (name, label) in &plan.labels {
            let target = self.target(name)?;
            let path =
                checkout(self.runner.as_ref(), workspace, &target.repo_ref(), label).await?;
            let revision = resolved_revision(self.runner.as_ref(), &path).await?;
            info!(target = %name, label = %label, revision = %revision, "Checked out");
            checkouts.push((target, path.clone()));
            summary.checkouts.push(CheckoutRecord {
                target: name.clone(),
                label: label.clone(),
                revision,
                path,
            });
        }

        for (target, path) in checkouts {
            match &target.build {
                BuildStrategy::Container {
                    dockerfile_dir,
                    image_prefix,
                } => {
                    let steps = self
                        .build_in_containers(
                            target,
                            workspace,
                            &exchange,
                            dockerfile_dir,
                            image_prefix,
                        )
                        .await?;
                    summary.steps.extend(steps);
                }
                BuildStrategy::Native {
                    command,
                    output_dir,
                } => {
                    let step_start = Instant::now();
                    run_native_build(self.runner.as_ref(), &path, command).await?;
                    let collected = collect_artifacts(&path.join(output_dir), exchange.root())?;
                    for (dist, count) in collected {
                        if !self.config.distributions.contains(&dist) {
                            warn!(
                                target = %target.name,
                                distribution = %dist,
                                "Collected artifacts for an unconfigured distribution"
                            );
                        }
                        *summary.collected.entry(dist).or_default() += count;
                    }
                    summary.steps.push(StepRecord {
                        name: target.name.clone(),
                        duration_ms: step_start.elapsed().as_millis() as u64,
                    });
                }
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            steps = summary.steps.len(),
            duration_ms = summary.duration_ms,
            "Build complete"
        );
        Ok(summary)
    }

    /// One image build and one container run per distribution, in order.
    async fn build_in_containers(
        &self,
        target: &TargetConfig,
        workspace: &Path,
        exchange: &ArtifactExchange,
        dockerfile_dir: &Path,
        image_prefix: &str,
    ) -> Result<Vec<StepRecord>> {
        let mut steps = Vec::new();
        for dist in &self.config.distributions {
            let step_start = Instant::now();
            let tag = image_tag(image_prefix, dist);
            build_image(
                self.runner.as_ref(),
                workspace,
                &dockerfile_path(dockerfile_dir, dist),
                &tag,
            )
            .await?;
            run_build(self.runner.as_ref(), exchange, &tag, self.host_uid).await?;
            steps.push(StepRecord {
                name: format!("{}/{dist}", target.name),
                duration_ms: step_start.elapsed().as_millis() as u64,
            });
        }
        Ok(steps)
    }

    fn target(&self, name: &str) -> Result<&TargetConfig> {
        self.config
            .target(name)
            .ok_or_else(|| PipelineError::InvalidRequest(format!("unknown target {name}")))
    }
}
