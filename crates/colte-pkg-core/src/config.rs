//! Pipeline configuration.
//!
//! Defaults reproduce the stock CoLTE packaging setup: two targets
//! (`colte` built in per-distribution Docker images, `haulage` built by
//! its own cross-platform script), four distributions, a `scratch/`
//! workspace and a `repo/` reprepro base directory. A TOML file may
//! override any subset of fields.

use crate::distribution::DistributionSet;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration shared by both pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Workspace root holding checkouts and `build-volume`.
    pub workspace: PathBuf,

    /// reprepro base directory.
    pub archive_dir: PathBuf,

    /// Distributions to build and publish, in order.
    pub distributions: DistributionSet,

    /// File extension of publishable artifacts (without the dot).
    pub artifact_extension: String,

    /// Script copied into the workspace root for the container builds.
    pub entrypoint_script: PathBuf,

    /// Source repositories to check out and build, in build order.
    pub targets: Vec<TargetConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("scratch"),
            archive_dir: PathBuf::from("repo"),
            distributions: DistributionSet::default(),
            artifact_extension: "deb".to_string(),
            entrypoint_script: PathBuf::from("docker/docker-entrypoint.sh"),
            targets: vec![TargetConfig::colte(), TargetConfig::haulage()],
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading configuration");
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.artifact_extension.is_empty() || self.artifact_extension.contains(['.', '/']) {
            return invalid(format!(
                "artifact_extension {:?} must be a bare extension such as \"deb\"",
                self.artifact_extension
            ));
        }

        if self.targets.is_empty() {
            return invalid("at least one target is required".to_string());
        }

        for (i, target) in self.targets.iter().enumerate() {
            target.validate()?;
            let earlier = &self.targets[..i];
            if earlier.iter().any(|t| t.name == target.name) {
                return invalid(format!("target {} is defined twice", target.name));
            }
            if earlier.iter().any(|t| t.local_path == target.local_path) {
                return invalid(format!(
                    "targets share the checkout path {}",
                    target.local_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Look up a target by name.
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Names of all configured targets, in build order.
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name.as_str()).collect()
    }
}

/// A source repository and how to build it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Short name used on the command line (`--tag <name>=<ref>`).
    pub name: String,

    /// Remote clone URL.
    pub url: String,

    /// Checkout directory relative to the workspace root.
    pub local_path: PathBuf,

    /// Ref checked out by `build --main`.
    pub unstable_ref: String,

    /// Build strategy.
    pub build: BuildStrategy,
}

impl TargetConfig {
    /// The CoLTE core packages, built inside per-distribution containers.
    pub fn colte() -> Self {
        Self {
            name: "colte".to_string(),
            url: "https://github.com/uw-ictd/colte.git".to_string(),
            local_path: PathBuf::from("colte"),
            unstable_ref: "main".to_string(),
            build: BuildStrategy::Container {
                dockerfile_dir: PathBuf::from("docker"),
                image_prefix: "colte".to_string(),
            },
        }
    }

    /// Haulage, which ships its own cross-platform build script.
    pub fn haulage() -> Self {
        Self {
            name: "haulage".to_string(),
            url: "https://github.com/uw-ictd/haulage.git".to_string(),
            local_path: PathBuf::from("haulage"),
            unstable_ref: "master".to_string(),
            build: BuildStrategy::Native {
                command: vec![
                    "python3".to_string(),
                    "pkg/crossplatform/build_all.py".to_string(),
                ],
                output_dir: PathBuf::from("build"),
            },
        }
    }

    /// Repository reference for checkout.
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef {
            local_path: self.local_path.clone(),
            url: self.url.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.name.is_empty()
            || self.name.contains(['=', ','])
            || self.name.contains(char::is_whitespace)
        {
            return invalid(format!(
                "target name {:?} is not usable on the command line",
                self.name
            ));
        }
        if self.url.is_empty() {
            return invalid(format!("target {} has no url", self.name));
        }
        if self.local_path.as_os_str().is_empty() || self.local_path.is_absolute() {
            return invalid(format!(
                "target {} local_path must be relative to the workspace",
                self.name
            ));
        }
        if self.unstable_ref.is_empty() {
            return invalid(format!("target {} has no unstable_ref", self.name));
        }
        if let BuildStrategy::Native { command, .. } = &self.build {
            if command.is_empty() {
                return invalid(format!("target {} has an empty build command", self.name));
            }
        }
        Ok(())
    }
}

/// How a target's packages are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum BuildStrategy {
    /// One `docker build` + `docker run` per distribution.
    ///
    /// Dockerfiles are `<dockerfile_dir>/Dockerfile-<dist>`, images are
    /// tagged `<image_prefix>/<dist>-build-local`.
    Container {
        dockerfile_dir: PathBuf,
        image_prefix: String,
    },

    /// The repository's own build entry point, run from its checkout.
    ///
    /// Output is expected under `<checkout>/<output_dir>/<dist>/`.
    Native {
        command: Vec<String>,
        output_dir: PathBuf,
    },
}

/// A local checkout path and the remote it tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    /// Path relative to the workspace root.
    pub local_path: PathBuf,

    /// Remote clone URL.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PipelineConfig::default();
        config.validate().expect("defaults must be valid");
        assert_eq!(config.target_names(), vec!["colte", "haulage"]);
        assert_eq!(config.workspace, PathBuf::from("scratch"));
        assert_eq!(config.target("haulage").unwrap().unstable_ref, "master");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
workspace = "/tmp/ws"
distributions = ["focal", "jammy"]
"#,
        )
        .unwrap();

        assert_eq!(config.workspace, PathBuf::from("/tmp/ws"));
        assert_eq!(config.distributions.len(), 2);
        assert_eq!(config.archive_dir, PathBuf::from("repo"));
        assert_eq!(config.targets.len(), 2);
    }

    #[test]
    fn test_targets_from_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
[[targets]]
name = "tool"
url = "https://example.com/tool.git"
local_path = "tool"
unstable_ref = "develop"

[targets.build]
kind = "native"
command = ["make", "debs"]
output_dir = "out"
"#,
        )
        .unwrap();

        let target = config.target("tool").unwrap();
        assert_eq!(
            target.build,
            BuildStrategy::Native {
                command: vec!["make".to_string(), "debs".to_string()],
                output_dir: PathBuf::from("out"),
            }
        );
    }

    #[test]
    fn test_rejects_duplicate_distributions() {
        let err = PipelineConfig::from_toml_str(r#"distributions = ["focal", "focal"]"#)
            .unwrap_err();
        assert!(err.to_string().contains("focal"));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(PipelineConfig::from_toml_str("workspce = \"typo\"").is_err());
    }

    #[test]
    fn test_rejects_duplicate_target_names() {
        let mut config = PipelineConfig::default();
        let mut dup = TargetConfig::haulage();
        dup.name = "colte".to_string();
        dup.local_path = PathBuf::from("other");
        config.targets.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_native_command() {
        let mut config = PipelineConfig::default();
        config.targets[1].build = BuildStrategy::Native {
            command: vec![],
            output_dir: PathBuf::from("build"),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_dotted_extension() {
        let config = PipelineConfig {
            artifact_extension: ".deb".to_string(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
