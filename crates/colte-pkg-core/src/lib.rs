//! colte-pkg core
//!
//! Shared pieces of the CoLTE packaging pipelines:
//! - configuration (targets, distributions, paths)
//! - external command execution behind the `CommandRunner` trait
//! - the artifact exchange layout the build and release pipelines share

pub mod config;
pub mod distribution;
pub mod error;
pub mod exchange;
pub mod exec;
pub mod fakes;
pub mod telemetry;

pub use config::{BuildStrategy, PipelineConfig, RepoRef, TargetConfig};
pub use distribution::{Distribution, DistributionSet, DEFAULT_DISTRIBUTIONS};
pub use error::{PipelineError, Result};
pub use exchange::{ArtifactExchange, BUILD_VOLUME_DIR, LAYOUT_VERSION};
pub use exec::{CommandOutput, CommandRunner, OutputMode, ProcessRunner, ToolCommand};
pub use telemetry::init_tracing;
