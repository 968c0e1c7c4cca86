//! Error taxonomy for the build and release pipelines.

use std::path::PathBuf;

/// Pipeline errors.
///
/// External tool failures are carried through unchanged: the failing
/// command line, its exit code and whatever it wrote to stderr.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("`{command}` exited with code {exit_code}{}", stderr_suffix(.stderr))]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checkout at {path} tracks {actual}, expected {expected}")]
    RemoteMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid distribution name: {0:?}")]
    InvalidDistribution(String),

    #[error("artifact layout version {found} in {path} is not supported (expected {expected})")]
    LayoutMismatch {
        path: PathBuf,
        expected: u32,
        found: String,
    },

    #[error("missing input: {0}")]
    MissingInput(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
