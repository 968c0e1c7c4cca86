//! Repository synchronization.

use colte_pkg_core::error::{PipelineError, Result};
use colte_pkg_core::{CommandRunner, RepoRef, ToolCommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// Bring `repo` to `label` inside `workspace` and return the checkout path.
///
/// Clones when the checkout is missing; otherwise verifies that its
/// `origin` is `repo.url` and fetches. Then checks out `label`. Any git
/// failure (network, unknown label, dirty tree) is returned as is.
pub async fn checkout(
    runner: &dyn CommandRunner,
    workspace: &Path,
    repo: &RepoRef,
    label: &str,
) -> Result<PathBuf> {
    let local_path = workspace.join(&repo.local_path);

    if !local_path.exists() {
        info!(url = %repo.url, path = %local_path.display(), "Cloning");
        let clone = ToolCommand::new("git")
            .arg("clone")
            .arg(repo.url.clone())
            .path_arg(&local_path);
        runner.run_checked(&clone).await?;
    } else {
        verify_origin(runner, &local_path, &repo.url).await?;
        info!(path = %local_path.display(), "Fetching");
        let fetch = ToolCommand::new("git")
            .args(["fetch", "origin"])
            .current_dir(&local_path);
        runner.run_checked(&fetch).await?;
    }

    info!(path = %local_path.display(), label, "Checking out");
    let co = ToolCommand::new("git")
        .args(["checkout", label])
        .current_dir(&local_path);
    runner.run_checked(&co).await?;

    Ok(local_path)
}

/// Fail unless the checkout at `local_path` fetches from `expected_url`.
///
/// Compares the configured URL as written in `.git/config`, so
/// `url.<base>.insteadOf` rewrites on the host do not cause a mismatch.
pub async fn verify_origin(
    runner: &dyn CommandRunner,
    local_path: &Path,
    expected_url: &str,
) -> Result<()> {
    let cmd = ToolCommand::new("git")
        .args(["config", "--get", "remote.origin.url"])
        .current_dir(local_path)
        .captured();
    let output = runner.run_checked(&cmd).await?;
    let actual = output.stdout.trim();

    if actual != expected_url {
        return Err(PipelineError::RemoteMismatch {
            path: local_path.to_path_buf(),
            expected: expected_url.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Commit currently checked out at `local_path`.
pub async fn resolved_revision(runner: &dyn CommandRunner, local_path: &Path) -> Result<String> {
    let cmd = ToolCommand::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(local_path)
        .captured();
    let output = runner.run_checked(&cmd).await?;
    Ok(output.stdout.trim().to_string())
}
