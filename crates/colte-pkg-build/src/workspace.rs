//! Workspace directory management.

use colte_pkg_core::error::{PipelineError, Result};
use colte_pkg_core::ArtifactExchange;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the container entrypoint inside the workspace root.
pub const ENTRYPOINT_NAME: &str = "docker-entrypoint.sh";

/// Create the workspace skeleton and return its artifact exchange.
///
/// Creates `workspace/` and `workspace/build-volume/` if missing, copies
/// `entrypoint_script` to `workspace/docker-entrypoint.sh` and stamps the
/// exchange layout. Safe to repeat.
pub fn setup_workspace(workspace: &Path, entrypoint_script: &Path) -> Result<ArtifactExchange> {
    let exchange = ArtifactExchange::new(workspace);
    std::fs::create_dir_all(exchange.root())?;

    if !entrypoint_script.is_file() {
        return Err(PipelineError::MissingInput(entrypoint_script.to_path_buf()));
    }
    let dest = workspace.join(ENTRYPOINT_NAME);
    std::fs::copy(entrypoint_script, &dest)?;
    debug!(from = %entrypoint_script.display(), to = %dest.display(), "Copied entrypoint");

    exchange.stamp_layout()?;
    info!(workspace = %workspace.display(), "Workspace ready");
    Ok(exchange)
}

/// Remove the whole workspace when `requested`.
///
/// Irreversible: checkouts and every built artifact go with it. A
/// workspace that is a symlink is refused rather than followed.
pub fn clean_workspace(workspace: &Path, requested: bool) -> Result<()> {
    if !requested {
        return Ok(());
    }

    match std::fs::symlink_metadata(workspace) {
        Ok(meta) if meta.file_type().is_symlink() => Err(PipelineError::InvalidRequest(format!(
            "refusing to clean {}: it is a symlink",
            workspace.display()
        ))),
        Ok(_) => {
            warn!(
                "Removing existing tree at '{}' due to clean request",
                resolved(workspace).display()
            );
            std::fs::remove_dir_all(workspace)?;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(
                "Clean requested, but no clean to do for path '{}'",
                resolved(workspace).display()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Absolute form of `path` for log messages. Symlinks are resolved when
/// the path exists.
fn resolved(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
