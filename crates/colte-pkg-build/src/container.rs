//! Containerized per-distribution builds.

use colte_pkg_core::error::Result;
use colte_pkg_core::{ArtifactExchange, CommandRunner, Distribution, ToolCommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// Mount point of the shared output directory inside build containers.
pub const CONTAINER_VOLUME: &str = "/build-volume";

/// Tag of the build image for `dist`, e.g. `colte/focal-build-local`.
pub fn image_tag(image_prefix: &str, dist: &Distribution) -> String {
    format!("{image_prefix}/{dist}-build-local")
}

/// Dockerfile for `dist`, e.g. `docker/Dockerfile-focal`.
pub fn dockerfile_path(dockerfile_dir: &Path, dist: &Distribution) -> PathBuf {
    dockerfile_dir.join(format!("Dockerfile-{dist}"))
}

/// `docker build -f <dockerfile> --tag <tag> <context>`.
pub async fn build_image(
    runner: &dyn CommandRunner,
    context: &Path,
    dockerfile: &Path,
    tag: &str,
) -> Result<()> {
    info!(tag, dockerfile = %dockerfile.display(), "Building image");
    let cmd = ToolCommand::new("docker")
        .args(["build", "-f"])
        .path_arg(dockerfile)
        .args(["--tag", tag])
        .path_arg(context);
    runner.run_checked(&cmd).await?;
    Ok(())
}

/// Run the build image with the shared output directory mounted.
///
/// The host uid is the container's only argument so the entrypoint can
/// hand the artifacts back to the invoking user.
pub async fn run_build(
    runner: &dyn CommandRunner,
    exchange: &ArtifactExchange,
    tag: &str,
    host_uid: u32,
) -> Result<()> {
    let host_volume = std::fs::canonicalize(exchange.root())?;
    info!(tag, volume = %host_volume.display(), "Running build container");
    let cmd = ToolCommand::new("docker")
        .args(["run", "-v"])
        .arg(format!("{}:{CONTAINER_VOLUME}", host_volume.display()))
        .arg(tag)
        .arg(host_uid.to_string());
    runner.run_checked(&cmd).await?;
    Ok(())
}

/// Numeric id of the invoking user.
#[cfg(unix)]
pub fn current_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

/// Numeric id of the invoking user.
#[cfg(not(unix))]
pub fn current_uid() -> u32 {
    0
}
