//! Artifact exchange layout.
//!
//! The build pipeline writes packages to
//! `<workspace>/build-volume/<distribution>/<artifact>` and the release
//! pipeline reads them back from there. Nothing else passes between the
//! two, so this module is the whole contract. The layout is stamped with
//! [`LAYOUT_VERSION`] so incompatible changes are caught at release time.

use crate::distribution::Distribution;
use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Name of the shared output directory inside the workspace.
pub const BUILD_VOLUME_DIR: &str = "build-volume";

/// Version of the on-disk layout described above.
pub const LAYOUT_VERSION: u32 = 1;

/// Stamp file holding [`LAYOUT_VERSION`].
pub const LAYOUT_STAMP: &str = ".layout-version";

/// Handle on a workspace's shared output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactExchange {
    root: PathBuf,
}

impl ArtifactExchange {
    /// Exchange rooted at `<workspace>/build-volume`.
    pub fn new(workspace: &Path) -> Self {
        Self {
            root: workspace.join(BUILD_VOLUME_DIR),
        }
    }

    /// The `build-volume` directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one distribution's artifacts.
    pub fn distribution_dir(&self, dist: &Distribution) -> PathBuf {
        self.root.join(dist.as_str())
    }

    /// Create the distribution directory if needed.
    pub fn ensure_distribution_dir(&self, dist: &Distribution) -> Result<PathBuf> {
        let dir = self.distribution_dir(dist);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write the layout stamp. The root must already exist.
    pub fn stamp_layout(&self) -> Result<()> {
        std::fs::write(self.root.join(LAYOUT_STAMP), format!("{LAYOUT_VERSION}\n"))?;
        Ok(())
    }

    /// Verify the layout stamp before reading.
    ///
    /// A tree without a stamp is accepted with a warning.
    pub fn check_layout(&self) -> Result<()> {
        let stamp = self.root.join(LAYOUT_STAMP);
        match std::fs::read_to_string(&stamp) {
            Ok(raw) => {
                let found = raw.trim();
                if found == LAYOUT_VERSION.to_string() {
                    Ok(())
                } else {
                    Err(PipelineError::LayoutMismatch {
                        path: stamp,
                        expected: LAYOUT_VERSION,
                        found: found.to_string(),
                    })
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.root.display(), "No layout stamp, assuming version {LAYOUT_VERSION}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Artifacts for a distribution with the given extension, sorted by
    /// file name. Symlinks are followed. A missing directory yields an
    /// empty list; an artifact that cannot be stat'ed is an error.
    pub fn list_artifacts(&self, dist: &Distribution, extension: &str) -> Result<Vec<PathBuf>> {
        let dir = self.distribution_dir(dist);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|e| e == extension)
                && std::fs::metadata(&path)?.is_file()
            {
                artifacts.push(path);
            }
        }
        artifacts.sort();
        Ok(artifacts)
    }
}
