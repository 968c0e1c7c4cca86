//! Builds that use the target repository's own build entry point.

use colte_pkg_core::error::{PipelineError, Result};
use colte_pkg_core::{CommandRunner, ToolCommand};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Run `command` (argv form) from inside the checkout at `repo_path`.
pub async fn run_native_build(
    runner: &dyn CommandRunner,
    repo_path: &Path,
    command: &[String],
) -> Result<()> {
    let cmd = ToolCommand::from_argv(command)?.current_dir(repo_path);
    info!(command = %cmd, repo = %repo_path.display(), "Running native build");
    runner.run_checked(&cmd).await?;
    Ok(())
}

/// Copy `<build_output_root>/<dist>/*` into `<shared_output_root>/<dist>/`.
///
/// Every subdirectory of the build output is treated as a distribution.
/// Only regular files directly inside it are copied, following symlinks
/// for both the directories and the files; existing files with
/// the same name are overwritten. Returns the number of files copied per
/// distribution name.
pub fn collect_artifacts(
    build_output_root: &Path,
    shared_output_root: &Path,
) -> Result<BTreeMap<String, usize>> {
    if !build_output_root.is_dir() {
        return Err(PipelineError::MissingInput(build_output_root.to_path_buf()));
    }

    let mut copied = BTreeMap::new();
    for dist_entry in std::fs::read_dir(build_output_root)? {
        let dist_entry = dist_entry?;
        if !std::fs::metadata(dist_entry.path())?.is_dir() {
            debug!(path = %dist_entry.path().display(), "Skipping non-directory in build output");
            continue;
        }

        let dist_name = dist_entry.file_name().to_string_lossy().into_owned();
        let dst_dir = shared_output_root.join(&dist_name);
        std::fs::create_dir_all(&dst_dir)?;

        let mut count = 0;
        for file_entry in std::fs::read_dir(dist_entry.path())? {
            let file_entry = file_entry?;
            if !std::fs::metadata(file_entry.path())?.is_file() {
                continue;
            }
            std::fs::copy(file_entry.path(), dst_dir.join(file_entry.file_name()))?;
            count += 1;
        }

        info!(distribution = %dist_name, files = count, "Collected artifacts");
        copied.insert(dist_name, count);
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use colte_pkg_core::fakes::ScriptedRunner;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_native_build_runs_in_repo() {
        let runner = ScriptedRunner::new();
        let argv = vec![
            "python3".to_string(),
            "pkg/crossplatform/build_all.py".to_string(),
        ];

        run_native_build(&runner, Path::new("scratch/haulage"), &argv)
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].to_string(), "python3 pkg/crossplatform/build_all.py");
        assert_eq!(calls[0].cwd.as_deref(), Some(Path::new("scratch/haulage")));
    }

    #[tokio::test]
    async fn test_native_build_failure() {
        let runner = ScriptedRunner::new().fail_when(|_| true, "Traceback");
        let argv = vec!["python3".to_string()];
        assert!(run_native_build(&runner, Path::new("."), &argv).await.is_err());
    }

    #[test]
    fn test_collect_requires_build_output() {
        let tmp = tempdir().unwrap();
        let err = collect_artifacts(&tmp.path().join("build"), tmp.path()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn test_collect_skips_nested_dirs_and_overwrites() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("build");
        let dst = tmp.path().join("build-volume");
        std::fs::create_dir_all(src.join("focal").join("nested")).unwrap();
        std::fs::write(src.join("focal").join("haulage_1.0_amd64.deb"), b"new").unwrap();
        std::fs::write(src.join("focal").join("nested").join("x.deb"), b"x").unwrap();
        std::fs::write(src.join("README"), b"not a distribution").unwrap();

        std::fs::create_dir_all(dst.join("focal")).unwrap();
        std::fs::write(dst.join("focal").join("haulage_1.0_amd64.deb"), b"old").unwrap();
        std::fs::write(dst.join("focal").join("colte_1.0_amd64.deb"), b"colte").unwrap();

        let copied = collect_artifacts(&src, &dst).unwrap();

        assert_eq!(copied.get("focal"), Some(&1));
        assert_eq!(copied.len(), 1);
        assert_eq!(
            std::fs::read(dst.join("focal").join("haulage_1.0_amd64.deb")).unwrap(),
            b"new"
        );
        assert!(dst.join("focal").join("colte_1.0_amd64.deb").is_file());
        assert!(!dst.join("focal").join("nested").exists());
        assert!(!dst.join("README").exists());
    }

    #[test]
    fn test_collect_copies_every_distribution() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("build");
        let dst = tmp.path().join("build-volume");
        let layout: &[(&str, &[&str])] = &[
            ("buster", &["haulage_0.2.0_amd64.deb", "haulage-dbg_0.2.0_amd64.deb"]),
            ("focal", &["haulage_0.2.0_amd64.deb", "haulage_0.2.0_arm64.deb", "SHA256SUMS"]),
            ("bullseye", &["haulage_0.2.0_amd64.deb"]),
        ];
        for (dist, files) in layout {
            std::fs::create_dir_all(src.join(dist)).unwrap();
            for file in *files {
                std::fs::write(src.join(dist).join(file), format!("{dist}:{file}")).unwrap();
            }
        }

        let copied = collect_artifacts(&src, &dst).unwrap();

        for (dist, files) in layout {
            assert_eq!(copied.get(*dist), Some(&files.len()));
            let mut expected: Vec<String> = files.iter().map(|f| f.to_string()).collect();
            expected.sort();
            let mut found: Vec<String> = std::fs::read_dir(dst.join(dist))
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            found.sort();
            assert_eq!(found, expected);

            for file in *files {
                assert_eq!(
                    std::fs::read(dst.join(dist).join(file)).unwrap(),
                    std::fs::read(src.join(dist).join(file)).unwrap()
                );
            }
        }
        assert_eq!(copied.len(), layout.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_follows_symlinks() {
        use std::os::unix::fs::symlink;

        let tmp = tempdir().unwrap();
        let src = tmp.path().join("build");
        let dst = tmp.path().join("build-volume");
        let pool = tmp.path().join("pool");
        std::fs::create_dir_all(&pool).unwrap();
        std::fs::write(pool.join("haulage_0.2.0_amd64.deb"), b"linked").unwrap();

        // A real directory holding a symlinked package.
        std::fs::create_dir_all(src.join("focal")).unwrap();
        symlink(
            pool.join("haulage_0.2.0_amd64.deb"),
            src.join("focal").join("haulage_0.2.0_amd64.deb"),
        )
        .unwrap();
        // A distribution directory that is itself a symlink.
        symlink(&pool, src.join("buster")).unwrap();

        let copied = collect_artifacts(&src, &dst).unwrap();

        assert_eq!(copied.get("focal"), Some(&1));
        assert_eq!(copied.get("buster"), Some(&1));
        let out = dst.join("focal").join("haulage_0.2.0_amd64.deb");
        assert!(!std::fs::symlink_metadata(&out).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read(&out).unwrap(), b"linked");
        assert_eq!(
            std::fs::read(dst.join("buster").join("haulage_0.2.0_amd64.deb")).unwrap(),
            b"linked"
        );
    }
}
