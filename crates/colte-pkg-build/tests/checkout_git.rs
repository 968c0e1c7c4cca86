//! Checkout against real git repositories on the local filesystem.

use colte_pkg_build::{checkout, resolved_revision};
use colte_pkg_core::{PipelineError, ProcessRunner, RepoRef};
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use tempfile::TempDir;

fn run_git(repo_dir: &Path, args: &[&str]) {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// An "upstream" repository with tags v1 and v2 on successive commits.
fn make_upstream() -> TempDir {
    let dir = TempDir::new().unwrap();
    run_git(dir.path(), &["init"]);
    run_git(dir.path(), &["config", "user.name", "test-user"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    run_git(dir.path(), &["commit", "--allow-empty", "-m", "first"]);
    run_git(dir.path(), &["tag", "v1"]);
    run_git(dir.path(), &["commit", "--allow-empty", "-m", "second"]);
    run_git(dir.path(), &["tag", "v2"]);
    dir
}

fn repo_ref(upstream: &Path) -> RepoRef {
    RepoRef {
        local_path: PathBuf::from("colte"),
        url: upstream.to_string_lossy().into_owned(),
    }
}

#[tokio::test]
async fn test_checkout_twice_resolves_same_revision() {
    let upstream = make_upstream();
    let ws = TempDir::new().unwrap();
    let repo = repo_ref(upstream.path());

    let path = checkout(&ProcessRunner, ws.path(), &repo, "v1")
        .await
        .expect("first checkout failed");
    let first = resolved_revision(&ProcessRunner, &path).await.unwrap();

    let path_again = checkout(&ProcessRunner, ws.path(), &repo, "v1")
        .await
        .expect("second checkout failed");
    let second = resolved_revision(&ProcessRunner, &path_again).await.unwrap();

    assert_eq!(path, path_again);
    assert_eq!(first, second);
    assert_eq!(first.len(), 40);
}

#[tokio::test]
async fn test_checkout_moves_between_tags() {
    let upstream = make_upstream();
    let ws = TempDir::new().unwrap();
    let repo = repo_ref(upstream.path());

    let path = checkout(&ProcessRunner, ws.path(), &repo, "v1").await.unwrap();
    let v1 = resolved_revision(&ProcessRunner, &path).await.unwrap();
    checkout(&ProcessRunner, ws.path(), &repo, "v2").await.unwrap();
    let v2 = resolved_revision(&ProcessRunner, &path).await.unwrap();

    assert_ne!(v1, v2);
}

#[tokio::test]
async fn test_fetch_picks_up_new_upstream_tags() {
    let upstream = make_upstream();
    let ws = TempDir::new().unwrap();
    let repo = repo_ref(upstream.path());

    checkout(&ProcessRunner, ws.path(), &repo, "v2").await.unwrap();

    run_git(upstream.path(), &["commit", "--allow-empty", "-m", "third"]);
    run_git(upstream.path(), &["tag", "v3"]);

    let path = checkout(&ProcessRunner, ws.path(), &repo, "v3")
        .await
        .expect("v3 should be fetched before checkout");
    let rev = resolved_revision(&ProcessRunner, &path).await.unwrap();

    let mut upstream_head = StdCommand::new("git");
    upstream_head
        .args(["rev-parse", "v3^{commit}"])
        .current_dir(upstream.path());
    let expected = String::from_utf8(upstream_head.output().unwrap().stdout).unwrap();
    assert_eq!(rev, expected.trim());
}

#[tokio::test]
async fn test_unknown_label_fails() {
    let upstream = make_upstream();
    let ws = TempDir::new().unwrap();

    let err = checkout(&ProcessRunner, ws.path(), &repo_ref(upstream.path()), "no-such-tag")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::CommandFailed { .. }));
}

#[tokio::test]
async fn test_existing_checkout_of_other_remote_is_rejected() {
    let upstream = make_upstream();
    let other = make_upstream();
    let ws = TempDir::new().unwrap();

    checkout(&ProcessRunner, ws.path(), &repo_ref(other.path()), "v1")
        .await
        .unwrap();

    let err = checkout(&ProcessRunner, ws.path(), &repo_ref(upstream.path()), "v1")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::RemoteMismatch { .. }));
}

#[tokio::test]
async fn test_url_rewrite_on_host_does_not_cause_mismatch() {
    let upstream = make_upstream();
    let ws = TempDir::new().unwrap();
    let repo = repo_ref(upstream.path());

    let path = checkout(&ProcessRunner, ws.path(), &repo, "v1").await.unwrap();

    // Rewrite the configured URL to an equivalent one, so that
    // `git remote get-url origin` would report a different string.
    let rewritten = format!("{}/.git", repo.url);
    let key = format!("url.{rewritten}.insteadOf");
    run_git(&path, &["config", &key, &repo.url]);

    checkout(&ProcessRunner, ws.path(), &repo, "v2")
        .await
        .expect("rewritten origin should still match the configured URL");
}
