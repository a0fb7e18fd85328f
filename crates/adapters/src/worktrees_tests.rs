// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "feature", "feature" },
    nested = { "feat/login", "feat/login" },
    spaces = { "my branch", "my-branch" },
    leading_slash = { "/feat/x", "feat/x" },
    dotdot = { "a..b", "a.b" },
    double_slash = { "a//b", "a/b" },
    double_hyphen = { "a--b", "a-b" },
    trailing = { "feat/x/.", "feat/x" },
    padded = { "  fix-123  ", "fix-123" },
)]
fn sanitize_accepts(input: &str, expected: &str) {
    assert_eq!(sanitize_branch_name(input).unwrap(), expected);
}

#[parameterized(
    empty = { "" },
    only_spaces = { "   " },
    only_symbols = { "///" },
    bad_start = { "-feature" },
    bad_char = { "feat@ure" },
)]
fn sanitize_rejects(input: &str) {
    assert!(sanitize_branch_name(input).is_err());
}

#[test]
fn worktree_path_doubles_slashes() {
    let path = worktree_path(Path::new("/ws/backend"), "feat/login", ".worktrees");
    assert_eq!(
        path,
        PathBuf::from("/ws/backend/.worktrees/feat__login")
    );
}

async fn init_repo(path: &Path) {
    for args in [
        vec!["init", "-b", "main"],
        vec!["config", "user.email", "test@example.com"],
        vec!["config", "user.name", "Test"],
        vec!["commit", "--allow-empty", "-m", "initial"],
    ] {
        let output = tokio::process::Command::new("git")
            .args(&args)
            .current_dir(path)
            .output()
            .await
            .unwrap();
        assert!(output.status.success(), "git {args:?} failed");
    }
}

#[tokio::test]
async fn ensure_creates_new_branch_worktree() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path()).await;

    let path = ensure_worktree(dir.path(), "feat/x", ".worktrees", None)
        .await
        .unwrap();
    assert!(path.exists());
    assert!(path.ends_with(".worktrees/feat__x"));
}

#[tokio::test]
async fn ensure_reuses_existing_worktree() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path()).await;

    let first = ensure_worktree(dir.path(), "feat/x", ".worktrees", None)
        .await
        .unwrap();
    let second = ensure_worktree(dir.path(), "feat/x", ".worktrees", None)
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn ensure_uses_existing_local_branch() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path()).await;
    let output = tokio::process::Command::new("git")
        .args(["branch", "existing"])
        .current_dir(dir.path())
        .output()
        .await
        .unwrap();
    assert!(output.status.success());

    let path = ensure_worktree(dir.path(), "existing", ".worktrees", None)
        .await
        .unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn ensure_rejects_non_repo() {
    let dir = tempfile::tempdir().unwrap();
    let err = ensure_worktree(dir.path(), "feat", ".worktrees", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorktreeError::NotARepo(_)));
}
