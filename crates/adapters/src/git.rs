// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git plumbing used by worktree management

use crate::subprocess::{run_with_timeout, GIT_CLONE_TIMEOUT, GIT_TIMEOUT};
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

/// Errors from git commands
#[derive(Debug, Error)]
#[error("git {command}: {message}")]
pub struct GitError {
    pub command: String,
    pub message: String,
}

/// One entry from `git worktree list --porcelain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: String,
    pub branch: Option<String>,
}

async fn git(repo: &Path, args: &[&str], timeout: std::time::Duration) -> Result<String, GitError> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(repo);
    let description = format!("git {}", args.join(" "));
    let output = run_with_timeout(cmd, timeout, &description)
        .await
        .map_err(|message| GitError {
            command: args.join(" "),
            message,
        })?;
    if !output.status.success() {
        return Err(GitError {
            command: args.join(" "),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Whether the directory is (inside) a git repository.
pub fn is_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Whether a local branch exists.
pub async fn branch_exists(branch: &str, repo: &Path) -> bool {
    git(
        repo,
        &[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ],
        GIT_TIMEOUT,
    )
    .await
    .is_ok()
}

/// Whether `origin/<branch>` exists.
pub async fn remote_branch_exists(branch: &str, repo: &Path) -> bool {
    git(
        repo,
        &[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/remotes/origin/{branch}"),
        ],
        GIT_TIMEOUT,
    )
    .await
    .is_ok()
}

/// Best guess at the repository's default branch.
///
/// Prefers origin's HEAD, then local `main`, then local `master`.
pub async fn default_branch(repo: &Path) -> String {
    if let Ok(output) = git(
        repo,
        &["symbolic-ref", "refs/remotes/origin/HEAD"],
        GIT_TIMEOUT,
    )
    .await
    {
        if let Some(branch) = output.trim().strip_prefix("refs/remotes/origin/") {
            return branch.to_string();
        }
    }
    for candidate in ["main", "master"] {
        if branch_exists(candidate, repo).await {
            return candidate.to_string();
        }
    }
    "main".to_string()
}

/// `git worktree add`, optionally creating the branch from `base_ref`.
pub async fn add_worktree(
    worktree_path: &Path,
    branch: &str,
    repo: &Path,
    create_branch: bool,
    base_ref: Option<&str>,
) -> Result<(), GitError> {
    let path = worktree_path.display().to_string();
    let mut args: Vec<&str> = vec!["worktree", "add"];
    if create_branch {
        args.extend(["-b", branch, &path]);
        if let Some(base) = base_ref {
            args.push(base);
        }
    } else {
        args.extend([path.as_str(), branch]);
    }
    git(repo, &args, GIT_TIMEOUT).await.map(|_| ())
}

/// Parse `git worktree list --porcelain` output.
pub fn parse_worktree_porcelain(output: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    let mut current: Option<WorktreeInfo> = None;
    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(info) = current.take() {
                worktrees.push(info);
            }
            current = Some(WorktreeInfo {
                path: path.to_string(),
                branch: None,
            });
        } else if let Some(branch) = line.strip_prefix("branch ") {
            if let Some(info) = current.as_mut() {
                info.branch = Some(
                    branch
                        .strip_prefix("refs/heads/")
                        .unwrap_or(branch)
                        .to_string(),
                );
            }
        }
    }
    if let Some(info) = current {
        worktrees.push(info);
    }
    worktrees
}

/// List the repository's worktrees.
pub async fn list_worktrees(repo: &Path) -> Result<Vec<WorktreeInfo>, GitError> {
    let output = git(repo, &["worktree", "list", "--porcelain"], GIT_TIMEOUT).await?;
    Ok(parse_worktree_porcelain(&output))
}

/// Whether a registered worktree exists at the given path.
pub async fn worktree_exists(worktree_path: &Path, repo: &Path) -> bool {
    if !worktree_path.exists() {
        return false;
    }
    let canonical = worktree_path
        .canonicalize()
        .unwrap_or_else(|_| worktree_path.to_path_buf());
    match list_worktrees(repo).await {
        Ok(worktrees) => worktrees
            .iter()
            .any(|wt| Path::new(&wt.path) == canonical || Path::new(&wt.path) == worktree_path),
        Err(_) => false,
    }
}

/// Clone a repository.
pub async fn clone_repo(origin: &str, dest: &Path, cwd: &Path) -> Result<(), GitError> {
    let dest = dest.display().to_string();
    git(cwd, &["clone", origin, &dest], GIT_CLONE_TIMEOUT)
        .await
        .map(|_| ())
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
