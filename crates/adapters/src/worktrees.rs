// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree management for isolated branch execution
//!
//! The `@branch` directive runs a turn against a named branch without
//! touching the folder's main checkout. Worktrees live under
//! `<folder>/<worktrees_dir>/<branch>` with slashes doubled to underscores.

use crate::git::{
    add_worktree, branch_exists, default_branch, is_git_repo, remote_branch_exists,
    worktree_exists, GitError,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default directory name for worktrees within a folder.
pub const DEFAULT_WORKTREES_DIR: &str = ".worktrees";

/// Errors from worktree operations
#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("invalid branch name: {0}")]
    InvalidBranch(String),
    #[error("not a git repository: {0}")]
    NotARepo(PathBuf),
    #[error("failed to create worktree: {0}")]
    Git(#[from] GitError),
    #[error("failed to prepare worktree directory: {0}")]
    Io(#[from] std::io::Error),
}

fn is_valid_branch_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '.' | '-')
}

/// Sanitize a user-supplied branch name for git and filesystem use.
///
/// Spaces become hyphens, leading slashes and `..` sequences are removed,
/// and consecutive separators collapse.
pub fn sanitize_branch_name(name: &str) -> Result<String, WorktreeError> {
    let mut name = name.trim().replace(' ', "-");
    name = name.trim_start_matches('/').to_string();
    while name.contains("..") {
        name = name.replace("..", ".");
    }
    while name.contains("//") {
        name = name.replace("//", "/");
    }
    while name.contains("--") {
        name = name.replace("--", "-");
    }
    let name = name.trim_end_matches(['/', '.']).to_string();

    if name.is_empty() {
        return Err(WorktreeError::InvalidBranch("(empty)".to_string()));
    }
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    if !first_ok || !name.chars().all(is_valid_branch_char) {
        return Err(WorktreeError::InvalidBranch(name));
    }
    Ok(name)
}

/// Path where the worktree for a branch lives.
pub fn worktree_path(folder_path: &Path, branch: &str, worktrees_dir: &str) -> PathBuf {
    let safe_name = branch.replace('/', "__");
    folder_path.join(worktrees_dir).join(safe_name)
}

/// Ensure a worktree exists for the branch, creating it if needed.
///
/// Creation strategy:
/// 1. worktree already registered → reuse
/// 2. local branch exists → `git worktree add <path> <branch>`
/// 3. `origin/<branch>` exists → new local branch tracking it
/// 4. otherwise → new branch from the base (origin's default when present)
pub async fn ensure_worktree(
    folder_path: &Path,
    branch: &str,
    worktrees_dir: &str,
    base_branch: Option<&str>,
) -> Result<PathBuf, WorktreeError> {
    if !is_git_repo(folder_path) {
        return Err(WorktreeError::NotARepo(folder_path.to_path_buf()));
    }

    let path = worktree_path(folder_path, branch, worktrees_dir);
    if worktree_exists(&path, folder_path).await {
        tracing::info!(path = %path.display(), branch, "worktree reused");
        return Ok(path);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if branch_exists(branch, folder_path).await {
        tracing::info!(branch, path = %path.display(), "worktree from local branch");
        add_worktree(&path, branch, folder_path, false, None).await?;
        return Ok(path);
    }

    if remote_branch_exists(branch, folder_path).await {
        tracing::info!(branch, path = %path.display(), "worktree from remote branch");
        add_worktree(
            &path,
            branch,
            folder_path,
            true,
            Some(&format!("origin/{branch}")),
        )
        .await?;
        return Ok(path);
    }

    let base = match base_branch {
        Some(base) => base.to_string(),
        None => default_branch(folder_path).await,
    };
    let base_ref = if remote_branch_exists(&base, folder_path).await {
        format!("origin/{base}")
    } else if branch_exists(&base, folder_path).await {
        base.clone()
    } else {
        "HEAD".to_string()
    };
    tracing::info!(branch, base = %base_ref, path = %path.display(), "worktree with new branch");
    add_worktree(&path, branch, folder_path, true, Some(&base_ref)).await?;
    Ok(path)
}

#[cfg(test)]
#[path = "worktrees_tests.rs"]
mod tests;
