// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run context: folder and branch carried through message footers
//!
//! Every final message ends with a `` `ctx: folder @ branch` `` line so a
//! reply can be routed back to the same working directory, including a
//! worktree when a branch is set.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn ctx_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        let re = Regex::new(r"`ctx:\s*([^@`]+?)(?:\s*@\s*([^`]+))?`").unwrap();
        re
    })
}

/// Context for a single agent run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub folder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl RunContext {
    pub fn new(folder: impl Into<String>, branch: Option<String>) -> Self {
        Self {
            folder: folder.into(),
            branch,
        }
    }

    /// Format as a footer line, e.g. `` `ctx: backend @ feat/x` ``.
    pub fn format_footer(&self) -> String {
        match &self.branch {
            Some(branch) => format!("`ctx: {} @ {}`", self.folder, branch),
            None => format!("`ctx: {}`", self.folder),
        }
    }

    /// Parse a context footer out of message text, if present.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = ctx_re().captures(text)?;
        let folder = caps.get(1)?.as_str().trim();
        if folder.is_empty() {
            return None;
        }
        let branch = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|b| !b.is_empty());
        Some(Self::new(folder, branch))
    }
}

/// Resolve the working directory for a run.
///
/// With a branch, the run happens in the folder's worktree for that branch;
/// branch slashes become double underscores on disk.
pub fn resolve_run_path(
    workspace_root: &Path,
    folder_path: &str,
    branch: Option<&str>,
    worktrees_dir: &str,
) -> PathBuf {
    let folder_abs = workspace_root.join(folder_path);
    match branch {
        None => folder_abs,
        Some(branch) => {
            let safe_branch = branch.replace('/', "__");
            folder_abs.join(worktrees_dir).join(safe_branch)
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
