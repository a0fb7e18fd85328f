// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn footer_without_branch() {
    let ctx = RunContext::new("backend", None);
    assert_eq!(ctx.format_footer(), "`ctx: backend`");
}

#[test]
fn footer_with_branch() {
    let ctx = RunContext::new("backend", Some("feat/login".to_string()));
    assert_eq!(ctx.format_footer(), "`ctx: backend @ feat/login`");
}

#[parameterized(
    plain = { "`ctx: backend`", "backend", None },
    branch = { "`ctx: backend @ feat/login`", "backend", Some("feat/login") },
    embedded = { "all done!\n\n`ctx: api @ fix-123`\n`claude resume abc`", "api", Some("fix-123") },
    spaced = { "`ctx:   web  `", "web", None },
)]
fn parse_footer(text: &str, folder: &str, branch: Option<&str>) {
    let ctx = RunContext::parse(text).unwrap();
    assert_eq!(ctx.folder, folder);
    assert_eq!(ctx.branch.as_deref(), branch);
}

#[parameterized(
    no_footer = { "just some text" },
    not_code_span = { "ctx: backend" },
    empty = { "" },
)]
fn parse_returns_none(text: &str) {
    assert!(RunContext::parse(text).is_none());
}

#[test]
fn footer_round_trips() {
    let ctx = RunContext::new("backend", Some("feat/x".to_string()));
    assert_eq!(RunContext::parse(&ctx.format_footer()), Some(ctx));
}

#[test]
fn run_path_without_branch_is_folder() {
    let path = resolve_run_path(Path::new("/ws"), "backend", None, ".worktrees");
    assert_eq!(path, PathBuf::from("/ws/backend"));
}

#[test]
fn run_path_with_branch_uses_worktree() {
    let path = resolve_run_path(Path::new("/ws"), "backend", Some("feat/login"), ".worktrees");
    assert_eq!(path, PathBuf::from("/ws/backend/.worktrees/feat__login"));
}
