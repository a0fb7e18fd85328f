// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn matcher() -> ResumeMatcher {
    ResumeMatcher::new(EngineId::new("claude"))
}

#[test]
fn format_produces_code_span() {
    let token = ResumeToken::new("claude", "session-123");
    assert_eq!(
        matcher().format(&token).unwrap(),
        "`claude resume session-123`"
    );
}

#[test]
fn format_rejects_wrong_engine() {
    let token = ResumeToken::new("codex", "session-123");
    let err = matcher().format(&token).unwrap_err();
    assert!(matches!(err, RunnerError::WrongEngine { .. }));
}

#[parameterized(
    backticks = { "`claude resume abc123`" },
    bare = { "claude resume abc123" },
    indented = { "  `claude resume abc123`" },
    uppercase = { "Claude Resume abc123" },
)]
fn is_resume_line_matches(line: &str) {
    assert!(matcher().is_resume_line(line));
}

#[parameterized(
    plain_text = { "hello world" },
    command = { "/claude something" },
    other_engine = { "codex resume abc123" },
    mid_line = { "try claude resume abc123 today" },
)]
fn is_resume_line_rejects(line: &str) {
    assert!(!matcher().is_resume_line(line));
}

#[test]
fn extract_finds_token_in_text() {
    let token = matcher()
        .extract("Here is the resume command:\n`claude resume abc123`")
        .unwrap();
    assert_eq!(token.engine, EngineId::new("claude"));
    assert_eq!(token.value, "abc123");
}

#[test]
fn extract_returns_last_match() {
    let token = matcher()
        .extract("`claude resume first`\n`claude resume second`")
        .unwrap();
    assert_eq!(token.value, "second");
}

#[test]
fn extract_none_without_match() {
    assert!(matcher().extract("").is_none());
    assert!(matcher().extract("just some text").is_none());
}

#[test]
fn format_extract_round_trip() {
    let token = ResumeToken::new("claude", "S1-abc_def");
    let line = matcher().format(&token).unwrap();
    assert_eq!(matcher().extract(&line), Some(token));
}

#[test]
fn strip_removes_resume_lines() {
    let m = matcher();
    let text = "please continue\n`claude resume abc`\nand also this";
    let stripped = strip_resume_lines(text, |line| m.is_resume_line(line));
    assert_eq!(stripped, "please continue\nand also this");
}

#[test]
fn strip_to_empty_returns_empty() {
    let m = matcher();
    let stripped = strip_resume_lines("`claude resume abc`", |line| m.is_resume_line(line));
    assert!(stripped.is_empty());
}
