// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;
use yare::parameterized;

fn config() -> WorkspaceConfig {
    let mut config = WorkspaceConfig::new("demo", PathBuf::from("/ws"));
    config.add_folder(FolderConfig {
        name: "backend".to_string(),
        path: "backend".to_string(),
        topic_id: Some(100),
        ..FolderConfig::default()
    });
    config.add_folder(FolderConfig {
        name: "web".to_string(),
        path: "apps/web".to_string(),
        topic_id: Some(200),
        ..FolderConfig::default()
    });
    config
}

fn router() -> WorkspaceRouter {
    WorkspaceRouter::new(config())
}

#[parameterized(
    simple = { "/status", Some("status"), "" },
    with_args = { "/add backend ./backend", Some("add"), "backend ./backend" },
    botname = { "/status@relay_bot now", Some("status"), "now" },
    multiline = { "/claude do this\nand that", Some("claude"), "do this\nand that" },
    multiline_no_args = { "/ralph\nfix the tests", Some("ralph"), "fix the tests" },
    not_command = { "hello world", None, "hello world" },
)]
fn slash_command_parse(text: &str, command: Option<&str>, args: &str) {
    let (cmd, parsed_args) = parse_slash_command(text);
    assert_eq!(cmd.as_deref(), command);
    assert_eq!(parsed_args, args);
}

#[parameterized(
    simple = { "@feat-1 do it", Some("feat-1"), "do it" },
    nested = { "@feat/login implement auth", Some("feat/login"), "implement auth" },
    dots = { "@v1.2-fix patch", Some("v1.2-fix"), "patch" },
    alone = { "@branchonly", Some("branchonly"), "" },
    none = { "no directive here", None, "no directive here" },
    mid_text = { "see @branch later", None, "see @branch later" },
    bare_at = { "@ something", None, "@ something" },
)]
fn branch_directive_parse(text: &str, branch: Option<&str>, rest: &str) {
    let (parsed_branch, remaining) = parse_branch_directive(text);
    assert_eq!(parsed_branch.as_deref(), branch);
    assert_eq!(remaining, rest);
}

#[test]
fn none_thread_routes_to_general() {
    let route = router().route(None, "hello", None);
    assert!(route.is_general);
    assert!(route.folder.is_none());
    assert!(!route.is_unbound_topic);
}

#[test]
fn thread_one_routes_to_general() {
    let route = router().route(Some(1), "hello", None);
    assert!(route.is_general);
}

#[test]
fn bound_topic_routes_to_folder() {
    let route = router().route(Some(100), "hello", None);
    assert!(!route.is_general);
    assert_eq!(route.folder.as_ref().map(|f| f.name.as_str()), Some("backend"));
}

#[test]
fn unbound_topic_is_flagged() {
    let route = router().route(Some(999), "hello", None);
    assert!(!route.is_general);
    assert!(route.folder.is_none());
    assert!(route.is_unbound_topic);
}

#[test]
fn slash_and_branch_compose() {
    let route = router().route(Some(100), "/ralph @feat/x fix the tests", None);
    assert!(route.is_slash_command);
    assert_eq!(route.command.as_deref(), Some("ralph"));
    assert_eq!(route.branch.as_deref(), Some("feat/x"));
    assert_eq!(route.prompt_text, "fix the tests");
}

#[test]
fn branch_inherited_from_reply_footer() {
    let reply = "done!\n\n`ctx: backend @ feat/login`";
    let route = router().route(Some(100), "continue please", Some(reply));
    assert_eq!(route.branch.as_deref(), Some("feat/login"));
}

#[test]
fn explicit_branch_beats_reply_footer() {
    let reply = "done!\n\n`ctx: backend @ feat/login`";
    let route = router().route(Some(100), "@other-branch go", Some(reply));
    assert_eq!(route.branch.as_deref(), Some("other-branch"));
}

#[test]
fn reload_rebuilds_topic_map() {
    let mut r = router();
    let mut updated = config();
    updated.set_folder_topic("web", 300);
    r.reload(updated);
    assert!(r.route(Some(200), "x", None).is_unbound_topic);
    assert_eq!(
        r.route(Some(300), "x", None)
            .folder
            .map(|f| f.name),
        Some("web".to_string())
    );
}

#[test]
fn ralph_command_detection() {
    let r = router();
    let route = r.route(Some(100), "/ralph fix tests", None);
    assert!(r.is_ralph_command(&route));
    let route = r.route(Some(100), "/status", None);
    assert!(!r.is_ralph_command(&route));
}

#[test]
fn general_slash_commands_recognized() {
    let r = router();
    assert!(is_general_slash_command(&r.route(None, "/list", None)));
    assert!(is_general_slash_command(&r.route(None, "/add x ./x", None)));
    // Worker-topic commands are not general commands.
    assert!(!is_general_slash_command(&r.route(Some(100), "/list", None)));
    // Unknown commands fall through to the orchestrator engine.
    assert!(!is_general_slash_command(&r.route(None, "/deploy", None)));
}
