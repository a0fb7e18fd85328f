// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "fix the tests", "fix the tests", None },
    with_cap = { "fix the tests --max-iterations 5", "fix the tests", Some(5) },
    cap_first = { "--max-iterations 2 fix it", "fix it", Some(2) },
    zero_clamps = { "task --max-iterations 0", "task", Some(1) },
    missing_value = { "task --max-iterations", "task --max-iterations", None },
    bad_value = { "task --max-iterations soon", "task --max-iterations soon", None },
    empty = { "", "", None },
)]
fn ralph_args_parse(args: &str, task: &str, max: Option<u32>) {
    let (parsed_task, parsed_max) = parse_ralph_command(args);
    assert_eq!(parsed_task, task);
    assert_eq!(parsed_max, max);
}

#[test]
fn one_loop_per_topic() {
    let manager = RalphManager::new();
    let active = manager.begin(100).unwrap();
    assert!(manager.has_active_loop(100));
    assert!(manager.begin(100).is_none(), "second loop must be refused");
    assert!(manager.begin(200).is_some(), "other topics are free");

    manager.finish(100, &active.loop_id);
    assert!(!manager.has_active_loop(100));
    assert!(manager.begin(100).is_some());
}

#[test]
fn finish_ignores_stale_loop_id() {
    let manager = RalphManager::new();
    let active = manager.begin(100).unwrap();
    manager.finish(100, "some-other-id");
    assert!(manager.has_active_loop(100));
    manager.finish(100, &active.loop_id);
    assert!(!manager.has_active_loop(100));
}

#[test]
fn cancel_fires_the_token() {
    let manager = RalphManager::new();
    let active = manager.begin(100).unwrap();
    assert!(!active.cancel.is_cancelled());
    assert!(manager.cancel_loop(100));
    assert!(active.cancel.is_cancelled());
    assert!(!manager.cancel_loop(999));
}

#[test]
fn cancel_by_loop_id_checks_identity() {
    let manager = RalphManager::new();
    let active = manager.begin(100).unwrap();
    assert!(!manager.cancel_loop_id(100, "wrong-id"));
    assert!(manager.cancel_loop_id(100, &active.loop_id));
    assert!(active.cancel.is_cancelled());
}
