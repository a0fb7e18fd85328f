// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_config::FolderConfig;
use std::path::PathBuf;

#[test]
fn preamble_lists_folders_and_keeps_prompt() {
    let mut config = WorkspaceConfig::new("demo", PathBuf::from("/ws"));
    config.add_folder(FolderConfig {
        name: "backend".to_string(),
        path: "backend".to_string(),
        topic_id: Some(100),
        description: Some("API server".to_string()),
        ..FolderConfig::default()
    });
    config.add_folder(FolderConfig {
        name: "web".to_string(),
        path: "apps/web".to_string(),
        ..FolderConfig::default()
    });

    let prompt = prepend_orchestrator_context(&config, "what needs doing?");
    assert!(prompt.contains("\"demo\""));
    assert!(prompt.contains("- backend (backend) — API server"));
    assert!(prompt.contains("- web (apps/web) [no topic yet]"));
    assert!(prompt.ends_with("what needs doing?"));
    // The preamble comes before the user text.
    assert!(prompt.find("orchestrator").unwrap() < prompt.find("what needs doing?").unwrap());
}

#[test]
fn empty_workspace_mentions_no_folders() {
    let config = WorkspaceConfig::new("bare", PathBuf::from("/ws"));
    let prompt = prepend_orchestrator_context(&config, "hi");
    assert!(prompt.contains("no folders yet"));
}
