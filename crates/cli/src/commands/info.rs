// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay info`: workspace and engine status

use anyhow::{anyhow, Result};
use relay_config::{
    find_workspace_root, load_workspace_config, WORKSPACE_CONFIG_DIR, WORKSPACE_CONFIG_FILE,
};
use relay_plugins::plugin_registry;

pub fn run() -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let root = find_workspace_root(&cwd).ok_or_else(|| {
        anyhow!("not in a workspace (no {WORKSPACE_CONFIG_DIR}/{WORKSPACE_CONFIG_FILE} found)")
    })?;
    let workspace = load_workspace_config(&root)?;

    println!("workspace: {} ({})", workspace.name, root.display());
    println!("default engine: {}", workspace.default_engine);
    println!("default transport: {}", workspace.default_transport);

    if workspace.folders.is_empty() {
        println!("folders: (none)");
    } else {
        println!("folders:");
        for folder in workspace.folders.values() {
            let topic = match folder.topic_id {
                Some(topic_id) => format!("topic {topic_id}"),
                None => "topic pending".to_string(),
            };
            println!("  {} → {} ({topic})", folder.name, folder.path);
        }
    }

    let registry = plugin_registry();
    println!("engines:");
    for backend in registry.engines() {
        let empty = toml::Table::new();
        let config = workspace
            .engine_config(backend.id.as_str())
            .unwrap_or(&empty);
        match backend.availability_issue(config) {
            None => println!("  {} — ready", backend.id),
            Some(issue) => println!("  {} — {issue}", backend.id),
        }
    }

    let transport = registry.transport(&workspace.default_transport);
    match transport {
        Some(transport) => {
            let setup = transport.check_setup(&workspace);
            let status = if setup.ready { "ready" } else { "not ready" };
            println!("transport {}: {status} — {}", transport.id(), setup.message);
        }
        None => println!("transport {}: not registered", workspace.default_transport),
    }
    Ok(0)
}
