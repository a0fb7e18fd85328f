// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator context for the General topic
//!
//! The first message of a General-topic conversation gets a workspace
//! preamble so the engine knows what folders exist and what it can do.
//! Resumed conversations already have it in their session.

use relay_config::WorkspaceConfig;

/// Prepend workspace context to a fresh orchestrator prompt.
pub fn prepend_orchestrator_context(config: &WorkspaceConfig, text: &str) -> String {
    let mut lines = vec![
        format!(
            "You are the orchestrator for the \"{}\" workspace at {}.",
            config.name,
            config.root.display()
        ),
        String::new(),
    ];

    if config.folders.is_empty() {
        lines.push("The workspace has no folders yet.".to_string());
    } else {
        lines.push("Folders in this workspace:".to_string());
        for folder in config.folders.values() {
            let mut entry = format!("- {} ({})", folder.name, folder.path);
            if let Some(description) = &folder.description {
                entry.push_str(&format!(" — {description}"));
            }
            if folder.topic_id.is_none() {
                entry.push_str(" [no topic yet]");
            }
            lines.push(entry);
        }
    }

    lines.push(String::new());
    lines.push(
        "Each folder has its own chat topic where an agent runs with that folder as \
         working directory. You run at the workspace root: answer questions about the \
         workspace, coordinate work across folders, and suggest which topic to use for \
         folder-specific tasks."
            .to_string(),
    );
    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push(text.to_string());
    lines.join("\n")
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
