// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in workspace admin commands and the command plugin contract
//!
//! `/add`, `/remove`, `/list`, `/status`, `/clone`, `/create`, and `/help`
//! are handled in-process in the General topic. Unknown commands may be
//! claimed by command plugins; anything left over falls through to the
//! orchestrator engine.

use crate::manager::WorkspaceManager;
use crate::router::RouteResult;
use async_trait::async_trait;
use relay_adapters::ChatApi;
use relay_config::{FolderConfig, WorkspaceConfig};

/// Context handed to command plugins
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub workspace: WorkspaceConfig,
    /// The folder of the topic the command arrived in, if any
    pub folder: Option<String>,
}

/// A pluggable `/command` handler
#[async_trait]
pub trait CommandBackend: Send + Sync {
    fn id(&self) -> &str;

    /// Handle the command; the returned text is sent as the reply.
    async fn handle(&self, args: &str, ctx: &CommandContext) -> String;
}

const HELP_TEXT: &str = "\
Workspace commands:
/add <name> [path] — bind a folder (and create its topic)
/clone <git-url> [name] — clone a repository into the workspace
/create <name> — create a new empty folder
/remove <name> — unbind a folder (files stay on disk)
/list — list folders
/status — workspace overview
/cancel — reply to a progress message to cancel that run
/ralph <task> [--max-iterations N] — self-continuing loop (worker topics)
Anything else goes to the orchestrator engine.";

/// Handle a built-in admin command. Returns the reply text.
pub async fn handle_admin_command<A: ChatApi>(
    manager: &WorkspaceManager<A>,
    route: &RouteResult,
) -> String {
    let command = route.command.as_deref().unwrap_or_default();
    let args = route.command_args.trim();
    match command {
        "help" => HELP_TEXT.to_string(),
        "list" => list_folders(&manager.config()),
        "status" => workspace_status(&manager.config()),
        "add" => add_folder(manager, args).await,
        "create" => create_folder(manager, args).await,
        "remove" => remove_folder(manager, args),
        "clone" => clone_repo(manager, args).await,
        other => format!("unknown command: /{other}"),
    }
}

fn list_folders(config: &WorkspaceConfig) -> String {
    if config.folders.is_empty() {
        return "No folders yet. Use /add <name> [path] or /clone <git-url>.".to_string();
    }
    let mut lines = vec!["Folders:".to_string()];
    for folder in config.folders.values() {
        let mut line = format!("• {} → {}", folder.name, folder.path);
        if folder.pending_topic {
            line.push_str(" (topic pending)");
        }
        if let Some(description) = &folder.description {
            line.push_str(&format!(" — {description}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn workspace_status(config: &WorkspaceConfig) -> String {
    let bound = config
        .folders
        .values()
        .filter(|f| f.topic_id.is_some())
        .count();
    let pending = config.pending_topics().len();
    format!(
        "Workspace \"{}\" at {}\nfolders: {} ({bound} bound, {pending} pending)\ndefault engine: {}",
        config.name,
        config.root.display(),
        config.folders.len(),
        config.default_engine,
    )
}

async fn add_folder<A: ChatApi>(manager: &WorkspaceManager<A>, args: &str) -> String {
    let mut parts = args.split_whitespace();
    let Some(name) = parts.next() else {
        return "Usage: /add <name> [path]".to_string();
    };
    let path = parts.next().unwrap_or(name).trim_start_matches("./");
    let config = manager.config();
    if config.folders.contains_key(name) {
        return format!("folder {name} already exists");
    }
    if !config.root.join(path).is_dir() {
        return format!("no such directory: {path}");
    }

    let result = manager.update_config(|config| {
        config.add_folder(FolderConfig {
            name: name.to_string(),
            path: path.to_string(),
            pending_topic: true,
            ..FolderConfig::default()
        });
    });
    match result {
        Ok(_) => {
            let created = manager.process_pending_topics().await;
            match created.iter().find(|(folder, _)| folder == name) {
                Some((_, topic_id)) => {
                    format!("added folder {name} → {path} (topic {topic_id})")
                }
                None => format!("added folder {name} → {path} (topic pending)"),
            }
        }
        Err(err) => format!("failed to save config: {err}"),
    }
}

async fn create_folder<A: ChatApi>(manager: &WorkspaceManager<A>, args: &str) -> String {
    let Some(name) = args.split_whitespace().next() else {
        return "Usage: /create <name>".to_string();
    };
    let config = manager.config();
    if config.folders.contains_key(name) {
        return format!("folder {name} already exists");
    }
    if let Err(err) = std::fs::create_dir_all(config.root.join(name)) {
        return format!("failed to create directory: {err}");
    }
    add_folder(manager, name).await
}

fn remove_folder<A: ChatApi>(manager: &WorkspaceManager<A>, args: &str) -> String {
    let Some(name) = args.split_whitespace().next() else {
        return "Usage: /remove <name>".to_string();
    };
    if !manager.config().folders.contains_key(name) {
        return format!("no such folder: {name}");
    }
    match manager.update_config(|config| {
        config.remove_folder(name);
    }) {
        Ok(_) => format!("removed folder {name} (files kept on disk)"),
        Err(err) => format!("failed to save config: {err}"),
    }
}

async fn clone_repo<A: ChatApi>(manager: &WorkspaceManager<A>, args: &str) -> String {
    let mut parts = args.split_whitespace();
    let Some(url) = parts.next() else {
        return "Usage: /clone <git-url> [name]".to_string();
    };
    let name = match parts.next() {
        Some(name) => name.to_string(),
        None => {
            let derived = url
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .trim_end_matches(".git");
            if derived.is_empty() {
                return format!("cannot derive a folder name from {url}");
            }
            derived.to_string()
        }
    };
    let config = manager.config();
    if config.folders.contains_key(&name) {
        return format!("folder {name} already exists");
    }

    let dest = config.root.join(&name);
    if let Err(err) = relay_adapters::git::clone_repo(url, &dest, &config.root).await {
        return format!("clone failed: {err}");
    }

    let result = manager.update_config(|config| {
        config.add_folder(FolderConfig {
            name: name.clone(),
            path: name.clone(),
            origin: Some(url.to_string()),
            pending_topic: true,
            ..FolderConfig::default()
        });
    });
    match result {
        Ok(_) => {
            manager.process_pending_topics().await;
            format!("cloned {url} → {name}")
        }
        Err(err) => format!("failed to save config: {err}"),
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
