// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic-based message routing
//!
//! The General topic (no thread, or thread 1) is the orchestrator scope;
//! topics bound to folders are worker scopes; anything else is an unbound
//! topic the handler must refuse. Routing also parses the slash command and
//! `@branch` directive out of the text.

use regex::Regex;
use relay_config::{FolderConfig, WorkspaceConfig};
use relay_core::RunContext;
use std::collections::HashMap;
use std::sync::OnceLock;

/// General-topic slash commands handled in-process (never sent to engines).
pub const GENERAL_SLASH_COMMANDS: &[&str] =
    &["clone", "create", "add", "list", "remove", "status", "help"];

fn branch_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        let re = Regex::new(r"^@([A-Za-z0-9][A-Za-z0-9/_.-]*)\s*").unwrap();
        re
    })
}

/// Result of routing a message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteResult {
    /// True for the General topic (orchestrator scope)
    pub is_general: bool,
    /// The folder when routed to a worker topic
    pub folder: Option<FolderConfig>,
    pub is_slash_command: bool,
    pub command: Option<String>,
    pub command_args: String,
    /// Branch from an `@branch` directive or inherited from the reply footer
    pub branch: Option<String>,
    /// Text after stripping command and branch directive
    pub prompt_text: String,
    /// Topic exists but no folder is mapped to it
    pub is_unbound_topic: bool,
}

/// Parse a leading slash command off the first line.
///
/// `/cmd@botname rest` → `("cmd", "rest")`; later lines append to the args.
pub fn parse_slash_command(text: &str) -> (Option<String>, String) {
    if !text.starts_with('/') {
        return (None, text.to_string());
    }
    let (first_line, rest) = match text.split_once('\n') {
        Some((first, rest)) => (first, Some(rest)),
        None => (text, None),
    };

    let mut parts = first_line.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().trim_start_matches('/');
    let command = command
        .split_once('@')
        .map(|(cmd, _)| cmd)
        .unwrap_or(command)
        .to_string();
    let mut args = parts.next().unwrap_or_default().to_string();
    if let Some(rest) = rest {
        if args.is_empty() {
            args = rest.to_string();
        } else {
            args = format!("{args}\n{rest}");
        }
    }
    (Some(command), args.trim().to_string())
}

/// Parse a leading `@branch` directive.
///
/// `"@feat/x implement this"` → `(Some("feat/x"), "implement this")`.
pub fn parse_branch_directive(text: &str) -> (Option<String>, String) {
    let Some(caps) = branch_re().captures(text) else {
        return (None, text.to_string());
    };
    let branch = caps
        .get(1)
        .map(|m| m.as_str().to_string());
    let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
    (branch, text[end..].trim().to_string())
}

/// Routes messages to handlers based on their topic
pub struct WorkspaceRouter {
    config: WorkspaceConfig,
    topic_to_folder: HashMap<i64, String>,
}

impl WorkspaceRouter {
    pub fn new(config: WorkspaceConfig) -> Self {
        let mut router = Self {
            config,
            topic_to_folder: HashMap::new(),
        };
        router.rebuild_topic_map();
        router
    }

    fn rebuild_topic_map(&mut self) {
        self.topic_to_folder.clear();
        for folder in self.config.folders.values() {
            if let Some(topic_id) = folder.topic_id {
                self.topic_to_folder.insert(topic_id, folder.name.clone());
            }
        }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Swap in an updated config after an admin mutation.
    pub fn reload(&mut self, config: WorkspaceConfig) {
        self.config = config;
        self.rebuild_topic_map();
    }

    /// Route a message given its topic, text, and replied-to text.
    pub fn route(
        &self,
        thread_id: Option<i64>,
        text: &str,
        reply_text: Option<&str>,
    ) -> RouteResult {
        let (command, command_args) = parse_slash_command(text);
        let is_slash_command = command.is_some();

        let text_to_parse = if is_slash_command {
            command_args.clone()
        } else {
            text.to_string()
        };
        let (mut branch, prompt_text) = parse_branch_directive(&text_to_parse);

        // A reply inherits the branch from the quoted ctx footer.
        if branch.is_none() {
            if let Some(reply) = reply_text {
                branch = RunContext::parse(reply).and_then(|ctx| ctx.branch);
            }
        }

        // General topic: no thread, or the pseudo-thread 1.
        if thread_id.is_none() || thread_id == Some(1) {
            return RouteResult {
                is_general: true,
                folder: None,
                is_slash_command,
                command,
                command_args,
                branch,
                prompt_text,
                is_unbound_topic: false,
            };
        }

        let folder = thread_id
            .and_then(|id| self.topic_to_folder.get(&id))
            .and_then(|name| self.config.folders.get(name))
            .cloned();

        if folder.is_none() {
            tracing::warn!(thread_id, "message in unbound topic");
        }
        RouteResult {
            is_general: false,
            is_unbound_topic: folder.is_none(),
            folder,
            is_slash_command,
            command,
            command_args,
            branch,
            prompt_text,
        }
    }

    pub fn is_ralph_command(&self, route: &RouteResult) -> bool {
        route.is_slash_command && route.command.as_deref() == Some("ralph")
    }
}

/// Whether a route is a built-in General-topic admin command.
pub fn is_general_slash_command(route: &RouteResult) -> bool {
    route.is_general
        && route.is_slash_command
        && route
            .command
            .as_deref()
            .is_some_and(|cmd| GENERAL_SLASH_COMMANDS.contains(&cmd))
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
