// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace configuration: `.relay/workspace.toml`
//!
//! The typed schema is parsed leniently: unknown fields are logged and
//! ignored so a newer config keeps working with an older binary. Admin
//! mutations clone the config, change it, and save the whole document.

use crate::store::{read_raw_toml, StoreError};
use indexmap::IndexMap;
use relay_core::EngineId;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::{Table, Value};

pub const WORKSPACE_CONFIG_DIR: &str = ".relay";
pub const WORKSPACE_CONFIG_FILE: &str = "workspace.toml";

const DEFAULT_WORKTREES_DIR: &str = ".worktrees";
const DEFAULT_BATCH_WINDOW_MS: u64 = 200;

/// Errors from config loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("not in a workspace (no {WORKSPACE_CONFIG_DIR}/{WORKSPACE_CONFIG_FILE} found)")]
    NotInWorkspace,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid `{section}` in {path}: {message}")]
    Invalid {
        section: String,
        path: PathBuf,
        message: String,
    },
}

/// Ralph loop configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RalphConfig {
    pub enabled: bool,
    pub default_max_iterations: u32,
}

impl Default for RalphConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_max_iterations: 3,
        }
    }
}

/// One folder in the workspace (repo or plain directory)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FolderConfig {
    pub name: String,
    /// Relative to the workspace root
    pub path: String,
    /// Extra channels this folder listens on, beyond its topic
    pub channels: Vec<i64>,
    pub topic_id: Option<i64>,
    pub description: Option<String>,
    /// Git remote URL if cloned
    pub origin: Option<String>,
    /// True while the chat topic for this folder is still to be created
    pub pending_topic: bool,
}

impl FolderConfig {
    pub fn absolute_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.path)
    }

    pub fn is_git_repo(&self, workspace_root: &Path) -> bool {
        self.absolute_path(workspace_root).join(".git").exists()
    }
}

/// Configuration for a workspace with multiple folders
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceConfig {
    pub name: String,
    /// Absolute path to the workspace root; not serialized
    pub root: PathBuf,
    pub default_engine: EngineId,
    pub default_transport: String,
    pub worktrees_dir: String,
    pub worktree_base: Option<String>,
    pub folders: IndexMap<String, FolderConfig>,
    pub ralph: RalphConfig,
    /// Opaque per-transport tables, handed to the transport backend
    pub transports: IndexMap<String, Table>,
    /// Opaque per-engine tables, handed to `build_runner`
    pub engines: IndexMap<String, Table>,
    /// Opaque tables for other plugins
    pub plugin_configs: IndexMap<String, Table>,
    pub message_batch_window_ms: u64,
    /// Send the final answer as a fresh (notifying) message instead of
    /// editing the progress message in place
    pub final_notify: bool,
}

impl WorkspaceConfig {
    pub fn new(name: impl Into<String>, root: PathBuf) -> Self {
        Self {
            name: name.into(),
            root,
            default_engine: EngineId::new("claude"),
            default_transport: "telegram".to_string(),
            worktrees_dir: DEFAULT_WORKTREES_DIR.to_string(),
            worktree_base: None,
            folders: IndexMap::new(),
            ralph: RalphConfig::default(),
            transports: IndexMap::new(),
            engines: IndexMap::new(),
            plugin_configs: IndexMap::new(),
            message_batch_window_ms: DEFAULT_BATCH_WINDOW_MS,
            final_notify: false,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(WORKSPACE_CONFIG_DIR).join(WORKSPACE_CONFIG_FILE)
    }

    pub fn folder_by_topic(&self, topic_id: i64) -> Option<&FolderConfig> {
        self.folders.values().find(|f| f.topic_id == Some(topic_id))
    }

    pub fn pending_topics(&self) -> Vec<&FolderConfig> {
        self.folders.values().filter(|f| f.pending_topic).collect()
    }

    /// Config table for a transport: `[transports.<id>]`, or a legacy
    /// top-level `[<id>]` table.
    pub fn transport_config(&self, id: &str) -> Option<&Table> {
        self.transports
            .get(id)
            .or_else(|| self.plugin_configs.get(id))
    }

    pub fn engine_config(&self, id: &str) -> Option<&Table> {
        self.engines.get(id)
    }

    pub fn add_folder(&mut self, folder: FolderConfig) {
        self.folders.insert(folder.name.clone(), folder);
    }

    pub fn remove_folder(&mut self, name: &str) -> Option<FolderConfig> {
        self.folders.shift_remove(name)
    }

    pub fn set_folder_topic(&mut self, name: &str, topic_id: i64) {
        if let Some(folder) = self.folders.get_mut(name) {
            folder.topic_id = Some(topic_id);
            folder.pending_topic = false;
        }
    }
}

/// Walk upward from `start` for a directory containing the workspace config.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current
            .join(WORKSPACE_CONFIG_DIR)
            .join(WORKSPACE_CONFIG_FILE)
            .exists()
        {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Load the workspace config from `<root>/.relay/workspace.toml`.
pub fn load_workspace_config(workspace_root: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let path = workspace_root
        .join(WORKSPACE_CONFIG_DIR)
        .join(WORKSPACE_CONFIG_FILE);
    if !path.exists() {
        return Err(ConfigError::NotInWorkspace);
    }
    let table = read_raw_toml(&path)?;
    parse_workspace_config(&table, workspace_root, &path)
}

const KNOWN_WORKSPACE_KEYS: &[&str] = &[
    "name",
    "default_engine",
    "default_transport",
    "worktrees_dir",
    "worktree_base",
    "message_batch_window_ms",
    "final_notify",
];

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["workspace", "folders", "workers", "transports", "engines", "plugins"];

fn parse_workspace_config(
    table: &Table,
    root: &Path,
    path: &Path,
) -> Result<WorkspaceConfig, ConfigError> {
    let workspace = table
        .get("workspace")
        .and_then(Value::as_table)
        .cloned()
        .unwrap_or_default();

    for key in workspace.keys() {
        if !KNOWN_WORKSPACE_KEYS.contains(&key.as_str()) {
            tracing::warn!(key, path = %path.display(), "unknown [workspace] field ignored");
        }
    }

    let mut config = WorkspaceConfig::new(
        workspace
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_else(|| {
                root.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("workspace")
            }),
        root.to_path_buf(),
    );

    if let Some(engine) = workspace.get("default_engine").and_then(Value::as_str) {
        config.default_engine = EngineId::new(engine);
    }
    if let Some(transport) = workspace.get("default_transport").and_then(Value::as_str) {
        config.default_transport = transport.to_string();
    }
    if let Some(dir) = workspace.get("worktrees_dir").and_then(Value::as_str) {
        config.worktrees_dir = dir.to_string();
    }
    config.worktree_base = workspace
        .get("worktree_base")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(window) = workspace
        .get("message_batch_window_ms")
        .and_then(Value::as_integer)
    {
        config.message_batch_window_ms = window.max(0) as u64;
    }
    if let Some(final_notify) = workspace.get("final_notify").and_then(Value::as_bool) {
        config.final_notify = final_notify;
    }

    if let Some(folders) = table.get("folders").and_then(Value::as_table) {
        for (name, value) in folders {
            let folder = value.as_table().ok_or_else(|| ConfigError::Invalid {
                section: format!("folders.{name}"),
                path: path.to_path_buf(),
                message: "expected a table".to_string(),
            })?;
            config.folders.insert(
                name.clone(),
                FolderConfig {
                    name: name.clone(),
                    path: folder
                        .get("path")
                        .and_then(Value::as_str)
                        .unwrap_or(name)
                        .to_string(),
                    channels: folder
                        .get("channels")
                        .and_then(Value::as_array)
                        .map(|entries| {
                            entries.iter().filter_map(Value::as_integer).collect()
                        })
                        .unwrap_or_default(),
                    topic_id: folder.get("topic_id").and_then(Value::as_integer),
                    description: folder
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    origin: folder
                        .get("origin")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    pending_topic: folder
                        .get("pending_topic")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                },
            );
        }
    }

    if let Some(ralph) = table
        .get("workers")
        .and_then(Value::as_table)
        .and_then(|w| w.get("ralph"))
        .and_then(Value::as_table)
    {
        config.ralph = RalphConfig {
            enabled: ralph.get("enabled").and_then(Value::as_bool).unwrap_or(false),
            default_max_iterations: ralph
                .get("default_max_iterations")
                .and_then(Value::as_integer)
                .map(|n| n.max(1) as u32)
                .unwrap_or(3),
        };
    }

    for (section, target) in [("transports", 0usize), ("engines", 1), ("plugins", 2)] {
        if let Some(tables) = table.get(section).and_then(Value::as_table) {
            for (id, value) in tables {
                let Some(inner) = value.as_table() else {
                    return Err(ConfigError::Invalid {
                        section: format!("{section}.{id}"),
                        path: path.to_path_buf(),
                        message: "expected a table".to_string(),
                    });
                };
                let map = match target {
                    0 => &mut config.transports,
                    1 => &mut config.engines,
                    _ => &mut config.plugin_configs,
                };
                map.insert(id.clone(), inner.clone());
            }
        }
    }

    // Legacy: a bare top-level [telegram] (or other transport) table
    for (key, value) in table {
        if KNOWN_TOP_LEVEL_KEYS.contains(&key.as_str()) {
            continue;
        }
        match value.as_table() {
            Some(inner) => {
                config.plugin_configs.insert(key.clone(), inner.clone());
            }
            None => {
                tracing::warn!(key, path = %path.display(), "unknown top-level field ignored");
            }
        }
    }

    Ok(config)
}

/// Save the workspace config to `<root>/.relay/workspace.toml`.
pub fn save_workspace_config(config: &WorkspaceConfig) -> Result<(), ConfigError> {
    let dir = config.root.join(WORKSPACE_CONFIG_DIR);
    std::fs::create_dir_all(&dir).map_err(|source| {
        ConfigError::Store(StoreError::Write {
            path: dir.clone(),
            source,
        })
    })?;

    let mut workspace = Table::new();
    workspace.insert("name".into(), Value::String(config.name.clone()));
    workspace.insert(
        "default_engine".into(),
        Value::String(config.default_engine.to_string()),
    );
    workspace.insert(
        "default_transport".into(),
        Value::String(config.default_transport.clone()),
    );
    if config.worktrees_dir != DEFAULT_WORKTREES_DIR {
        workspace.insert(
            "worktrees_dir".into(),
            Value::String(config.worktrees_dir.clone()),
        );
    }
    if let Some(base) = &config.worktree_base {
        workspace.insert("worktree_base".into(), Value::String(base.clone()));
    }
    if config.message_batch_window_ms != DEFAULT_BATCH_WINDOW_MS {
        workspace.insert(
            "message_batch_window_ms".into(),
            Value::Integer(config.message_batch_window_ms as i64),
        );
    }
    if config.final_notify {
        workspace.insert("final_notify".into(), Value::Boolean(true));
    }

    let mut document = Table::new();
    document.insert("workspace".into(), Value::Table(workspace));

    if !config.transports.is_empty() {
        let mut transports = Table::new();
        for (id, inner) in &config.transports {
            transports.insert(id.clone(), Value::Table(inner.clone()));
        }
        document.insert("transports".into(), Value::Table(transports));
    }

    if !config.engines.is_empty() {
        let mut engines = Table::new();
        for (id, inner) in &config.engines {
            engines.insert(id.clone(), Value::Table(inner.clone()));
        }
        document.insert("engines".into(), Value::Table(engines));
    }

    for (id, inner) in &config.plugin_configs {
        document.insert(id.clone(), Value::Table(inner.clone()));
    }

    if !config.folders.is_empty() {
        let mut folders = Table::new();
        for (name, folder) in &config.folders {
            let mut entry = Table::new();
            entry.insert("path".into(), Value::String(folder.path.clone()));
            if !folder.channels.is_empty() {
                entry.insert(
                    "channels".into(),
                    Value::Array(folder.channels.iter().map(|id| Value::Integer(*id)).collect()),
                );
            }
            if let Some(topic_id) = folder.topic_id {
                entry.insert("topic_id".into(), Value::Integer(topic_id));
            }
            if let Some(description) = &folder.description {
                entry.insert("description".into(), Value::String(description.clone()));
            }
            if let Some(origin) = &folder.origin {
                entry.insert("origin".into(), Value::String(origin.clone()));
            }
            if folder.pending_topic {
                entry.insert("pending_topic".into(), Value::Boolean(true));
            }
            folders.insert(name.clone(), Value::Table(entry));
        }
        document.insert("folders".into(), Value::Table(folders));
    }

    let mut ralph = Table::new();
    ralph.insert("enabled".into(), Value::Boolean(config.ralph.enabled));
    ralph.insert(
        "default_max_iterations".into(),
        Value::Integer(config.ralph.default_max_iterations as i64),
    );
    let mut workers = Table::new();
    workers.insert("ralph".into(), Value::Table(ralph));
    document.insert("workers".into(), Value::Table(workers));

    crate::store::write_raw_toml(&document, &config.config_path())?;
    tracing::info!(path = %config.config_path().display(), "workspace config saved");
    Ok(())
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
