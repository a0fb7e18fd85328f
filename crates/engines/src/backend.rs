// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine backends: build runners from workspace config
//!
//! A backend pairs an engine ID with a runner factory and the CLI it needs
//! on PATH. Backends are what the plugin registry stores; runners are built
//! lazily per process start.

use crate::claude::ClaudeDialect;
use crate::codex::CodexDialect;
use crate::jsonl::JsonlRunner;
use crate::runner::Runner;
use relay_core::EngineId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use toml::Table;

/// Errors from backend configuration
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid `{key}` in [engines.{engine}] of {path}: {message}")]
    InvalidConfig {
        engine: EngineId,
        key: String,
        path: PathBuf,
        message: String,
    },
}

type RunnerBuilder =
    Box<dyn Fn(&Table, &Path) -> Result<Arc<dyn Runner>, BackendError> + Send + Sync>;

/// A loadable engine backend
pub struct EngineBackend {
    pub id: EngineId,
    /// CLI the engine needs on PATH, for availability checks
    pub cli_cmd: Option<String>,
    /// How to install the CLI, shown in unavailability errors
    pub install_cmd: Option<String>,
    builder: RunnerBuilder,
}

impl EngineBackend {
    pub fn new(id: EngineId, builder: RunnerBuilder) -> Self {
        Self {
            id,
            cli_cmd: None,
            install_cmd: None,
            builder,
        }
    }

    pub fn with_cli(mut self, cli_cmd: &str, install_cmd: Option<&str>) -> Self {
        self.cli_cmd = Some(cli_cmd.to_string());
        self.install_cmd = install_cmd.map(str::to_string);
        self
    }

    /// Build a runner from this engine's config table.
    pub fn build_runner(
        &self,
        config: &Table,
        config_path: &Path,
    ) -> Result<Arc<dyn Runner>, BackendError> {
        (self.builder)(config, config_path)
    }

    /// Check whether the backing CLI is on PATH. `None` means available.
    pub fn availability_issue(&self, config: &Table) -> Option<String> {
        let cmd = config
            .get("cmd")
            .and_then(toml::Value::as_str)
            .map(str::to_string)
            .or_else(|| self.cli_cmd.clone())?;
        match cli_available(&cmd) {
            Ok(()) => None,
            Err(issue) => {
                let mut message = issue;
                if let Some(install) = &self.install_cmd {
                    message.push_str(&format!(" (install with `{install}`)"));
                }
                Some(message)
            }
        }
    }
}

impl std::fmt::Debug for EngineBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBackend")
            .field("id", &self.id)
            .field("cli_cmd", &self.cli_cmd)
            .finish()
    }
}

/// Look up an executable on PATH.
pub fn cli_available(cmd: &str) -> Result<(), String> {
    let path = Path::new(cmd);
    if path.is_absolute() {
        if path.is_file() {
            return Ok(());
        }
        return Err(format!("{cmd} not found"));
    }
    let Some(paths) = std::env::var_os("PATH") else {
        return Err("PATH is not set".to_string());
    };
    for dir in std::env::split_paths(&paths) {
        if dir.join(cmd).is_file() {
            return Ok(());
        }
    }
    Err(format!("{cmd} not found on PATH"))
}

fn string_list(
    config: &Table,
    engine: &EngineId,
    key: &str,
    config_path: &Path,
) -> Result<Option<Vec<String>>, BackendError> {
    let Some(value) = config.get(key) else {
        return Ok(None);
    };
    let invalid = || BackendError::InvalidConfig {
        engine: engine.clone(),
        key: key.to_string(),
        path: config_path.to_path_buf(),
        message: "expected a list of strings".to_string(),
    };
    let entries = value.as_array().ok_or_else(invalid)?;
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        out.push(entry.as_str().ok_or_else(invalid)?.to_string());
    }
    Ok(Some(out))
}

fn string_field(
    config: &Table,
    engine: &EngineId,
    key: &str,
    config_path: &Path,
) -> Result<Option<String>, BackendError> {
    let Some(value) = config.get(key) else {
        return Ok(None);
    };
    value
        .as_str()
        .map(str::to_string)
        .map(Some)
        .ok_or_else(|| BackendError::InvalidConfig {
            engine: engine.clone(),
            key: key.to_string(),
            path: config_path.to_path_buf(),
            message: "expected a string".to_string(),
        })
}

/// The claude backend: `claude -p --output-format stream-json`.
pub fn claude_backend() -> EngineBackend {
    let id = EngineId::new(crate::claude::ENGINE);
    let engine = id.clone();
    EngineBackend::new(
        id,
        Box::new(move |config, config_path| {
            let cmd = string_field(config, &engine, "cmd", config_path)?
                .unwrap_or_else(|| "claude".to_string());
            let extra_args =
                string_list(config, &engine, "extra_args", config_path)?.unwrap_or_default();
            let title = string_field(config, &engine, "title", config_path)?
                .unwrap_or_else(|| "Claude".to_string());
            Ok(Arc::new(JsonlRunner::new(ClaudeDialect::new(
                cmd, extra_args, title,
            ))) as Arc<dyn Runner>)
        }),
    )
    .with_cli("claude", Some("npm install -g @anthropic-ai/claude-code"))
}

/// The codex backend: `codex exec --json`.
pub fn codex_backend() -> EngineBackend {
    let id = EngineId::new(crate::codex::ENGINE);
    let engine = id.clone();
    EngineBackend::new(
        id,
        Box::new(move |config, config_path| {
            let cmd = string_field(config, &engine, "cmd", config_path)?
                .unwrap_or_else(|| "codex".to_string());
            let profile = string_field(config, &engine, "profile", config_path)?;
            let mut extra_args = string_list(config, &engine, "extra_args", config_path)?
                .unwrap_or_else(|| vec!["-c".to_string(), "notify=[]".to_string()]);
            let title = match &profile {
                Some(profile) => {
                    extra_args.push("--profile".to_string());
                    extra_args.push(profile.clone());
                    profile.clone()
                }
                None => string_field(config, &engine, "title", config_path)?
                    .unwrap_or_else(|| "Codex".to_string()),
            };
            Ok(Arc::new(JsonlRunner::new(CodexDialect::new(
                cmd, extra_args, title,
            ))) as Arc<dyn Runner>)
        }),
    )
    .with_cli("codex", Some("npm install -g @openai/codex"))
}

/// All engine backends shipped with this build.
pub fn builtin_engine_backends() -> Vec<EngineBackend> {
    vec![claude_backend(), codex_backend()]
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
