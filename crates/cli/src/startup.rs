// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace startup: config, engines, transport, process lock

use anyhow::{anyhow, bail, Context, Result};
use fs2::FileExt;
use relay_config::{
    find_workspace_root, load_workspace_config, migrate_config_file, WorkspaceConfig,
    WORKSPACE_CONFIG_DIR, WORKSPACE_CONFIG_FILE,
};
use relay_engines::{AutoRouter, RunnerEntry};
use relay_plugins::{plugin_registry, TransportContext};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Discover the workspace, load config (after migrations), build the engine
/// router and transport, and run until shutdown. Returns the exit code.
pub async fn run_workspace() -> Result<i32> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let root = find_workspace_root(&cwd).ok_or_else(|| {
        anyhow!("not in a workspace (no {WORKSPACE_CONFIG_DIR}/{WORKSPACE_CONFIG_FILE} found); run `relay init` first")
    })?;
    let config_path = root.join(WORKSPACE_CONFIG_DIR).join(WORKSPACE_CONFIG_FILE);

    let applied = migrate_config_file(&config_path)?;
    for migration in &applied {
        tracing::info!(migration, "config migrated");
    }
    let workspace = load_workspace_config(&root)?;

    let registry = plugin_registry();
    for error in registry.errors() {
        tracing::warn!(error = %error, "plugin registration failed");
    }

    let engines = build_engine_router(&workspace, &config_path)?;
    for entry in engines.entries() {
        match &entry.issue {
            None => tracing::info!(engine = %entry.engine, "engine ready"),
            Some(issue) => tracing::warn!(engine = %entry.engine, issue = %issue, "engine unavailable"),
        }
    }

    let transport = registry
        .transport(&workspace.default_transport)
        .ok_or_else(|| {
            anyhow!(
                "unknown transport {:?}; registered: {}",
                workspace.default_transport,
                registry.transport_ids().join(", ")
            )
        })?;
    let setup = transport.check_setup(&workspace);
    if !setup.ready {
        bail!("transport {} not ready: {}", transport.id(), setup.message);
    }

    let _lock = acquire_process_lock(&root, transport.lock_token(&workspace))?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
        });
    }

    let startup_msg = format!("relay is online — workspace \"{}\"", workspace.name);
    transport
        .build_and_run(TransportContext {
            workspace,
            engines,
            commands: registry.command_backends(),
            startup_msg: Some(startup_msg),
            progress_edit_every: Duration::from_secs(1),
            shutdown: shutdown.clone(),
        })
        .await?;

    // Ctrl-C exits 130, like an interrupted shell command.
    Ok(if shutdown.is_cancelled() { 130 } else { 0 })
}

/// Build a router entry for every registered engine backend.
pub fn build_engine_router(
    workspace: &WorkspaceConfig,
    config_path: &Path,
) -> Result<Arc<AutoRouter>> {
    let registry = plugin_registry();
    let empty = toml::Table::new();
    let mut entries = Vec::new();
    for backend in registry.engines() {
        let config = workspace
            .engine_config(backend.id.as_str())
            .unwrap_or(&empty);
        let runner = backend
            .build_runner(config, config_path)
            .with_context(|| format!("engine {} failed to configure", backend.id))?;
        let entry = match backend.availability_issue(config) {
            None => RunnerEntry::available(runner),
            Some(issue) => RunnerEntry::unavailable(runner, issue),
        };
        entries.push(entry);
    }
    let router = AutoRouter::new(entries, workspace.default_engine.clone())
        .map_err(|err| anyhow!("engine configuration invalid: {err}"))?;
    Ok(Arc::new(router))
}

/// Hold an exclusive lock so two processes never serve the same bot.
fn acquire_process_lock(root: &Path, token: Option<String>) -> Result<Option<std::fs::File>> {
    let Some(token) = token else {
        return Ok(None);
    };
    let lock_dir = root.join(WORKSPACE_CONFIG_DIR);
    std::fs::create_dir_all(&lock_dir)?;
    let lock_path = lock_dir.join(format!("{}.lock", token.replace([':', '/'], "-")));
    let file = std::fs::File::create(&lock_path)
        .with_context(|| format!("cannot create lock file {}", lock_path.display()))?;
    if file.try_lock_exclusive().is_err() {
        bail!("another relay process is already running for this bot");
    }
    Ok(Some(file))
}
