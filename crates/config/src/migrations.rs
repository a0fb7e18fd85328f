// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config migrations
//!
//! Each migration transforms the raw TOML document and reports whether it
//! changed anything. Migrations run in order, are idempotent, and the file
//! is backed up once before the first rewrite.

use crate::store::{backup_config, read_raw_toml, write_raw_toml, StoreError};
use std::path::Path;
use toml::{Table, Value};

/// Apply all migrations to a raw config document.
///
/// Returns the names of the migrations that changed the document.
pub fn migrate_config(config: &mut Table) -> Vec<&'static str> {
    let mut applied = Vec::new();
    if migrate_repos_to_folders(config) {
        applied.push("repos-to-folders");
    }
    if migrate_legacy_telegram(config) {
        applied.push("legacy-telegram");
    }
    applied
}

/// Load a config file, apply migrations, and save it back if anything
/// changed. A backup is written before the rewrite; an already-migrated file
/// is left untouched.
pub fn migrate_config_file(path: &Path) -> Result<Vec<&'static str>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut config = read_raw_toml(path)?;
    let applied = migrate_config(&mut config);
    if applied.is_empty() {
        return Ok(applied);
    }

    if let Some(backup) = backup_config(path) {
        tracing::info!(path = %path.display(), backup = %backup.display(), "config backup created");
    }
    write_raw_toml(&config, path)?;
    for migration in &applied {
        tracing::info!(migration, path = %path.display(), "config migrated");
    }
    Ok(applied)
}

/// `[repos.*]` → `[folders.*]`: the section was renamed when non-git
/// directories became first-class.
fn migrate_repos_to_folders(config: &mut Table) -> bool {
    let Some(repos) = config.remove("repos") else {
        return false;
    };
    // If folders already exists, the old section is simply dropped.
    if !config.contains_key("folders") {
        config.insert("folders".to_string(), repos);
    }
    true
}

/// `[workspace].bot_token` / `[workspace].telegram_group_id` →
/// `[telegram].bot_token` / `[telegram].chat_id`.
fn migrate_legacy_telegram(config: &mut Table) -> bool {
    let Some(workspace) = config.get_mut("workspace").and_then(Value::as_table_mut) else {
        return false;
    };
    let has_token = workspace.contains_key("bot_token");
    let has_group = workspace.contains_key("telegram_group_id");
    if !has_token && !has_group {
        return false;
    }

    let bot_token = workspace.remove("bot_token");
    let group_id = workspace.remove("telegram_group_id");

    let telegram = config
        .entry("telegram")
        .or_insert_with(|| Value::Table(Table::new()));
    let Some(telegram) = telegram.as_table_mut() else {
        return true;
    };
    if let Some(token) = bot_token {
        telegram.entry("bot_token").or_insert(token);
    }
    if let Some(group) = group_id {
        telegram.entry("chat_id").or_insert(group);
    }
    true
}

#[cfg(test)]
#[path = "migrations_tests.rs"]
mod tests;
