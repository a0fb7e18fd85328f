// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw TOML document storage with backup support
//!
//! Migrations operate on raw documents so keys this build doesn't know about
//! survive a rewrite.

use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::Table;

/// Errors from raw config storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Read a TOML file as a raw table.
pub fn read_raw_toml(path: &Path) -> Result<Table, StoreError> {
    let text = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    text.parse::<Table>().map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a raw table back as TOML.
pub fn write_raw_toml(table: &Table, path: &Path) -> Result<(), StoreError> {
    let text = toml::to_string(table)?;
    std::fs::write(path, text).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy the config aside as `<path>.bak` before a migration rewrites it.
///
/// Returns the backup path, or `None` when the source doesn't exist.
pub fn backup_config(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }
    let backup = path.with_extension("toml.bak");
    match std::fs::copy(path, &backup) {
        Ok(_) => Some(backup),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "config backup failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
