// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine and plugin identifiers
//!
//! Plugin IDs appear in the CLI and in chat commands, so they are restricted
//! to a conservative pattern and must not shadow built-in command names.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a plugin ID.
pub const MAX_ID_LEN: usize = 32;

/// IDs that engine plugins may not claim (core chat + CLI commands).
pub const RESERVED_ENGINE_IDS: &[&str] = &["cancel", "help", "init", "plugins", "info", "setup"];

/// IDs that command plugins may not claim (built-in workspace commands).
pub const RESERVED_COMMAND_IDS: &[&str] = &[
    "cancel", "help", "clone", "create", "add", "list", "remove", "status", "engine", "ralph",
];

/// IDs that transport plugins may not claim. Currently none.
pub const RESERVED_TRANSPORT_IDS: &[&str] = &[];

/// Kind of plugin an ID belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Engine,
    Transport,
    Command,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Engine => "engine",
            PluginKind::Transport => "transport",
            PluginKind::Command => "command",
        }
    }

    /// Reserved IDs for this plugin kind.
    pub fn reserved_ids(&self) -> &'static [&'static str] {
        match self {
            PluginKind::Engine => RESERVED_ENGINE_IDS,
            PluginKind::Transport => RESERVED_TRANSPORT_IDS,
            PluginKind::Command => RESERVED_COMMAND_IDS,
        }
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from plugin ID validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid {kind} id {id:?}: must be 1-{MAX_ID_LEN} lowercase alphanumeric or underscore characters")]
    InvalidPattern { kind: PluginKind, id: String },
    #[error("reserved {kind} id {id:?}: conflicts with a built-in")]
    Reserved { kind: PluginKind, id: String },
}

/// Check whether an ID matches the plugin ID pattern `^[a-z0-9_]{1,32}$`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_'))
}

/// Validate a plugin ID against the pattern and the kind's reserved set.
pub fn validate_plugin_id(id: &str, kind: PluginKind) -> Result<(), IdError> {
    if !is_valid_id(id) {
        return Err(IdError::InvalidPattern {
            kind,
            id: id.to_string(),
        });
    }
    if kind.reserved_ids().contains(&id) {
        return Err(IdError::Reserved {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Opaque identifier for an engine backend.
///
/// Interned at plugin load and never renamed. `new()` accepts any string
/// (tests and internal wiring use arbitrary names); `parse()` enforces the
/// plugin ID pattern and is what the registry uses at load time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineId(pub String);

impl EngineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Construct a validated engine ID.
    pub fn parse(id: &str) -> Result<Self, IdError> {
        validate_plugin_id(id, PluginKind::Engine)?;
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EngineId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EngineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for EngineId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for EngineId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::borrow::Borrow<str> for EngineId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
