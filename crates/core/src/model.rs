// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resume tokens, actions, and shared event vocabulary

use crate::id::EngineId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque session handle produced by an engine.
///
/// The `value` is engine-defined (a session UUID, a thread ID, a log path).
/// Once a token exists for a conversation, every later turn in that
/// conversation must carry the same `(engine, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResumeToken {
    pub engine: EngineId,
    pub value: String,
}

impl ResumeToken {
    pub fn new(engine: impl Into<EngineId>, value: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            value: value.into(),
        }
    }
}

/// What kind of step an action represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tool,
    Command,
    FileChange,
    WebSearch,
    Turn,
    Warning,
    Todo,
    /// Forward-compatible catch-all for kinds this build doesn't know
    #[serde(other)]
    Other,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Tool => "tool",
            ActionKind::Command => "command",
            ActionKind::FileChange => "file_change",
            ActionKind::WebSearch => "web_search",
            ActionKind::Turn => "turn",
            ActionKind::Warning => "warning",
            ActionKind::Todo => "todo",
            ActionKind::Other => "other",
        }
    }
}

/// One step an engine reports (e.g. "ran `ls -la`", "edited `src/foo.rs`")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub kind: ActionKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub detail: HashMap<String, serde_json::Value>,
}

impl Action {
    pub fn new(id: impl Into<String>, kind: ActionKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            detail: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, detail: HashMap<String, serde_json::Value>) -> Self {
        self.detail = detail;
        self
    }
}

/// Phase of an action within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    Started,
    Updated,
    Completed,
}

impl ActionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionPhase::Started => "started",
            ActionPhase::Updated => "updated",
            ActionPhase::Completed => "completed",
        }
    }
}

/// Severity attached to warning/note actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteLevel {
    Info,
    Warning,
    Error,
}

/// Token accounting reported by an engine on completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
