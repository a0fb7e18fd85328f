// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude Code engine adapter
//!
//! Drives `claude -p --output-format stream-json --verbose`. The stream
//! interleaves `system`, `assistant`, `user`, and `result` records; tool_use
//! blocks open actions that the matching tool_result closes.

use crate::jsonl::{EngineDialect, TranslateError};
use relay_core::{
    Action, ActionKind, ActionPhase, EngineEvent, EngineId, NoteLevel, ResumeToken, Usage,
};
use serde::Deserialize;
use std::collections::HashMap;

pub const ENGINE: &str = "claude";

const MAX_TITLE_LEN: usize = 80;

fn truncate_title(text: &str) -> String {
    let text = text.trim().replace('\n', " ");
    if text.chars().count() <= MAX_TITLE_LEN {
        return text;
    }
    let mut truncated: String = text.chars().take(MAX_TITLE_LEN - 1).collect();
    truncated.push('…');
    truncated
}

/// Map a Claude tool name and input to an action kind and title.
fn describe_tool(name: &str, input: &serde_json::Value) -> (ActionKind, String) {
    let str_field = |key: &str| {
        input
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(truncate_title)
    };
    match name {
        "Bash" => (
            ActionKind::Command,
            str_field("command").unwrap_or_else(|| "shell".to_string()),
        ),
        "Edit" | "Write" | "NotebookEdit" => (
            ActionKind::FileChange,
            str_field("file_path").unwrap_or_else(|| "files".to_string()),
        ),
        "Read" | "Glob" | "Grep" => (
            ActionKind::Tool,
            str_field("file_path")
                .or_else(|| str_field("pattern"))
                .map(|detail| format!("{name} {detail}"))
                .unwrap_or_else(|| name.to_string()),
        ),
        "WebSearch" | "WebFetch" => (
            ActionKind::WebSearch,
            str_field("query")
                .or_else(|| str_field("url"))
                .unwrap_or_else(|| name.to_string()),
        ),
        "TodoWrite" => (ActionKind::Todo, "todo list".to_string()),
        _ => (ActionKind::Tool, name.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ToolUseBlock {
    id: String,
    name: String,
    #[serde(default)]
    input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ToolResultBlock {
    tool_use_id: String,
    #[serde(default)]
    is_error: bool,
}

/// Per-run translation state
pub struct ClaudeRunState {
    /// Open tool actions by tool_use id, so results can close them
    open_tools: HashMap<String, (ActionKind, String)>,
    session: Option<String>,
}

/// Claude Code dialect configuration
#[derive(Debug)]
pub struct ClaudeDialect {
    engine: EngineId,
    pub claude_cmd: String,
    pub extra_args: Vec<String>,
    pub session_title: String,
}

impl ClaudeDialect {
    pub fn new(claude_cmd: String, extra_args: Vec<String>, session_title: String) -> Self {
        Self {
            engine: EngineId::new(ENGINE),
            claude_cmd,
            extra_args,
            session_title,
        }
    }
}

impl Default for ClaudeDialect {
    fn default() -> Self {
        Self::new(ENGINE.to_string(), Vec::new(), "Claude".to_string())
    }
}

impl EngineDialect for ClaudeDialect {
    type State = ClaudeRunState;

    fn engine(&self) -> &EngineId {
        &self.engine
    }

    fn title(&self) -> &str {
        &self.session_title
    }

    fn command(&self) -> &str {
        &self.claude_cmd
    }

    fn new_state(&self, _prompt: &str, resume: Option<&ResumeToken>) -> Self::State {
        ClaudeRunState {
            open_tools: HashMap::new(),
            session: resume.map(|token| token.value.clone()),
        }
    }

    fn build_args(
        &self,
        _prompt: &str,
        resume: Option<&ResumeToken>,
        _state: &Self::State,
    ) -> Vec<String> {
        let mut args: Vec<String> = self.extra_args.clone();
        args.extend(
            ["-p", "--output-format", "stream-json", "--verbose"]
                .iter()
                .map(|s| s.to_string()),
        );
        if let Some(resume) = resume {
            args.push("--resume".to_string());
            args.push(resume.value.clone());
        }
        args
    }

    fn translate(
        &self,
        value: serde_json::Value,
        state: &mut Self::State,
    ) -> Result<Vec<EngineEvent>, TranslateError> {
        let engine = self.engine.clone();
        let type_tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        match type_tag {
            "system" => {
                let subtype = value.get("subtype").and_then(serde_json::Value::as_str);
                if subtype != Some("init") {
                    return Ok(vec![]);
                }
                let session_id = value
                    .get("session_id")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| TranslateError::new("system/init without session_id"))?;
                state.session = Some(session_id.to_string());
                let mut meta = HashMap::new();
                if let Some(model) = value.get("model").and_then(serde_json::Value::as_str) {
                    meta.insert(
                        "model".to_string(),
                        serde_json::Value::String(model.to_string()),
                    );
                }
                Ok(vec![EngineEvent::Started {
                    engine: engine.clone(),
                    resume: ResumeToken::new(engine, session_id),
                    title: self.session_title.clone(),
                    meta: if meta.is_empty() { None } else { Some(meta) },
                }])
            }
            "assistant" => {
                let blocks = value
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(serde_json::Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let mut events = Vec::new();
                for block in blocks {
                    if block.get("type").and_then(serde_json::Value::as_str) != Some("tool_use") {
                        continue;
                    }
                    let tool: ToolUseBlock = serde_json::from_value(block)
                        .map_err(|err| TranslateError::new(format!("bad tool_use block: {err}")))?;
                    let (kind, title) = describe_tool(&tool.name, &tool.input);
                    state
                        .open_tools
                        .insert(tool.id.clone(), (kind, title.clone()));
                    events.push(EngineEvent::Action {
                        engine: engine.clone(),
                        action: Action::new(tool.id, kind, title),
                        phase: ActionPhase::Started,
                        ok: None,
                        message: None,
                        level: None,
                    });
                }
                Ok(events)
            }
            "user" => {
                let blocks = value
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(serde_json::Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let mut events = Vec::new();
                for block in blocks {
                    if block.get("type").and_then(serde_json::Value::as_str) != Some("tool_result")
                    {
                        continue;
                    }
                    let result: ToolResultBlock = serde_json::from_value(block).map_err(|err| {
                        TranslateError::new(format!("bad tool_result block: {err}"))
                    })?;
                    let Some((kind, title)) = state.open_tools.remove(&result.tool_use_id) else {
                        continue;
                    };
                    events.push(EngineEvent::Action {
                        engine: engine.clone(),
                        action: Action::new(result.tool_use_id, kind, title),
                        phase: ActionPhase::Completed,
                        ok: Some(!result.is_error),
                        message: None,
                        level: result.is_error.then_some(NoteLevel::Error),
                    });
                }
                Ok(events)
            }
            "result" => {
                let is_error = value
                    .get("is_error")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                let answer = value
                    .get("result")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let session = value
                    .get("session_id")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .or_else(|| state.session.clone());
                let usage = value
                    .get("usage")
                    .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());
                let error = value
                    .get("subtype")
                    .and_then(serde_json::Value::as_str)
                    .filter(|subtype| is_error && *subtype != "success")
                    .map(|subtype| subtype.replace('_', " "));
                Ok(vec![EngineEvent::Completed {
                    engine: engine.clone(),
                    ok: !is_error,
                    answer,
                    resume: session.map(|value| ResumeToken::new(engine, value)),
                    error,
                    usage,
                }])
            }
            _ => Ok(vec![]),
        }
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
