// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex engine adapter
//!
//! Drives `codex exec --json`. Codex reports a thread ID up front, then a
//! stream of typed items (commands, file changes, todo lists, messages); the
//! final agent message is the answer and `turn.completed` closes the run.

use crate::jsonl::{EngineDialect, TranslateError};
use relay_core::{
    Action, ActionKind, ActionPhase, EngineEvent, EngineId, NoteLevel, ResumeToken, Usage,
};
use serde::Deserialize;
use std::collections::HashMap;

pub const ENGINE: &str = "codex";

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

#[derive(Debug, Clone, Deserialize)]
pub struct CodexUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodexErrorBody {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileUpdateChange {
    pub path: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoItem {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// Typed item payload inside `item.*` events
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum CodexItem {
    #[serde(rename = "command_execution")]
    CommandExecution {
        id: String,
        #[serde(default)]
        command: String,
        #[serde(default)]
        exit_code: Option<i64>,
        #[serde(default)]
        status: String,
    },
    #[serde(rename = "agent_message")]
    AgentMessage {
        id: String,
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "reasoning")]
    Reasoning { id: String },
    #[serde(rename = "file_change")]
    FileChange {
        id: String,
        #[serde(default)]
        changes: Vec<FileUpdateChange>,
        #[serde(default)]
        status: String,
    },
    #[serde(rename = "todo_list")]
    TodoList {
        id: String,
        #[serde(default)]
        items: Vec<TodoItem>,
    },
    #[serde(rename = "web_search")]
    WebSearch {
        id: String,
        #[serde(default)]
        query: String,
    },
    #[serde(rename = "mcp_tool_call")]
    McpToolCall {
        id: String,
        #[serde(default)]
        server: Option<String>,
        #[serde(default)]
        tool: Option<String>,
        #[serde(default)]
        status: String,
    },
}

/// Top-level Codex stream event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum CodexEvent {
    #[serde(rename = "thread.started")]
    ThreadStarted { thread_id: String },
    #[serde(rename = "turn.started")]
    TurnStarted,
    #[serde(rename = "turn.completed")]
    TurnCompleted {
        #[serde(default)]
        usage: Option<CodexUsage>,
    },
    #[serde(rename = "turn.failed")]
    TurnFailed { error: CodexErrorBody },
    #[serde(rename = "error")]
    StreamError {
        #[serde(default)]
        message: String,
    },
    #[serde(rename = "item.started")]
    ItemStarted { item: CodexItem },
    #[serde(rename = "item.updated")]
    ItemUpdated { item: CodexItem },
    #[serde(rename = "item.completed")]
    ItemCompleted { item: CodexItem },
}

/// Parse Codex's "Reconnecting... n/m" transient error message.
pub fn parse_reconnect_message(message: &str) -> Option<(u32, u32)> {
    let rest = message.strip_prefix("Reconnecting...")?.trim();
    let (attempt, total) = rest.split_once('/')?;
    Some((attempt.trim().parse().ok()?, total.trim().parse().ok()?))
}

/// Shorten an MCP server/tool pair for display.
pub fn short_tool_name(server: Option<&str>, tool: Option<&str>) -> String {
    match (server, tool) {
        (Some(server), Some(tool)) => format!("{server}.{tool}"),
        (None, Some(tool)) => tool.to_string(),
        (Some(server), None) => server.to_string(),
        (None, None) => "tool".to_string(),
    }
}

/// Summarize a file_change item's paths for display.
pub fn format_change_summary(changes: &[FileUpdateChange]) -> String {
    if changes.is_empty() {
        return "files".to_string();
    }
    truncate_title(
        &changes
            .iter()
            .map(|change| change.path.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Condensed view of a todo list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoSummary {
    pub done: usize,
    pub total: usize,
    pub next_text: Option<String>,
}

pub fn summarize_todo_list(items: &[TodoItem]) -> TodoSummary {
    TodoSummary {
        done: items.iter().filter(|item| item.completed).count(),
        total: items.len(),
        next_text: items
            .iter()
            .find(|item| !item.completed)
            .map(|item| item.text.clone()),
    }
}

pub fn todo_title(summary: &TodoSummary) -> String {
    match &summary.next_text {
        Some(next) => format!("todo {}/{}: {}", summary.done, summary.total, next),
        None => format!("todo {}/{}: done", summary.done, summary.total),
    }
}

/// Per-run translation state
pub struct CodexRunState {
    /// Last agent message; becomes the answer on turn completion
    answer: String,
    usage: Option<Usage>,
    session: Option<String>,
    note_seq: u64,
}

/// Codex dialect configuration
#[derive(Debug)]
pub struct CodexDialect {
    engine: EngineId,
    pub codex_cmd: String,
    pub extra_args: Vec<String>,
    pub session_title: String,
}

impl CodexDialect {
    pub fn new(codex_cmd: String, extra_args: Vec<String>, session_title: String) -> Self {
        Self {
            engine: EngineId::new(ENGINE),
            codex_cmd,
            extra_args,
            session_title,
        }
    }
}

impl Default for CodexDialect {
    fn default() -> Self {
        Self::new(
            ENGINE.to_string(),
            vec!["-c".to_string(), "notify=[]".to_string()],
            "Codex".to_string(),
        )
    }
}

impl CodexDialect {
    fn item_events(
        &self,
        item: CodexItem,
        phase: ActionPhase,
        state: &mut CodexRunState,
    ) -> Vec<EngineEvent> {
        let engine = self.engine.clone();
        let completed = phase == ActionPhase::Completed;
        let action_event = |action: Action, ok: Option<bool>| EngineEvent::Action {
            engine: engine.clone(),
            action,
            phase,
            ok,
            message: None,
            level: None,
        };
        match item {
            CodexItem::CommandExecution {
                id,
                command,
                exit_code,
                ..
            } => {
                let ok = completed.then(|| exit_code == Some(0));
                vec![action_event(
                    Action::new(id, ActionKind::Command, truncate_title(&command)),
                    ok,
                )]
            }
            CodexItem::AgentMessage { text, .. } => {
                if completed && !text.is_empty() {
                    state.answer = text;
                }
                vec![]
            }
            CodexItem::Reasoning { .. } => vec![],
            CodexItem::FileChange { id, changes, .. } => vec![action_event(
                Action::new(id, ActionKind::FileChange, format_change_summary(&changes)),
                completed.then_some(true),
            )],
            CodexItem::TodoList { id, items } => {
                let summary = summarize_todo_list(&items);
                vec![action_event(
                    Action::new(id, ActionKind::Todo, todo_title(&summary)),
                    completed.then_some(true),
                )]
            }
            CodexItem::WebSearch { id, query } => vec![action_event(
                Action::new(id, ActionKind::WebSearch, truncate_title(&query)),
                completed.then_some(true),
            )],
            CodexItem::McpToolCall {
                id, server, tool, ..
            } => vec![action_event(
                Action::new(
                    id,
                    ActionKind::Tool,
                    short_tool_name(server.as_deref(), tool.as_deref()),
                ),
                completed.then_some(true),
            )],
        }
    }
}

impl EngineDialect for CodexDialect {
    type State = CodexRunState;

    fn engine(&self) -> &EngineId {
        &self.engine
    }

    fn title(&self) -> &str {
        &self.session_title
    }

    fn command(&self) -> &str {
        &self.codex_cmd
    }

    fn new_state(&self, _prompt: &str, resume: Option<&ResumeToken>) -> Self::State {
        CodexRunState {
            answer: String::new(),
            usage: None,
            session: resume.map(|token| token.value.clone()),
            note_seq: 0,
        }
    }

    fn build_args(
        &self,
        _prompt: &str,
        resume: Option<&ResumeToken>,
        _state: &Self::State,
    ) -> Vec<String> {
        let mut args: Vec<String> = self.extra_args.clone();
        args.push("exec".to_string());
        args.push("--json".to_string());
        if let Some(resume) = resume {
            args.push("resume".to_string());
            args.push(resume.value.clone());
        }
        args.push("-".to_string());
        args
    }

    fn translate(
        &self,
        value: serde_json::Value,
        state: &mut Self::State,
    ) -> Result<Vec<EngineEvent>, TranslateError> {
        let engine = self.engine.clone();
        let event: CodexEvent = serde_json::from_value(value)
            .map_err(|err| TranslateError::new(format!("unrecognized codex event: {err}")))?;
        match event {
            CodexEvent::ThreadStarted { thread_id } => {
                state.session = Some(thread_id.clone());
                Ok(vec![EngineEvent::Started {
                    engine: engine.clone(),
                    resume: ResumeToken::new(engine, thread_id),
                    title: self.session_title.clone(),
                    meta: None,
                }])
            }
            CodexEvent::TurnStarted => Ok(vec![]),
            CodexEvent::TurnCompleted { usage } => {
                if let Some(usage) = usage {
                    state.usage = Some(Usage {
                        input_tokens: usage.input_tokens,
                        cached_input_tokens: usage.cached_input_tokens,
                        output_tokens: usage.output_tokens,
                    });
                }
                Ok(vec![EngineEvent::Completed {
                    engine: engine.clone(),
                    ok: true,
                    answer: std::mem::take(&mut state.answer),
                    resume: state
                        .session
                        .clone()
                        .map(|value| ResumeToken::new(engine, value)),
                    error: None,
                    usage: state.usage,
                }])
            }
            CodexEvent::TurnFailed { error } => Ok(vec![EngineEvent::Completed {
                engine: engine.clone(),
                ok: false,
                answer: std::mem::take(&mut state.answer),
                resume: state
                    .session
                    .clone()
                    .map(|value| ResumeToken::new(engine, value)),
                error: Some(error.message),
                usage: state.usage,
            }]),
            CodexEvent::StreamError { message } => {
                state.note_seq += 1;
                let title = match parse_reconnect_message(&message) {
                    Some((attempt, total)) => format!("reconnecting {attempt}/{total}"),
                    None => truncate_title(&message),
                };
                let mut detail = HashMap::new();
                detail.insert("message".to_string(), serde_json::Value::String(message));
                Ok(vec![EngineEvent::Action {
                    engine: engine.clone(),
                    action: Action::new(
                        format!("{engine}.note.{}", state.note_seq),
                        ActionKind::Warning,
                        title,
                    )
                    .with_detail(detail),
                    phase: ActionPhase::Completed,
                    ok: Some(false),
                    message: None,
                    level: Some(NoteLevel::Warning),
                }])
            }
            CodexEvent::ItemStarted { item } => {
                Ok(self.item_events(item, ActionPhase::Started, state))
            }
            CodexEvent::ItemUpdated { item } => {
                Ok(self.item_events(item, ActionPhase::Updated, state))
            }
            CodexEvent::ItemCompleted { item } => {
                Ok(self.item_events(item, ActionPhase::Completed, state))
            }
        }
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
