// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runner → core event algebra
//!
//! Engines emit a normalized stream of events per run: exactly one `Started`
//! before anything else that needs a session, any number of `Action` events,
//! and a terminal `Completed`. Serializes with `{"type": "...", ...fields}`.

use crate::id::EngineId;
use crate::model::{Action, ActionKind, ActionPhase, NoteLevel, ResumeToken, Usage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Events produced by a runner while driving an engine subprocess
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Engine acknowledged the run and produced a session handle
    Started {
        engine: EngineId,
        resume: ResumeToken,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<HashMap<String, serde_json::Value>>,
    },

    /// One step of progress, keyed by a run-stable action ID
    Action {
        engine: EngineId,
        action: Action,
        phase: ActionPhase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ok: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<NoteLevel>,
    },

    /// Terminal event for the run
    Completed {
        engine: EngineId,
        ok: bool,
        answer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resume: Option<ResumeToken>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::Started { .. } => "started",
            EngineEvent::Action { .. } => "action",
            EngineEvent::Completed { .. } => "completed",
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            EngineEvent::Started { engine, resume, .. } => {
                format!("{t} engine={engine} session={}", resume.value)
            }
            EngineEvent::Action {
                engine,
                action,
                phase,
                ..
            } => format!(
                "{t} engine={engine} id={} kind={} phase={}",
                action.id,
                action.kind.as_str(),
                phase.as_str()
            ),
            EngineEvent::Completed { engine, ok, .. } => {
                format!("{t} engine={engine} ok={ok}")
            }
        }
    }
}

/// Errors from event construction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("resume token is for engine {token_engine}, not {engine}")]
    WrongEngine {
        engine: EngineId,
        token_engine: EngineId,
    },
    #[error("resume token mismatch: session {existing} already started, got {actual}")]
    SessionDrift { existing: String, actual: String },
}

/// Per-run event constructor.
///
/// Remembers the session produced by `started()` so later events stay
/// consistent; a second `Started` for a different session is an error.
#[derive(Debug, Clone)]
pub struct EventFactory {
    pub engine: EngineId,
    pub resume: Option<ResumeToken>,
}

impl EventFactory {
    pub fn new(engine: EngineId) -> Self {
        Self {
            engine,
            resume: None,
        }
    }

    /// Build the `Started` event and record the session token.
    pub fn started(
        &mut self,
        resume: ResumeToken,
        title: impl Into<String>,
        meta: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<EngineEvent, EventError> {
        if resume.engine != self.engine {
            return Err(EventError::WrongEngine {
                engine: self.engine.clone(),
                token_engine: resume.engine,
            });
        }
        if let Some(existing) = &self.resume {
            if existing.value != resume.value {
                return Err(EventError::SessionDrift {
                    existing: existing.value.clone(),
                    actual: resume.value,
                });
            }
        }
        self.resume = Some(resume.clone());
        Ok(EngineEvent::Started {
            engine: self.engine.clone(),
            resume,
            title: title.into(),
            meta,
        })
    }

    pub fn action(
        &self,
        phase: ActionPhase,
        action_id: impl Into<String>,
        kind: ActionKind,
        title: impl Into<String>,
        detail: HashMap<String, serde_json::Value>,
    ) -> EngineEvent {
        EngineEvent::Action {
            engine: self.engine.clone(),
            action: Action::new(action_id, kind, title).with_detail(detail),
            phase,
            ok: None,
            message: None,
            level: None,
        }
    }

    pub fn action_started(
        &self,
        action_id: impl Into<String>,
        kind: ActionKind,
        title: impl Into<String>,
        detail: HashMap<String, serde_json::Value>,
    ) -> EngineEvent {
        self.action(ActionPhase::Started, action_id, kind, title, detail)
    }

    pub fn action_updated(
        &self,
        action_id: impl Into<String>,
        kind: ActionKind,
        title: impl Into<String>,
        detail: HashMap<String, serde_json::Value>,
    ) -> EngineEvent {
        self.action(ActionPhase::Updated, action_id, kind, title, detail)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn action_completed(
        &self,
        action_id: impl Into<String>,
        kind: ActionKind,
        title: impl Into<String>,
        detail: HashMap<String, serde_json::Value>,
        ok: Option<bool>,
        message: Option<String>,
        level: Option<NoteLevel>,
    ) -> EngineEvent {
        EngineEvent::Action {
            engine: self.engine.clone(),
            action: Action::new(action_id, kind, title).with_detail(detail),
            phase: ActionPhase::Completed,
            ok,
            message,
            level,
        }
    }

    /// Build the terminal event. Falls back to the recorded session token
    /// when no explicit one is given.
    pub fn completed(
        &self,
        ok: bool,
        answer: impl Into<String>,
        resume: Option<ResumeToken>,
        error: Option<String>,
        usage: Option<Usage>,
    ) -> EngineEvent {
        EngineEvent::Completed {
            engine: self.engine.clone(),
            ok,
            answer: answer.into(),
            resume: resume.or_else(|| self.resume.clone()),
            error,
            usage,
        }
    }

    pub fn completed_ok(&self, answer: impl Into<String>) -> EngineEvent {
        self.completed(true, answer, None, None, None)
    }

    pub fn completed_error(&self, error: impl Into<String>, answer: impl Into<String>) -> EngineEvent {
        self.completed(false, answer, None, Some(error.into()), None)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
