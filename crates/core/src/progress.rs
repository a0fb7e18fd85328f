// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress tracking for runner execution
//!
//! Reduces the event stream into immutable snapshots the presenter can
//! render. The tracker itself is mutable and owned by one turn; snapshots
//! are cheap clones safe to hand to the edit task.

use crate::event::EngineEvent;
use crate::id::EngineId;
use crate::model::{Action, ActionKind, ActionPhase, ResumeToken};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// State of a single action within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionState {
    pub action: Action,
    pub phase: ActionPhase,
    pub ok: Option<bool>,
    /// Phase to render: a repeated `started` on an open action displays as
    /// `updated` so the UI doesn't claim the same step began twice.
    pub display_phase: ActionPhase,
    pub completed: bool,
    pub first_seen: u64,
    pub last_update: u64,
}

/// Immutable snapshot of run progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub engine: EngineId,
    pub action_count: usize,
    /// Actions ordered by `first_seen`
    pub actions: Vec<ActionState>,
    pub resume: Option<ResumeToken>,
    pub resume_line: Option<String>,
}

/// Reduces engine events into progress snapshots
#[derive(Debug)]
pub struct ProgressTracker {
    pub engine: EngineId,
    pub resume: Option<ResumeToken>,
    pub action_count: usize,
    actions: HashMap<String, ActionState>,
    seq: u64,
}

impl ProgressTracker {
    pub fn new(engine: EngineId) -> Self {
        Self {
            engine,
            resume: None,
            action_count: 0,
            actions: HashMap::new(),
            seq: 0,
        }
    }

    /// Process an event. Returns true when the event changed visible state.
    pub fn note_event(&mut self, event: &EngineEvent) -> bool {
        match event {
            EngineEvent::Started { resume, .. } => {
                self.resume = Some(resume.clone());
                true
            }
            EngineEvent::Action {
                action, phase, ok, ..
            } => {
                if action.kind == ActionKind::Turn {
                    return false;
                }
                if action.id.is_empty() {
                    return false;
                }
                let completed = *phase == ActionPhase::Completed;
                let existing = self.actions.get(&action.id);
                let has_open = existing.is_some_and(|state| !state.completed);
                let is_update =
                    *phase == ActionPhase::Updated || (*phase == ActionPhase::Started && has_open);
                let display_phase = if is_update && !completed {
                    ActionPhase::Updated
                } else {
                    *phase
                };

                self.seq += 1;
                let seq = self.seq;
                let first_seen = match existing {
                    Some(state) => state.first_seen,
                    None => {
                        self.action_count += 1;
                        seq
                    }
                };
                self.actions.insert(
                    action.id.clone(),
                    ActionState {
                        action: action.clone(),
                        phase: *phase,
                        ok: *ok,
                        display_phase,
                        completed,
                        first_seen,
                        last_update: seq,
                    },
                );
                true
            }
            // Completed does not mutate tracker state; the driver consumes
            // its answer and resume directly.
            EngineEvent::Completed { .. } => false,
        }
    }

    /// Set the resume token if one is given. `None` never clears it.
    pub fn set_resume(&mut self, resume: Option<ResumeToken>) {
        if resume.is_some() {
            self.resume = resume;
        }
    }

    /// Produce an immutable snapshot of current progress.
    pub fn snapshot(
        &self,
        resume_formatter: Option<&dyn Fn(&ResumeToken) -> String>,
    ) -> ProgressState {
        let resume_line = match (&self.resume, resume_formatter) {
            (Some(resume), Some(format)) => Some(format(resume)),
            _ => None,
        };
        let mut actions: Vec<ActionState> = self.actions.values().cloned().collect();
        actions.sort_by_key(|state| state.first_seen);
        ProgressState {
            engine: self.engine.clone(),
            action_count: self.action_count,
            actions,
            resume: self.resume.clone(),
            resume_line,
        }
    }
}

/// Sync the resume token between the tracker and an external source.
///
/// The external token (typically from a `Completed` event) takes precedence;
/// the tracker keeps whichever is resolved.
pub fn sync_resume_token(
    tracker: &mut ProgressTracker,
    resume: Option<ResumeToken>,
) -> Option<ResumeToken> {
    let resolved = resume.or_else(|| tracker.resume.clone());
    tracker.set_resume(resolved.clone());
    resolved
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
