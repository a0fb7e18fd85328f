// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine selection and resume resolution
//!
//! The router owns one entry per installed engine, in registration order.
//! Resume tokens pick their engine outright; otherwise an explicit override
//! or the workspace default applies. Unavailable engines keep their slot so
//! a stale token produces a real error instead of a silent fallback.

use crate::resume::strip_resume_lines;
use crate::runner::Runner;
use relay_core::{EngineId, ResumeToken};
use std::sync::Arc;
use thiserror::Error;

/// When a prompt is nothing but resume lines, engines still need input.
const EMPTY_PROMPT_FALLBACK: &str = "continue";

/// Errors from router construction
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("router needs at least one runner")]
    Empty,
    #[error("duplicate engine {0}")]
    Duplicate(EngineId),
    #[error("default engine {0} is not configured")]
    UnknownDefault(EngineId),
}

/// An engine that cannot serve the request right now
#[derive(Debug, Error)]
pub enum RunnerUnavailableError {
    #[error("engine {engine} is not configured")]
    NotConfigured { engine: EngineId },
    #[error("engine {engine} unavailable: {issue}")]
    Unavailable { engine: EngineId, issue: String },
}

impl RunnerUnavailableError {
    pub fn engine(&self) -> &EngineId {
        match self {
            RunnerUnavailableError::NotConfigured { engine } => engine,
            RunnerUnavailableError::Unavailable { engine, .. } => engine,
        }
    }
}

/// The router's view of one installed engine
#[derive(Clone, Debug)]
pub struct RunnerEntry {
    pub engine: EngineId,
    pub runner: Arc<dyn Runner>,
    pub available: bool,
    pub issue: Option<String>,
}

impl RunnerEntry {
    pub fn available(runner: Arc<dyn Runner>) -> Self {
        Self {
            engine: runner.engine().clone(),
            runner,
            available: true,
            issue: None,
        }
    }

    pub fn unavailable(runner: Arc<dyn Runner>, issue: impl Into<String>) -> Self {
        Self {
            engine: runner.engine().clone(),
            runner,
            available: false,
            issue: Some(issue.into()),
        }
    }
}

/// Routes prompts and resume tokens to engine entries
pub struct AutoRouter {
    entries: Vec<RunnerEntry>,
    default_engine: EngineId,
    default_index: usize,
}

impl AutoRouter {
    pub fn new(entries: Vec<RunnerEntry>, default_engine: EngineId) -> Result<Self, RouterError> {
        if entries.is_empty() {
            return Err(RouterError::Empty);
        }
        for (index, entry) in entries.iter().enumerate() {
            if entries[..index].iter().any(|e| e.engine == entry.engine) {
                return Err(RouterError::Duplicate(entry.engine.clone()));
            }
        }
        let default_index = entries
            .iter()
            .position(|e| e.engine == default_engine)
            .ok_or_else(|| RouterError::UnknownDefault(default_engine.clone()))?;
        Ok(Self {
            entries,
            default_engine,
            default_index,
        })
    }

    pub fn entries(&self) -> &[RunnerEntry] {
        &self.entries
    }

    pub fn default_engine(&self) -> &EngineId {
        &self.default_engine
    }

    pub fn engine_ids(&self) -> Vec<EngineId> {
        self.entries.iter().map(|e| e.engine.clone()).collect()
    }

    pub fn available_entries(&self) -> Vec<&RunnerEntry> {
        self.entries.iter().filter(|e| e.available).collect()
    }

    pub fn default_entry(&self) -> &RunnerEntry {
        &self.entries[self.default_index]
    }

    /// Entry for an explicit engine override, or the default.
    pub fn entry_for_engine(
        &self,
        engine: Option<&EngineId>,
    ) -> Result<&RunnerEntry, RunnerUnavailableError> {
        let engine = engine.unwrap_or(&self.default_engine);
        self.entries
            .iter()
            .find(|e| &e.engine == engine)
            .ok_or_else(|| RunnerUnavailableError::NotConfigured {
                engine: engine.clone(),
            })
    }

    /// Entry for a resume token's engine, or the default when `None`.
    pub fn entry_for(
        &self,
        resume: Option<&ResumeToken>,
    ) -> Result<&RunnerEntry, RunnerUnavailableError> {
        self.entry_for_engine(resume.map(|token| &token.engine))
    }

    /// A usable runner for the token. Errors when the engine is missing
    /// or unavailable.
    pub fn runner_for(
        &self,
        resume: Option<&ResumeToken>,
    ) -> Result<Arc<dyn Runner>, RunnerUnavailableError> {
        let entry = self.entry_for(resume)?;
        if !entry.available {
            return Err(RunnerUnavailableError::Unavailable {
                engine: entry.engine.clone(),
                issue: entry
                    .issue
                    .clone()
                    .unwrap_or_else(|| "engine unavailable".to_string()),
            });
        }
        Ok(Arc::clone(&entry.runner))
    }

    /// Format a footer line via the token's engine.
    pub fn format_resume(&self, token: &ResumeToken) -> Option<String> {
        self.entries
            .iter()
            .find(|e| e.engine == token.engine)
            .and_then(|e| e.runner.format_resume(token).ok())
    }

    /// Scan text for any engine's resume signature, in registration order.
    pub fn extract_resume(&self, text: &str) -> Option<ResumeToken> {
        if text.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find_map(|entry| entry.runner.extract_resume(text))
    }

    /// Resolve a resume token: message text wins over the replied-to text.
    pub fn resolve_resume(&self, text: &str, reply_text: Option<&str>) -> Option<ResumeToken> {
        self.extract_resume(text)
            .or_else(|| reply_text.and_then(|reply| self.extract_resume(reply)))
    }

    /// Whether any registered engine claims this line as a resume signature.
    pub fn is_resume_line(&self, line: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.runner.is_resume_line(line))
    }

    /// Strip every engine's resume lines from a prompt. Engines must get
    /// non-empty input, so an emptied prompt becomes "continue".
    pub fn strip_resume_lines(&self, text: &str) -> String {
        let stripped = strip_resume_lines(text, |line| self.is_resume_line(line));
        if stripped.is_empty() {
            EMPTY_PROMPT_FALLBACK.to_string()
        } else {
            stripped
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
