// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runner contract and per-session locking

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{EngineEvent, EngineId, ResumeToken};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors from runner execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("resume token is for engine {token_engine}, not {engine}")]
    WrongEngine {
        engine: EngineId,
        token_engine: EngineId,
    },
    #[error("{engine} emitted session {actual:?} but expected {expected:?}")]
    SessionDrift {
        engine: EngineId,
        expected: String,
        actual: String,
    },
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("failed to write stdin to {engine}: {source}")]
    Stdin {
        engine: EngineId,
        source: std::io::Error,
    },
    #[error("event channel closed before the run finished")]
    ChannelClosed,
}

/// One turn's worth of work for a runner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRequest {
    pub prompt: String,
    pub resume: Option<ResumeToken>,
    /// Working directory for the engine subprocess. `None` inherits ours.
    pub cwd: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_resume(mut self, resume: Option<ResumeToken>) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }
}

/// A configured engine ready to run turns.
///
/// `run` streams normalized events into `events` and returns when the
/// subprocess has been reaped. Cancelling the token terminates the engine
/// (SIGTERM, then kill after a grace period).
#[async_trait]
pub trait Runner: std::fmt::Debug + Send + Sync + 'static {
    fn engine(&self) -> &EngineId;

    /// Format a resume footer line, e.g. `` `claude resume abc123` ``.
    fn format_resume(&self, token: &ResumeToken) -> Result<String, RunnerError>;

    /// Find this engine's resume signature in free text (last match wins).
    fn extract_resume(&self, text: &str) -> Option<ResumeToken>;

    /// Whether a single line is this engine's resume signature.
    fn is_resume_line(&self, line: &str) -> bool;

    async fn run(
        &self,
        request: RunRequest,
        events: mpsc::Sender<EngineEvent>,
        cancel: CancellationToken,
    ) -> Result<(), RunnerError>;
}

/// Named async locks keyed by `engine:session`.
///
/// Two runs resuming the same session serialize here; runs without a resume
/// token never contend (pre-session coordination is the scheduler's job).
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, token: &ResumeToken) -> Arc<tokio::sync::Mutex<()>> {
        let key = format!("{}:{}", token.engine, token.value);
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key).or_default())
    }
}

/// The process-wide session lock map.
pub fn session_locks() -> &'static SessionLocks {
    static LOCKS: OnceLock<SessionLocks> = OnceLock::new();
    LOCKS.get_or_init(SessionLocks::new)
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
