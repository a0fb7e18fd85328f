// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted runner for tests
//!
//! Plays back a fixed sequence of events instead of spawning a subprocess.
//! Used by router, bridge, and workspace-level tests.

use crate::resume::ResumeMatcher;
use crate::runner::{RunRequest, Runner, RunnerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{
    Action, ActionKind, ActionPhase, EngineEvent, EngineId, ResumeToken, Usage,
};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One scripted step of a run
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit `Started` with this session value (or the requested resume's).
    Started { value: Option<String> },
    /// Emit an action event.
    Action {
        id: String,
        kind: ActionKind,
        title: String,
        phase: ActionPhase,
        ok: Option<bool>,
    },
    /// Sleep, cancellable.
    Sleep(Duration),
    /// Park until cancelled.
    WaitCancel,
    /// Emit `Completed` and stop.
    Return { ok: bool, answer: String },
}

impl ScriptStep {
    pub fn started(value: &str) -> Self {
        ScriptStep::Started {
            value: Some(value.to_string()),
        }
    }

    pub fn action_completed(id: &str, kind: ActionKind, title: &str, ok: bool) -> Self {
        ScriptStep::Action {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            phase: ActionPhase::Completed,
            ok: Some(ok),
        }
    }

    pub fn action_started(id: &str, kind: ActionKind, title: &str) -> Self {
        ScriptStep::Action {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            phase: ActionPhase::Started,
            ok: None,
        }
    }

    pub fn returns(answer: &str) -> Self {
        ScriptStep::Return {
            ok: true,
            answer: answer.to_string(),
        }
    }

    pub fn fails(answer: &str) -> Self {
        ScriptStep::Return {
            ok: false,
            answer: answer.to_string(),
        }
    }
}

/// A runner that replays scripted events
#[derive(Debug)]
pub struct ScriptRunner {
    engine: EngineId,
    matcher: ResumeMatcher,
    default_session: String,
    /// One script per run; the last one repeats once exhausted.
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    last_script: Mutex<Vec<ScriptStep>>,
    /// Every request this runner has served, in order.
    requests: Mutex<Vec<RunRequest>>,
    /// (start, end) of every completed run, for overlap assertions.
    spans: Mutex<Vec<(tokio::time::Instant, tokio::time::Instant)>>,
}

impl ScriptRunner {
    pub fn new(engine: impl Into<EngineId>, script: Vec<ScriptStep>) -> Self {
        let engine = engine.into();
        Self {
            matcher: ResumeMatcher::new(engine.clone()),
            engine,
            default_session: "scripted-session".to_string(),
            scripts: Mutex::new(VecDeque::new()),
            last_script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
            spans: Mutex::new(Vec::new()),
        }
    }

    /// Simple runner: `Started` then `Completed(answer)`.
    pub fn answering(engine: impl Into<EngineId>, session: &str, answer: &str) -> Self {
        let runner = Self::new(
            engine,
            vec![ScriptStep::started(session), ScriptStep::returns(answer)],
        );
        runner.set_default_session(session);
        runner
    }

    pub fn set_default_session(&self, session: &str) {
        // The default session only matters for Started steps without a value.
        let mut script = self.last_script.lock();
        for step in script.iter_mut() {
            if let ScriptStep::Started { value } = step {
                if value.is_none() {
                    *value = Some(session.to_string());
                }
            }
        }
    }

    /// Queue an additional script for the next run.
    pub fn push_script(&self, script: Vec<ScriptStep>) {
        self.scripts.lock().push_back(script);
    }

    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().clone()
    }

    pub fn run_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// (start, end) spans of completed runs.
    pub fn run_spans(&self) -> Vec<(tokio::time::Instant, tokio::time::Instant)> {
        self.spans.lock().clone()
    }

    fn next_script(&self) -> Vec<ScriptStep> {
        if let Some(script) = self.scripts.lock().pop_front() {
            *self.last_script.lock() = script.clone();
            return script;
        }
        self.last_script.lock().clone()
    }
}

#[async_trait]
impl Runner for ScriptRunner {
    fn engine(&self) -> &EngineId {
        &self.engine
    }

    fn format_resume(&self, token: &ResumeToken) -> Result<String, RunnerError> {
        self.matcher.format(token)
    }

    fn extract_resume(&self, text: &str) -> Option<ResumeToken> {
        self.matcher.extract(text)
    }

    fn is_resume_line(&self, line: &str) -> bool {
        self.matcher.is_resume_line(line)
    }

    async fn run(
        &self,
        request: RunRequest,
        events: mpsc::Sender<EngineEvent>,
        cancel: CancellationToken,
    ) -> Result<(), RunnerError> {
        let started_at = tokio::time::Instant::now();
        let script = self.next_script();
        let session = request
            .resume
            .as_ref()
            .map(|token| token.value.clone())
            .unwrap_or_else(|| self.default_session.clone());
        self.requests.lock().push(request);
        let result = self.play(script, session, events, cancel).await;
        self.spans.lock().push((started_at, tokio::time::Instant::now()));
        result
    }
}

impl ScriptRunner {
    async fn play(
        &self,
        script: Vec<ScriptStep>,
        session: String,
        events: mpsc::Sender<EngineEvent>,
        cancel: CancellationToken,
    ) -> Result<(), RunnerError> {
        let mut found_session: Option<String> = None;
        for step in script {
            match step {
                ScriptStep::Started { value } => {
                    let value = value.unwrap_or_else(|| session.clone());
                    found_session = Some(value.clone());
                    let event = EngineEvent::Started {
                        engine: self.engine.clone(),
                        resume: ResumeToken::new(self.engine.clone(), value),
                        title: "Scripted".to_string(),
                        meta: None,
                    };
                    if events.send(event).await.is_err() {
                        return Err(RunnerError::ChannelClosed);
                    }
                }
                ScriptStep::Action {
                    id,
                    kind,
                    title,
                    phase,
                    ok,
                } => {
                    let event = EngineEvent::Action {
                        engine: self.engine.clone(),
                        action: Action::new(id, kind, title),
                        phase,
                        ok,
                        message: None,
                        level: None,
                    };
                    if events.send(event).await.is_err() {
                        return Err(RunnerError::ChannelClosed);
                    }
                }
                ScriptStep::Sleep(duration) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(duration) => {}
                    }
                }
                ScriptStep::WaitCancel => {
                    cancel.cancelled().await;
                    return Ok(());
                }
                ScriptStep::Return { ok, answer } => {
                    let resume = found_session
                        .clone()
                        .or_else(|| Some(session.clone()))
                        .map(|value| ResumeToken::new(self.engine.clone(), value));
                    let event = EngineEvent::Completed {
                        engine: self.engine.clone(),
                        ok,
                        answer,
                        resume,
                        error: None,
                        usage: Some(Usage::default()),
                    };
                    if events.send(event).await.is_err() {
                        return Err(RunnerError::ChannelClosed);
                    }
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
