// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic JSONL subprocess runner
//!
//! Spawns the engine CLI, feeds the prompt on stdin, and streams stdout one
//! JSON line at a time through the dialect's translator. Anything that goes
//! wrong inside the stream becomes a warning action; the run itself only
//! fails on spawn errors and session drift.

use crate::resume::ResumeMatcher;
use crate::runner::{session_locks, RunRequest, Runner, RunnerError};
use async_trait::async_trait;
use relay_core::{
    Action, ActionKind, ActionPhase, EngineEvent, EngineId, NoteLevel, ResumeToken,
};
use relay_adapters::subprocess::{terminate_gracefully, TERMINATE_GRACE};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A recoverable failure translating one engine event
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TranslateError {
    pub message: String,
}

impl TranslateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Engine-specific half of the JSONL runner.
///
/// A dialect knows how to invoke its CLI and how to translate the CLI's
/// decoded JSON into normalized events. It never touches the process.
pub trait EngineDialect: Send + Sync + 'static {
    type State: Send;

    fn engine(&self) -> &EngineId;

    /// Human-facing session title for `Started` events.
    fn title(&self) -> &str;

    fn command(&self) -> &str;

    fn new_state(&self, prompt: &str, resume: Option<&ResumeToken>) -> Self::State;

    fn build_args(&self, prompt: &str, resume: Option<&ResumeToken>, state: &Self::State)
        -> Vec<String>;

    /// Bytes written to the engine's stdin. Defaults to the prompt.
    fn stdin_payload(
        &self,
        prompt: &str,
        _resume: Option<&ResumeToken>,
        _state: &Self::State,
    ) -> Vec<u8> {
        prompt.as_bytes().to_vec()
    }

    /// Extra environment for the subprocess.
    fn env(&self, _state: &Self::State) -> Option<Vec<(String, String)>> {
        None
    }

    /// Translate one decoded JSON event into zero or more engine events.
    fn translate(
        &self,
        value: serde_json::Value,
        state: &mut Self::State,
    ) -> Result<Vec<EngineEvent>, TranslateError>;
}

/// Subprocess runner over an [`EngineDialect`]
#[derive(Debug)]
pub struct JsonlRunner<D: EngineDialect> {
    dialect: D,
    matcher: ResumeMatcher,
}

impl<D: EngineDialect> JsonlRunner<D> {
    pub fn new(dialect: D) -> Self {
        let matcher = ResumeMatcher::new(dialect.engine().clone());
        Self { dialect, matcher }
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    fn note_event(
        &self,
        note_seq: &mut u64,
        message: impl Into<String>,
        detail: HashMap<String, serde_json::Value>,
        level: NoteLevel,
    ) -> EngineEvent {
        *note_seq += 1;
        let engine = self.dialect.engine().clone();
        let message = message.into();
        EngineEvent::Action {
            engine: engine.clone(),
            action: Action::new(
                format!("{engine}.note.{note_seq}"),
                ActionKind::Warning,
                message.clone(),
            )
            .with_detail(detail),
            phase: ActionPhase::Completed,
            ok: Some(level == NoteLevel::Info),
            message: Some(message),
            level: Some(level),
        }
    }
}

struct StreamOutcome {
    completed_seen: bool,
    found_session: Option<ResumeToken>,
    cancelled: bool,
}

#[async_trait]
impl<D: EngineDialect + std::fmt::Debug> Runner for JsonlRunner<D> {
    fn engine(&self) -> &EngineId {
        self.dialect.engine()
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
        let engine = self.dialect.engine().clone();
        if let Some(resume) = &request.resume {
            if resume.engine != engine {
                return Err(RunnerError::WrongEngine {
                    engine,
                    token_engine: resume.engine.clone(),
                });
            }
        }

        // Single-flight per session: concurrent runs resuming the same
        // session serialize here.
        let lock = request
            .resume
            .as_ref()
            .map(|resume| session_locks().lock_for(resume));
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let mut state = self.dialect.new_state(&request.prompt, request.resume.as_ref());
        let args = self
            .dialect
            .build_args(&request.prompt, request.resume.as_ref(), &state);
        let payload = self
            .dialect
            .stdin_payload(&request.prompt, request.resume.as_ref(), &state);

        let mut command = tokio::process::Command::new(self.dialect.command());
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }
        if let Some(env) = self.dialect.env(&state) {
            command.envs(env);
        }

        tracing::info!(
            %engine,
            command = self.dialect.command(),
            resume = request.resume.as_ref().map(|r| r.value.as_str()),
            cwd = request.cwd.as_ref().map(|p| p.display().to_string()),
            "spawning engine"
        );

        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            command: self.dialect.command().to_string(),
            source,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(source) = stdin.write_all(&payload).await {
                tracing::warn!(%engine, error = %source, "stdin write failed");
            }
            drop(stdin);
        }

        // Drain stderr concurrently so the engine never blocks on a full pipe.
        if let Some(stderr) = child.stderr.take() {
            let tag = engine.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(engine = %tag, "stderr: {line}");
                }
            });
        }

        let stdout = child.stdout.take();
        let mut note_seq: u64 = 0;
        let outcome = self
            .stream_events(
                stdout,
                &mut state,
                request.resume.as_ref(),
                &events,
                &cancel,
                &mut note_seq,
            )
            .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                // Session drift or channel loss: stop the engine before
                // propagating.
                terminate_gracefully(&mut child, TERMINATE_GRACE).await;
                return Err(err);
            }
        };

        if outcome.cancelled {
            tracing::info!(%engine, "run cancelled, stopping engine");
            terminate_gracefully(&mut child, TERMINATE_GRACE).await;
            return Ok(());
        }

        let status = match child.wait().await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(%engine, error = %err, "wait failed");
                let _ = events
                    .send(self.note_event(
                        &mut note_seq,
                        format!("{engine} process wait failed: {err}"),
                        HashMap::new(),
                        NoteLevel::Warning,
                    ))
                    .await;
                return Ok(());
            }
        };

        let rc = status.code().unwrap_or(-1);
        if rc != 0 {
            let _ = events
                .send(self.note_event(
                    &mut note_seq,
                    format!("{engine} exited with rc={rc}"),
                    HashMap::new(),
                    NoteLevel::Warning,
                ))
                .await;
        }

        if !outcome.completed_seen {
            let error = if rc != 0 {
                format!("{engine} failed with rc={rc}")
            } else {
                format!("{engine} finished without a result")
            };
            let resume = outcome.found_session.or(request.resume);
            let _ = events
                .send(EngineEvent::Completed {
                    engine: engine.clone(),
                    ok: false,
                    answer: String::new(),
                    resume,
                    error: Some(error),
                    usage: None,
                })
                .await;
        }

        Ok(())
    }
}

impl<D: EngineDialect> JsonlRunner<D> {
    #[allow(clippy::too_many_arguments)]
    async fn stream_events(
        &self,
        stdout: Option<tokio::process::ChildStdout>,
        state: &mut D::State,
        expected: Option<&ResumeToken>,
        events: &mpsc::Sender<EngineEvent>,
        cancel: &CancellationToken,
        note_seq: &mut u64,
    ) -> Result<StreamOutcome, RunnerError> {
        let engine = self.dialect.engine().clone();
        let mut outcome = StreamOutcome {
            completed_seen: false,
            found_session: None,
            cancelled: false,
        };
        let Some(stdout) = stdout else {
            return Ok(outcome);
        };
        let mut lines = BufReader::new(stdout).lines();

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => {
                    outcome.cancelled = true;
                    return Ok(outcome);
                }
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    let event = self.note_event(
                        note_seq,
                        format!("{engine} stdout read failed: {err}"),
                        HashMap::new(),
                        NoteLevel::Warning,
                    );
                    if events.send(event).await.is_err() {
                        return Err(RunnerError::ChannelClosed);
                    }
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let decoded: serde_json::Value = match serde_json::from_str(trimmed) {
                Ok(value) => value,
                Err(_) => {
                    let mut detail = HashMap::new();
                    detail.insert(
                        "line".to_string(),
                        serde_json::Value::String(trimmed.to_string()),
                    );
                    let event = self.note_event(
                        note_seq,
                        format!("{engine} produced invalid JSON"),
                        detail,
                        NoteLevel::Warning,
                    );
                    if events.send(event).await.is_err() {
                        return Err(RunnerError::ChannelClosed);
                    }
                    continue;
                }
            };

            let type_tag = decoded
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let item_type = decoded
                .get("item")
                .and_then(|item| item.get("type"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);

            let translated = match self.dialect.translate(decoded, state) {
                Ok(translated) => translated,
                Err(err) => {
                    let mut detail = HashMap::new();
                    detail.insert(
                        "type".to_string(),
                        serde_json::Value::String(type_tag.clone()),
                    );
                    if let Some(item_type) = item_type {
                        detail.insert(
                            "item_type".to_string(),
                            serde_json::Value::String(item_type),
                        );
                    }
                    let event = self.note_event(
                        note_seq,
                        format!("{engine} event {type_tag:?} failed to translate: {err}"),
                        detail,
                        NoteLevel::Warning,
                    );
                    if events.send(event).await.is_err() {
                        return Err(RunnerError::ChannelClosed);
                    }
                    continue;
                }
            };

            for event in translated {
                match &event {
                    EngineEvent::Started { resume, .. } => {
                        if resume.engine != engine {
                            return Err(RunnerError::WrongEngine {
                                engine: engine.clone(),
                                token_engine: resume.engine.clone(),
                            });
                        }
                        if let Some(expected) = expected {
                            if expected.value != resume.value {
                                return Err(RunnerError::SessionDrift {
                                    engine: engine.clone(),
                                    expected: expected.value.clone(),
                                    actual: resume.value.clone(),
                                });
                            }
                        }
                        match &outcome.found_session {
                            // Duplicate Started for the same session: suppress.
                            Some(found) if found.value == resume.value => continue,
                            Some(found) => {
                                return Err(RunnerError::SessionDrift {
                                    engine: engine.clone(),
                                    expected: found.value.clone(),
                                    actual: resume.value.clone(),
                                });
                            }
                            None => {
                                outcome.found_session = Some(resume.clone());
                            }
                        }
                    }
                    EngineEvent::Completed { .. } => {
                        outcome.completed_seen = true;
                    }
                    EngineEvent::Action { .. } => {}
                }
                let is_completed = matches!(event, EngineEvent::Completed { .. });
                if events.send(event).await.is_err() {
                    return Err(RunnerError::ChannelClosed);
                }
                if is_completed {
                    // Completed terminates the stream contract.
                    return Ok(outcome);
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
