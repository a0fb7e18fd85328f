// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turn driver: one engine run, from progress message to final render
//!
//! The driver owns the progress message lifecycle: send it, re-render it as
//! events arrive (change-driven, with a floor interval so edits coalesce in
//! the outbox), and finalize it when the run ends: by editing in place or,
//! with `final_notify`, by sending a fresh notifying message and deleting
//! the progress one.

use crate::render::ChatPresenter;
use crate::scheduler::ThreadScheduler;
use parking_lot::Mutex;
use relay_adapters::{BotClient, ChatApi, SendRequest};
use relay_core::{EngineEvent, ProgressTracker, ResumeToken, RunContext};
use relay_engines::resume::strip_resume_lines;
use relay_engines::{AutoRouter, RunRequest, Runner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A turn currently executing, addressable by its progress message ID
pub struct RunningTask {
    /// Cancelling this terminates the engine subprocess.
    pub cancel: CancellationToken,
    /// Fires when the turn is over; releases the scheduler's busy gate.
    pub done: CancellationToken,
    /// The session, once learned. Replies to the progress message wait on
    /// this to resume the right conversation.
    pub resume: Mutex<Option<ResumeToken>>,
}

impl RunningTask {
    fn new(resume: Option<ResumeToken>, cancel: Option<CancellationToken>) -> Arc<Self> {
        Arc::new(Self {
            cancel: cancel.unwrap_or_default(),
            done: CancellationToken::new(),
            resume: Mutex::new(resume),
        })
    }
}

/// Map of running turns keyed by progress message ID
pub type RunningTasks = Arc<Mutex<HashMap<i64, Arc<RunningTask>>>>;

/// Everything a turn needs from the surrounding bridge
pub struct TurnEnv<A: ChatApi> {
    pub bot: BotClient<A>,
    pub router: Arc<AutoRouter>,
    pub presenter: Arc<ChatPresenter>,
    pub running_tasks: RunningTasks,
    pub progress_edit_every: Duration,
    pub final_notify: bool,
}

impl<A: ChatApi> Clone for TurnEnv<A> {
    fn clone(&self) -> Self {
        Self {
            bot: self.bot.clone(),
            router: Arc::clone(&self.router),
            presenter: Arc::clone(&self.presenter),
            running_tasks: Arc::clone(&self.running_tasks),
            progress_edit_every: self.progress_edit_every,
            final_notify: self.final_notify,
        }
    }
}

/// One turn's inputs
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub channel_id: i64,
    pub thread_id: Option<i64>,
    pub user_msg_id: i64,
    pub prompt: String,
    pub resume: Option<ResumeToken>,
    pub cwd: Option<PathBuf>,
    pub run_ctx: Option<RunContext>,
    /// True when the conversation had no session at enqueue time; the
    /// scheduler then learns the real key from the `Started` event.
    pub notify_scheduler: bool,
    /// Cancel token to use instead of a fresh one (ralph loops share one
    /// across their iterations).
    pub cancel: Option<CancellationToken>,
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub status: String,
    pub resume: Option<ResumeToken>,
    pub answer: String,
}

struct CompletedInfo {
    ok: bool,
    answer: String,
    error: Option<String>,
    resume: Option<ResumeToken>,
}

/// Run one turn end to end.
pub async fn run_turn<A: ChatApi>(
    env: &TurnEnv<A>,
    scheduler: Option<&ThreadScheduler>,
    runner: Arc<dyn Runner>,
    request: TurnRequest,
) -> TurnOutcome {
    let engine = runner.engine().clone();
    tracing::info!(
        %engine,
        channel_id = request.channel_id,
        user_msg_id = request.user_msg_id,
        resume = request.resume.as_ref().map(|r| r.value.as_str()),
        "turn starting"
    );

    let mut tracker = ProgressTracker::new(engine.clone());
    tracker.set_resume(request.resume.clone());
    let format_runner = Arc::clone(&runner);
    let resume_formatter =
        move |token: &ResumeToken| format_runner.format_resume(token).unwrap_or_default();

    let started_at = Instant::now();

    // Initial progress message; its ID is the cancel target.
    let initial = env.presenter.render_progress(
        &tracker.snapshot(Some(&resume_formatter)),
        0.0,
        "starting",
        request.run_ctx.as_ref(),
    );
    let progress = env
        .bot
        .send_message(SendRequest {
            channel_id: request.channel_id,
            text: initial.to_text(env.presenter.max_len),
            thread_id: request.thread_id,
            reply_to_message_id: Some(request.user_msg_id),
            disable_notification: true,
            reply_markup: None,
        })
        .await;
    let progress_id = match progress {
        Ok(message_ref) => Some(message_ref.message_id),
        Err(err) => {
            tracing::warn!(error = %err, "progress message send failed");
            None
        }
    };

    let task = RunningTask::new(request.resume.clone(), request.cancel.clone());
    if let Some(progress_id) = progress_id {
        env.running_tasks.lock().insert(progress_id, Arc::clone(&task));
    }

    let (event_tx, mut event_rx) = mpsc::channel::<EngineEvent>(256);
    let run_handle = {
        let runner = Arc::clone(&runner);
        let run_request = RunRequest::new(request.prompt.clone())
            .with_resume(request.resume.clone())
            .with_cwd(request.cwd.clone());
        let cancel = task.cancel.child_token();
        tokio::spawn(async move { runner.run(run_request, event_tx, cancel).await })
    };

    let mut completed: Option<CompletedInfo> = None;
    let mut dirty = false;
    let mut last_edit = started_at;
    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else { break };
                tracing::debug!(event = %event.log_summary(), "engine event");
                if let EngineEvent::Started { resume, .. } = &event {
                    *task.resume.lock() = Some(resume.clone());
                    if request.notify_scheduler {
                        if let Some(scheduler) = scheduler {
                            scheduler.note_thread_known(resume, task.done.clone());
                        }
                    }
                }
                if let EngineEvent::Completed { ok, answer, error, resume, .. } = &event {
                    completed = Some(CompletedInfo {
                        ok: *ok,
                        answer: answer.clone(),
                        error: error.clone(),
                        resume: resume.clone(),
                    });
                }
                if tracker.note_event(&event) {
                    dirty = true;
                }
            }
            _ = tokio::time::sleep_until(last_edit + env.progress_edit_every),
                if dirty && progress_id.is_some() => {
                if let Some(progress_id) = progress_id {
                    let snapshot = tracker.snapshot(Some(&resume_formatter));
                    let message = env.presenter.render_progress(
                        &snapshot,
                        started_at.elapsed().as_secs_f64(),
                        "working",
                        request.run_ctx.as_ref(),
                    );
                    // Fire-and-forget: stale bodies coalesce in the outbox.
                    let _ = env
                        .bot
                        .edit_message(
                            request.channel_id,
                            progress_id,
                            message.to_text(env.presenter.max_len),
                            false,
                        )
                        .await;
                }
                last_edit = Instant::now();
                dirty = false;
            }
        }
    }

    let run_error = match run_handle.await {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(join_err) => Some(format!("turn task failed: {join_err}")),
    };

    let cancelled = task.cancel.is_cancelled();
    let elapsed = started_at.elapsed().as_secs_f64();
    let resolved_resume = completed
        .as_ref()
        .and_then(|info| info.resume.clone())
        .or_else(|| tracker.resume.clone());
    tracker.set_resume(resolved_resume.clone());
    let snapshot = tracker.snapshot(Some(&resume_formatter));

    let (status, body) = if cancelled {
        ("cancelled".to_string(), String::new())
    } else if let Some(error) = &run_error {
        ("error".to_string(), error.clone())
    } else if let Some(info) = &completed {
        let mut body = strip_resume_lines(&info.answer, |line| env.router.is_resume_line(line));
        if !info.ok {
            if let Some(error) = &info.error {
                if body.trim().is_empty() {
                    body = error.clone();
                } else {
                    body = format!("{body}\n\n{error}");
                }
            }
        }
        let status = if info.ok && !body.trim().is_empty() {
            "done".to_string()
        } else {
            "error".to_string()
        };
        (status, body)
    } else {
        (
            "error".to_string(),
            format!("{engine} finished without a result"),
        )
    };

    tracing::info!(
        %engine,
        status,
        elapsed_s = elapsed,
        action_count = snapshot.action_count,
        resume = resolved_resume.as_ref().map(|r| r.value.as_str()),
        "turn finished"
    );

    let message = env
        .presenter
        .render_final(&snapshot, elapsed, &status, &body, request.run_ctx.as_ref());
    let text = message.to_text(env.presenter.max_len);

    deliver_final(env, &request, progress_id, text, status == "done").await;

    if let Some(progress_id) = progress_id {
        env.running_tasks.lock().remove(&progress_id);
    }
    task.done.cancel();

    TurnOutcome {
        status,
        resume: resolved_resume,
        answer: completed.map(|info| info.answer).unwrap_or_default(),
    }
}

/// Deliver the final message: edit in place, or send-and-delete when the
/// workspace wants a notifying final message.
async fn deliver_final<A: ChatApi>(
    env: &TurnEnv<A>,
    request: &TurnRequest,
    progress_id: Option<i64>,
    text: String,
    notify: bool,
) {
    let edit_in_place = progress_id.filter(|_| !env.final_notify);
    if let Some(message_id) = edit_in_place {
        if env
            .bot
            .edit_message(request.channel_id, message_id, text.clone(), true)
            .await
            .is_ok()
        {
            return;
        }
    }

    let sent = env
        .bot
        .send_message(SendRequest {
            channel_id: request.channel_id,
            text,
            thread_id: request.thread_id,
            reply_to_message_id: Some(request.user_msg_id),
            disable_notification: !notify,
            reply_markup: None,
        })
        .await;
    if sent.is_ok() {
        if let (Some(progress_id), true) = (progress_id, env.final_notify) {
            let _ = env
                .bot
                .delete_message(request.channel_id, progress_id)
                .await;
        }
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
