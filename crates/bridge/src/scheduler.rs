// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-thread turn scheduler
//!
//! Engines hold server-side session state keyed by the resume token, so two
//! turns on one session must never overlap. The scheduler serializes jobs
//! per `engine:session` key and runs unrelated keys in parallel. A "busy"
//! gate covers the window where a conversation's first turn is still
//! running and its session only became known mid-run.

use parking_lot::Mutex;
use relay_core::{EngineId, ResumeToken, RunContext};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One queued turn
#[derive(Debug, Clone)]
pub struct ThreadJob {
    pub channel_id: i64,
    pub thread_id: Option<i64>,
    pub user_msg_id: i64,
    pub text: String,
    pub resume_token: ResumeToken,
    pub engine: EngineId,
    pub cwd: Option<PathBuf>,
    pub run_ctx: Option<RunContext>,
}

type RunJob = Arc<dyn Fn(ThreadJob) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct ThreadState {
    queue: VecDeque<ThreadJob>,
    /// While set, no queued job may start; cancelling the token clears it.
    busy: Option<CancellationToken>,
    worker_running: bool,
}

impl ThreadState {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            busy: None,
            worker_running: false,
        }
    }
}

struct SchedulerInner {
    threads: Mutex<HashMap<String, ThreadState>>,
    run_job: RunJob,
}

/// Serializes turns per conversation key, parallelizes across keys.
///
/// `run_job` is expected to handle its own failures; a job that errors does
/// not poison its queue.
#[derive(Clone)]
pub struct ThreadScheduler {
    inner: Arc<SchedulerInner>,
}

impl ThreadScheduler {
    pub fn new(run_job: RunJob) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                threads: Mutex::new(HashMap::new()),
                run_job,
            }),
        }
    }

    /// The conversation key a token maps to.
    pub fn thread_key(token: &ResumeToken) -> String {
        format!("{}:{}", token.engine, token.value)
    }

    /// Queue a job behind everything already pending on its key.
    pub fn enqueue(&self, job: ThreadJob) {
        let key = Self::thread_key(&job.resume_token);
        let mut threads = self.inner.threads.lock();
        let state = threads.entry(key.clone()).or_insert_with(ThreadState::new);
        state.queue.push_back(job);
        if !state.worker_running {
            state.worker_running = true;
            let inner = Arc::clone(&self.inner);
            tokio::spawn(run_worker(inner, key));
        }
    }

    /// Register an in-flight turn for a key learned mid-run.
    ///
    /// Queued jobs for the key wait until `done` is cancelled. Without this,
    /// a rapid follow-up to a conversation's first message would start a
    /// second uncoordinated session.
    pub fn note_thread_known(&self, token: &ResumeToken, done: CancellationToken) {
        let key = Self::thread_key(token);
        {
            let mut threads = self.inner.threads.lock();
            let state = threads.entry(key.clone()).or_insert_with(ThreadState::new);
            state.busy = Some(done.clone());
        }
        // Clear the gate (and a now-empty entry) once the turn finishes.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            done.cancelled().await;
            let mut threads = inner.threads.lock();
            if let Some(state) = threads.get_mut(&key) {
                state.busy = None;
                if state.queue.is_empty() && !state.worker_running {
                    threads.remove(&key);
                }
            }
        });
    }

    /// Whether the key currently has queue state (for tests).
    pub fn has_thread(&self, token: &ResumeToken) -> bool {
        self.inner
            .threads
            .lock()
            .contains_key(&Self::thread_key(token))
    }
}

enum Next {
    Gate(CancellationToken),
    Job(ThreadJob),
    Done,
}

async fn run_worker(inner: Arc<SchedulerInner>, key: String) {
    loop {
        let next = {
            let mut threads = inner.threads.lock();
            match threads.get_mut(&key) {
                None => Next::Done,
                Some(state) => {
                    if let Some(busy) = &state.busy {
                        Next::Gate(busy.clone())
                    } else if let Some(job) = state.queue.pop_front() {
                        Next::Job(job)
                    } else {
                        threads.remove(&key);
                        Next::Done
                    }
                }
            }
        };
        match next {
            Next::Gate(done) => {
                done.cancelled().await;
                let mut threads = inner.threads.lock();
                if let Some(state) = threads.get_mut(&key) {
                    state.busy = None;
                }
            }
            Next::Job(job) => {
                tracing::debug!(key, user_msg_id = job.user_msg_id, "running queued turn");
                (inner.run_job)(job).await;
            }
            Next::Done => return,
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
