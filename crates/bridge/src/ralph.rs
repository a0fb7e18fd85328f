// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ralph loops: bounded self-continuing agent runs
//!
//! `/ralph <task> [--max-iterations N]` keeps resuming the same session
//! with the same task until the engine reports the marker, fails, gets
//! cancelled, or runs out of iterations. One loop per topic.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// When the engine's answer contains this marker, the loop is finished.
pub const RALPH_DONE_MARKER: &str = "RALPH_DONE";

/// Parse `/ralph` arguments: the task text and an optional iteration cap.
pub fn parse_ralph_command(args: &str) -> (String, Option<u32>) {
    let mut max_iterations = None;
    let mut task_parts: Vec<&str> = Vec::new();
    let mut tokens = args.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if token == "--max-iterations" {
            if let Some(value) = tokens.peek().and_then(|v| v.parse::<u32>().ok()) {
                max_iterations = Some(value.max(1));
                tokens.next();
                continue;
            }
        }
        task_parts.push(token);
    }
    (task_parts.join(" "), max_iterations)
}

/// A registered active loop
#[derive(Debug, Clone)]
pub struct ActiveLoop {
    pub loop_id: String,
    pub cancel: CancellationToken,
}

/// Tracks at most one active ralph loop per topic
#[derive(Default, Clone)]
pub struct RalphManager {
    loops: Arc<Mutex<HashMap<i64, ActiveLoop>>>,
}

impl RalphManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loop for a topic. Fails when one is already active.
    pub fn begin(&self, topic_id: i64) -> Option<ActiveLoop> {
        let mut loops = self.loops.lock();
        if loops.contains_key(&topic_id) {
            return None;
        }
        let active = ActiveLoop {
            loop_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
        };
        loops.insert(topic_id, active.clone());
        Some(active)
    }

    /// Drop the registration when the loop ends (only if still ours).
    pub fn finish(&self, topic_id: i64, loop_id: &str) {
        let mut loops = self.loops.lock();
        if loops.get(&topic_id).is_some_and(|l| l.loop_id == loop_id) {
            loops.remove(&topic_id);
        }
    }

    pub fn has_active_loop(&self, topic_id: i64) -> bool {
        self.loops.lock().contains_key(&topic_id)
    }

    pub fn active_loop(&self, topic_id: i64) -> Option<ActiveLoop> {
        self.loops.lock().get(&topic_id).cloned()
    }

    /// Cancel the topic's loop. Returns whether one was active.
    pub fn cancel_loop(&self, topic_id: i64) -> bool {
        let loops = self.loops.lock();
        match loops.get(&topic_id) {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel a loop only when the callback's loop_id still matches.
    pub fn cancel_loop_id(&self, topic_id: i64, loop_id: &str) -> bool {
        let loops = self.loops.lock();
        match loops.get(&topic_id) {
            Some(active) if active.loop_id == loop_id => {
                active.cancel.cancel();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "ralph_tests.rs"]
mod tests;
