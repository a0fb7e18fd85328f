// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-topic message debouncing
//!
//! Users commonly split one thought across several rapid messages; running
//! an engine per message wastes compute and fragments the reply. Messages
//! batch per topic until the window goes quiet. Slash commands skip the
//! window entirely, flushing whatever was pending first so ordering holds.
//!
//! Deadline arithmetic is synchronous and driven by the caller's clock; the
//! bridge loop sleeps until [`TopicDebouncer::next_deadline`] and then calls
//! [`TopicDebouncer::check_expired`].

use relay_adapters::ChatUpdate;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct PendingMessage {
    message_id: i64,
    text: String,
    reply_to_message_id: Option<i64>,
    reply_to_text: Option<String>,
}

/// Combined messages ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct MessageBatch {
    pub topic_id: Option<i64>,
    /// In arrival order
    pub message_ids: Vec<i64>,
    /// Texts joined with newlines, in arrival order
    pub combined_text: String,
    /// Reply target: the newest message in the batch
    pub last_message_id: i64,
    /// The first message's reply context, for resume-token resolution
    pub first_reply_to_message_id: Option<i64>,
    pub first_reply_to_text: Option<String>,
}

/// Batches messages per topic within a debounce window
pub struct TopicDebouncer {
    window: Duration,
    pending: HashMap<Option<i64>, Vec<PendingMessage>>,
    deadlines: HashMap<Option<i64>, Instant>,
}

impl TopicDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
            deadlines: HashMap::new(),
        }
    }

    fn is_slash_command(text: &str) -> bool {
        text.trim_start().starts_with('/')
    }

    /// Add a message; returns any batches that are ready right now.
    ///
    /// A slash command flushes the topic's pending batch (returned first)
    /// and then rides alone in its own batch. Anything else joins the
    /// pending list and pushes the topic's deadline out to `now + window`;
    /// each new message extends the wait.
    pub fn add_message(
        &mut self,
        topic_id: Option<i64>,
        msg: &ChatUpdate,
        now: Instant,
    ) -> Vec<MessageBatch> {
        let mut ready = Vec::new();

        if Self::is_slash_command(&msg.text) {
            if let Some(batch) = self.flush_topic(topic_id) {
                ready.push(batch);
            }
            ready.push(MessageBatch {
                topic_id,
                message_ids: vec![msg.message_id],
                combined_text: msg.text.clone(),
                last_message_id: msg.message_id,
                first_reply_to_message_id: msg.reply_to_message_id,
                first_reply_to_text: msg.reply_to_text.clone(),
            });
            return ready;
        }

        self.pending.entry(topic_id).or_default().push(PendingMessage {
            message_id: msg.message_id,
            text: msg.text.clone(),
            reply_to_message_id: msg.reply_to_message_id,
            reply_to_text: msg.reply_to_text.clone(),
        });
        self.deadlines.insert(topic_id, now + self.window);
        ready
    }

    /// Emit batches for every topic whose deadline has passed.
    pub fn check_expired(&mut self, now: Instant) -> Vec<MessageBatch> {
        let expired: Vec<Option<i64>> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(topic, _)| *topic)
            .collect();
        expired
            .into_iter()
            .filter_map(|topic| self.flush_topic(topic))
            .collect()
    }

    /// Flush everything immediately (shutdown path).
    pub fn flush_all(&mut self) -> Vec<MessageBatch> {
        let topics: Vec<Option<i64>> = self.pending.keys().copied().collect();
        topics
            .into_iter()
            .filter_map(|topic| self.flush_topic(topic))
            .collect()
    }

    /// Earliest deadline across all topics.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn flush_topic(&mut self, topic_id: Option<i64>) -> Option<MessageBatch> {
        self.deadlines.remove(&topic_id);
        let messages = self.pending.remove(&topic_id)?;
        let first = messages.first()?;
        let last_message_id = messages.last().map(|m| m.message_id).unwrap_or(0);
        Some(MessageBatch {
            topic_id,
            first_reply_to_message_id: first.reply_to_message_id,
            first_reply_to_text: first.reply_to_text.clone(),
            message_ids: messages.iter().map(|m| m.message_id).collect(),
            combined_text: messages
                .iter()
                .map(|m| m.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            last_message_id,
        })
    }
}

#[cfg(test)]
#[path = "debounce_tests.rs"]
mod tests;
