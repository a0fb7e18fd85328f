// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake chat API for tests
//!
//! Records every call with a timestamp, keeps a message store so tests can
//! assert final bodies, and can be scripted to answer with retry-after.

use super::{
    BotCommand, ChatApi, ChatUpdate, MessageRef, SendRequest, TransportError, UpdateKind,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;

/// One recorded API call
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub method: &'static str,
    pub channel_id: i64,
    pub message_id: Option<i64>,
    pub text: Option<String>,
    pub at: Instant,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<ApiCall>,
    messages: HashMap<i64, String>,
    next_message_id: i64,
    /// Pending retry-after answers for mutating calls, consumed in order
    retry_after: VecDeque<f64>,
    updates: VecDeque<Vec<ChatUpdate>>,
    next_update_id: i64,
    closed: bool,
}

/// In-memory [`ChatApi`] implementation
#[derive(Clone)]
pub struct FakeChatApi {
    state: Arc<Mutex<FakeState>>,
    update_notify: Arc<Notify>,
}

impl Default for FakeChatApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChatApi {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                next_message_id: 1,
                next_update_id: 1,
                ..FakeState::default()
            })),
            update_notify: Arc::new(Notify::new()),
        }
    }

    /// Script the next `count` mutating calls to answer retry-after.
    pub fn script_retry_after(&self, count: usize, seconds: f64) {
        let mut state = self.state.lock();
        for _ in 0..count {
            state.retry_after.push_back(seconds);
        }
    }

    /// Queue a batch of updates for the next `get_updates` poll.
    pub fn push_updates(&self, updates: Vec<ChatUpdate>) {
        self.state.lock().updates.push_back(updates);
        self.update_notify.notify_waiters();
    }

    /// Convenience: queue a plain text message update.
    #[allow(clippy::too_many_arguments)]
    pub fn push_message(
        &self,
        channel_id: i64,
        thread_id: Option<i64>,
        message_id: i64,
        text: &str,
        reply_to_message_id: Option<i64>,
        reply_to_text: Option<&str>,
    ) {
        let update_id = {
            let mut state = self.state.lock();
            state.next_update_id += 1;
            state.next_update_id
        };
        self.push_updates(vec![ChatUpdate {
            platform: "fake".to_string(),
            kind: UpdateKind::Message,
            update_id,
            channel_id,
            thread_id,
            message_id,
            text: text.to_string(),
            user_id: Some(7),
            reply_to_message_id,
            reply_to_text: reply_to_text.map(str::to_string),
            callback_id: None,
            callback_data: None,
            callback_message_id: None,
        }]);
    }

    /// After close, `get_updates` returns `Closed` so loops can exit.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.update_notify.notify_waiters();
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_for(&self, method: &str) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.texts_for("send_message")
    }

    pub fn edit_texts(&self) -> Vec<String> {
        self.texts_for("edit_message_text")
    }

    fn texts_for(&self, method: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .filter_map(|call| call.text)
            .collect()
    }

    /// Current body of a message, if it exists.
    pub fn message_text(&self, message_id: i64) -> Option<String> {
        self.state.lock().messages.get(&message_id).cloned()
    }

    fn check_retry_after(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        match state.retry_after.pop_front() {
            Some(seconds) => Err(TransportError::RetryAfter(seconds)),
            None => Ok(()),
        }
    }

    fn record(
        &self,
        method: &'static str,
        channel_id: i64,
        message_id: Option<i64>,
        text: Option<String>,
    ) {
        self.state.lock().calls.push(ApiCall {
            method,
            channel_id,
            message_id,
            text,
            at: Instant::now(),
        });
    }
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn send_message(&self, request: SendRequest) -> Result<MessageRef, TransportError> {
        self.check_retry_after()?;
        self.record(
            "send_message",
            request.channel_id,
            None,
            Some(request.text.clone()),
        );
        let message_id = {
            let mut state = self.state.lock();
            state.next_message_id += 1;
            let id = state.next_message_id;
            state.messages.insert(id, request.text.clone());
            id
        };
        Ok(MessageRef {
            platform: "fake".to_string(),
            channel_id: request.channel_id,
            message_id,
            thread_id: request.thread_id,
        })
    }

    async fn edit_message_text(
        &self,
        channel_id: i64,
        message_id: i64,
        text: String,
    ) -> Result<(), TransportError> {
        self.check_retry_after()?;
        self.record(
            "edit_message_text",
            channel_id,
            Some(message_id),
            Some(text.clone()),
        );
        self.state.lock().messages.insert(message_id, text);
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<(), TransportError> {
        self.check_retry_after()?;
        self.record("delete_message", channel_id, Some(message_id), None);
        self.state.lock().messages.remove(&message_id);
        Ok(())
    }

    async fn get_updates(
        &self,
        _offset: Option<i64>,
        timeout_s: u64,
    ) -> Result<Vec<ChatUpdate>, TransportError> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(batch) = state.updates.pop_front() {
                    return Ok(batch);
                }
                if state.closed {
                    return Err(TransportError::Closed);
                }
                // Short polls answer empty instead of long-polling.
                if timeout_s == 0 {
                    return Ok(Vec::new());
                }
            }
            self.update_notify.notified().await;
        }
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        _text: Option<String>,
    ) -> Result<(), TransportError> {
        self.record("answer_callback_query", 0, None, Some(callback_id.to_string()));
        Ok(())
    }

    async fn edit_reply_markup(
        &self,
        channel_id: i64,
        message_id: i64,
        _markup: serde_json::Value,
    ) -> Result<(), TransportError> {
        self.record("edit_reply_markup", channel_id, Some(message_id), None);
        Ok(())
    }

    async fn create_forum_topic(
        &self,
        channel_id: i64,
        name: &str,
    ) -> Result<i64, TransportError> {
        self.record("create_forum_topic", channel_id, None, Some(name.to_string()));
        let mut state = self.state.lock();
        state.next_message_id += 1;
        Ok(1000 + state.next_message_id)
    }

    async fn set_my_commands(&self, _commands: Vec<BotCommand>) -> Result<(), TransportError> {
        self.record("set_my_commands", 0, None, None);
        Ok(())
    }
}
