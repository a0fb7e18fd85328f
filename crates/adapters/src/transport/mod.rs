// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat platform contract
//!
//! A transport plugin implements [`ChatApi`]: raw, unpaced platform calls.
//! All sends and edits from the rest of the system go through the
//! [`outbox::Outbox`], which adds per-channel ordering, coalescing, pacing,
//! and retry-after handling on top.

pub mod outbox;
pub mod telegram;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from platform calls
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Platform asked us to back off for the given number of seconds
    #[error("rate limited, retry after {0}s")]
    RetryAfter(f64),
    #[error("api error: {description}")]
    Api { description: String },
    #[error("http error: {0}")]
    Http(String),
    /// The outbox was dropped before the operation ran
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            TransportError::RetryAfter(seconds) => Some(*seconds),
            _ => None,
        }
    }
}

/// Kind of incoming update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Message,
    CallbackQuery,
}

/// Normalized incoming update from a chat platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUpdate {
    pub platform: String,
    pub kind: UpdateKind,
    pub update_id: i64,
    pub channel_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    pub message_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_message_id: Option<i64>,
}

/// Opaque handle to a delivered message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub platform: String,
    pub channel_id: i64,
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
}

/// Outbound message parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendRequest {
    pub channel_id: i64,
    pub text: String,
    pub thread_id: Option<i64>,
    pub reply_to_message_id: Option<i64>,
    pub disable_notification: bool,
    pub reply_markup: Option<serde_json::Value>,
}

/// A slash command advertised in the platform menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

/// Raw platform calls, implemented per transport.
///
/// Implementations are plain API bindings: no queueing, no pacing, no
/// retries. Rate-limit responses surface as `TransportError::RetryAfter`.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    async fn send_message(&self, request: SendRequest) -> Result<MessageRef, TransportError>;

    async fn edit_message_text(
        &self,
        channel_id: i64,
        message_id: i64,
        text: String,
    ) -> Result<(), TransportError>;

    async fn delete_message(&self, channel_id: i64, message_id: i64)
        -> Result<(), TransportError>;

    /// Long-poll for updates. `offset` acknowledges everything before it.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_s: u64,
    ) -> Result<Vec<ChatUpdate>, TransportError>;

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<String>,
    ) -> Result<(), TransportError>;

    async fn edit_reply_markup(
        &self,
        channel_id: i64,
        message_id: i64,
        markup: serde_json::Value,
    ) -> Result<(), TransportError>;

    /// Create a sub-channel (forum topic / thread) and return its ID.
    async fn create_forum_topic(
        &self,
        channel_id: i64,
        name: &str,
    ) -> Result<i64, TransportError>;

    async fn set_my_commands(&self, commands: Vec<BotCommand>) -> Result<(), TransportError>;
}
