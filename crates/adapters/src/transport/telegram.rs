// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telegram Bot API client
//!
//! Raw bindings only; ordering, pacing, and retries live in the outbox.
//! The bot token appears in every request URL, so every error string and log
//! line is scrubbed before it can leave this module.

use super::{
    BotCommand, ChatApi, ChatUpdate, MessageRef, SendRequest, TransportError, UpdateKind,
};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Replace a bot credential everywhere it could appear in a string.
pub fn redact_token(text: &str, token: &str) -> String {
    if token.is_empty() {
        return text.to_string();
    }
    text.replace(&format!("bot{token}"), "bot[REDACTED]")
        .replace(token, "[REDACTED_TOKEN]")
}

/// Extract `parameters.retry_after` from an API error payload.
pub fn retry_after_from_payload(payload: &Value) -> Option<f64> {
    payload
        .get("parameters")
        .and_then(|p| p.get("retry_after"))
        .and_then(Value::as_f64)
}

/// Telegram Bot API client over reqwest
#[derive(Clone)]
pub struct TelegramClient {
    token: String,
    base_url: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("token", &"bot[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    fn redact(&self, text: &str) -> String {
        redact_token(text, &self.token)
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn post(&self, method: &str, payload: Value) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(self.url(method))
            .json(&payload)
            .send()
            .await
            .map_err(|err| TransportError::Http(self.redact(&err.to_string())))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|err| TransportError::Http(self.redact(&err.to_string())))?;

        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(body.get("result").cloned().unwrap_or(Value::Null));
        }

        if let Some(seconds) = retry_after_from_payload(&body) {
            tracing::debug!(method, seconds, "telegram rate limit");
            return Err(TransportError::RetryAfter(seconds));
        }

        let description = body
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("http status {status}"));
        tracing::warn!(method, description = %self.redact(&description), "telegram api error");
        Err(TransportError::Api {
            description: self.redact(&description),
        })
    }
}

fn translate_update(value: &Value) -> Option<ChatUpdate> {
    let update_id = value.get("update_id")?.as_i64()?;

    if let Some(callback) = value.get("callback_query") {
        let message = callback.get("message");
        return Some(ChatUpdate {
            platform: "telegram".to_string(),
            kind: UpdateKind::CallbackQuery,
            update_id,
            channel_id: message
                .and_then(|m| m.get("chat"))
                .and_then(|c| c.get("id"))
                .and_then(Value::as_i64)
                .unwrap_or(0),
            thread_id: message
                .and_then(|m| m.get("message_thread_id"))
                .and_then(Value::as_i64),
            message_id: message
                .and_then(|m| m.get("message_id"))
                .and_then(Value::as_i64)
                .unwrap_or(0),
            text: String::new(),
            user_id: callback
                .get("from")
                .and_then(|f| f.get("id"))
                .and_then(Value::as_i64),
            reply_to_message_id: None,
            reply_to_text: None,
            callback_id: callback
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string),
            callback_data: callback
                .get("data")
                .and_then(Value::as_str)
                .map(str::to_string),
            callback_message_id: message
                .and_then(|m| m.get("message_id"))
                .and_then(Value::as_i64),
        });
    }

    let message = value.get("message")?;
    let text = message.get("text")?.as_str()?;
    let reply = message.get("reply_to_message");
    Some(ChatUpdate {
        platform: "telegram".to_string(),
        kind: UpdateKind::Message,
        update_id,
        channel_id: message.get("chat")?.get("id")?.as_i64()?,
        thread_id: message.get("message_thread_id").and_then(Value::as_i64),
        message_id: message.get("message_id")?.as_i64()?,
        text: text.to_string(),
        user_id: message
            .get("from")
            .and_then(|f| f.get("id"))
            .and_then(Value::as_i64),
        reply_to_message_id: reply
            .and_then(|r| r.get("message_id"))
            .and_then(Value::as_i64),
        reply_to_text: reply
            .and_then(|r| r.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string),
        callback_id: None,
        callback_data: None,
        callback_message_id: None,
    })
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(&self, request: SendRequest) -> Result<MessageRef, TransportError> {
        let mut payload = json!({
            "chat_id": request.channel_id,
            "text": request.text,
        });
        if let Some(thread_id) = request.thread_id {
            payload["message_thread_id"] = json!(thread_id);
        }
        if let Some(reply_to) = request.reply_to_message_id {
            payload["reply_to_message_id"] = json!(reply_to);
            payload["allow_sending_without_reply"] = json!(true);
        }
        if request.disable_notification {
            payload["disable_notification"] = json!(true);
        }
        if let Some(markup) = &request.reply_markup {
            payload["reply_markup"] = markup.clone();
        }

        let result = self.post("sendMessage", payload).await?;
        let message_id = result
            .get("message_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| TransportError::Api {
                description: "sendMessage result missing message_id".to_string(),
            })?;
        Ok(MessageRef {
            platform: "telegram".to_string(),
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
        self.post(
            "editMessageText",
            json!({
                "chat_id": channel_id,
                "message_id": message_id,
                "text": text,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn delete_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<(), TransportError> {
        self.post(
            "deleteMessage",
            json!({"chat_id": channel_id, "message_id": message_id}),
        )
        .await
        .map(|_| ())
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_s: u64,
    ) -> Result<Vec<ChatUpdate>, TransportError> {
        let mut payload = json!({
            "timeout": timeout_s,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        let result = self.post("getUpdates", payload).await?;
        let updates = result
            .as_array()
            .map(|entries| entries.iter().filter_map(translate_update).collect())
            .unwrap_or_default();
        Ok(updates)
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<String>,
    ) -> Result<(), TransportError> {
        let mut payload = json!({"callback_query_id": callback_id});
        if let Some(text) = text {
            payload["text"] = json!(text);
        }
        self.post("answerCallbackQuery", payload).await.map(|_| ())
    }

    async fn edit_reply_markup(
        &self,
        channel_id: i64,
        message_id: i64,
        markup: Value,
    ) -> Result<(), TransportError> {
        self.post(
            "editMessageReplyMarkup",
            json!({
                "chat_id": channel_id,
                "message_id": message_id,
                "reply_markup": markup,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn create_forum_topic(
        &self,
        channel_id: i64,
        name: &str,
    ) -> Result<i64, TransportError> {
        let result = self
            .post(
                "createForumTopic",
                json!({"chat_id": channel_id, "name": name}),
            )
            .await?;
        result
            .get("message_thread_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| TransportError::Api {
                description: "createForumTopic result missing message_thread_id".to_string(),
            })
    }

    async fn set_my_commands(&self, commands: Vec<BotCommand>) -> Result<(), TransportError> {
        self.post("setMyCommands", json!({"commands": commands}))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
#[path = "telegram_tests.rs"]
mod tests;
