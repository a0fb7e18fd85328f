// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace manager: topic lifecycle and config mutations
//!
//! Admin commands mutate a cloned config, save it, and swap it in; readers
//! holding the previous snapshot stay consistent for their turn.

use parking_lot::Mutex;
use relay_adapters::{BotClient, ChatApi, MessageRef, SendRequest, TransportError};
use relay_config::{save_workspace_config, ConfigError, WorkspaceConfig};
use std::sync::Arc;

/// Owns the live workspace config and the channel it serves
pub struct WorkspaceManager<A: ChatApi> {
    bot: BotClient<A>,
    channel_id: i64,
    config: Arc<Mutex<WorkspaceConfig>>,
}

impl<A: ChatApi> Clone for WorkspaceManager<A> {
    fn clone(&self) -> Self {
        Self {
            bot: self.bot.clone(),
            channel_id: self.channel_id,
            config: Arc::clone(&self.config),
        }
    }
}

impl<A: ChatApi> WorkspaceManager<A> {
    pub fn new(bot: BotClient<A>, channel_id: i64, config: WorkspaceConfig) -> Self {
        Self {
            bot,
            channel_id,
            config: Arc::new(Mutex::new(config)),
        }
    }

    pub fn channel_id(&self) -> i64 {
        self.channel_id
    }

    /// Current config snapshot.
    pub fn config(&self) -> WorkspaceConfig {
        self.config.lock().clone()
    }

    /// Clone-mutate-save-swap. Returns the new snapshot.
    pub fn update_config(
        &self,
        mutate: impl FnOnce(&mut WorkspaceConfig),
    ) -> Result<WorkspaceConfig, ConfigError> {
        let mut updated = self.config();
        mutate(&mut updated);
        save_workspace_config(&updated)?;
        *self.config.lock() = updated.clone();
        Ok(updated)
    }

    /// Send a message into a topic (None = the General topic).
    pub async fn send_to_topic(
        &self,
        topic_id: Option<i64>,
        text: impl Into<String>,
    ) -> Result<MessageRef, TransportError> {
        self.bot
            .send_message(SendRequest {
                channel_id: self.channel_id,
                text: text.into(),
                thread_id: topic_id,
                reply_to_message_id: None,
                disable_notification: false,
                reply_markup: None,
            })
            .await
    }

    /// Reply to a specific message in a topic.
    pub async fn send_reply(
        &self,
        topic_id: Option<i64>,
        reply_to: i64,
        text: impl Into<String>,
    ) -> Result<MessageRef, TransportError> {
        self.bot
            .send_message(SendRequest {
                channel_id: self.channel_id,
                text: text.into(),
                thread_id: topic_id,
                reply_to_message_id: Some(reply_to),
                disable_notification: false,
                reply_markup: None,
            })
            .await
    }

    /// Create chat topics for folders still waiting for one.
    ///
    /// Returns `(folder, topic_id)` pairs for every topic created.
    pub async fn process_pending_topics(&self) -> Vec<(String, i64)> {
        let pending: Vec<String> = self
            .config()
            .pending_topics()
            .into_iter()
            .map(|folder| folder.name.clone())
            .collect();

        let mut created = Vec::new();
        for name in pending {
            match self.bot.create_forum_topic(self.channel_id, &name).await {
                Ok(topic_id) => {
                    let result = self.update_config(|config| {
                        config.set_folder_topic(&name, topic_id);
                    });
                    match result {
                        Ok(_) => {
                            tracing::info!(folder = %name, topic_id, "topic created");
                            created.push((name, topic_id));
                        }
                        Err(err) => {
                            tracing::error!(folder = %name, error = %err, "failed to save topic id");
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(folder = %name, error = %err, "topic creation failed");
                }
            }
        }
        created
    }

    /// Tell the user a topic has no folder bound to it.
    pub async fn send_unbound_topic_error(&self, topic_id: Option<i64>, reply_to: i64) {
        let _ = self
            .send_reply(
                topic_id,
                reply_to,
                "This topic is not bound to a folder. Use /add in the General topic to bind one.",
            )
            .await;
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
