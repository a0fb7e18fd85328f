// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport backend protocol and the Telegram builtin

use async_trait::async_trait;
use indexmap::IndexMap;
use relay_adapters::{BotClient, OutboxPacing, TelegramClient};
use relay_bridge::{run_workspace_loop, BridgeConfig, BridgeError, CommandBackend};
use relay_config::WorkspaceConfig;
use relay_engines::AutoRouter;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result of checking whether a transport is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupResult {
    pub ready: bool,
    pub message: String,
}

impl SetupResult {
    pub fn ready(message: impl Into<String>) -> Self {
        Self {
            ready: true,
            message: message.into(),
        }
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self {
            ready: false,
            message: message.into(),
        }
    }
}

/// Errors from running a transport
#[derive(Debug, Error)]
pub enum TransportRunError {
    #[error("transport {id} is not configured: {message}")]
    NotConfigured { id: String, message: String },
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Everything a transport needs to drive the platform loop
pub struct TransportContext {
    pub workspace: WorkspaceConfig,
    pub engines: Arc<AutoRouter>,
    pub commands: IndexMap<String, Arc<dyn CommandBackend>>,
    pub startup_msg: Option<String>,
    pub progress_edit_every: Duration,
    pub shutdown: CancellationToken,
}

/// A chat platform backend
#[async_trait]
pub trait TransportBackend: Send + Sync {
    fn id(&self) -> &str;

    /// Whether the workspace config has what this transport needs.
    fn check_setup(&self, config: &WorkspaceConfig) -> SetupResult;

    /// Token identifying the bot account, for the single-process lock.
    /// Derived values only, never the raw credential.
    fn lock_token(&self, config: &WorkspaceConfig) -> Option<String>;

    /// Build the platform client and run the message loop to completion.
    async fn build_and_run(&self, ctx: TransportContext) -> Result<(), TransportRunError>;
}

/// Telegram: long-poll `getUpdates` against a bot in a forum group
#[derive(Debug, Default, Clone, Copy)]
pub struct TelegramTransportBackend;

impl TelegramTransportBackend {
    fn credentials(config: &WorkspaceConfig) -> Result<(String, i64), String> {
        let Some(table) = config.transport_config("telegram") else {
            return Err("missing [telegram] config. Run `relay init` to configure.".to_string());
        };
        let token = table
            .get("bot_token")
            .and_then(toml::Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| "missing bot_token. Run `relay init` to configure.".to_string())?;
        let chat_id = table
            .get("chat_id")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| "missing chat_id. Run `relay init` to configure.".to_string())?;
        Ok((token.to_string(), chat_id))
    }
}

#[async_trait]
impl TransportBackend for TelegramTransportBackend {
    fn id(&self) -> &str {
        "telegram"
    }

    fn check_setup(&self, config: &WorkspaceConfig) -> SetupResult {
        match Self::credentials(config) {
            Ok((_, chat_id)) => SetupResult::ready(format!("Telegram configured (chat {chat_id})")),
            Err(message) => SetupResult::not_ready(message),
        }
    }

    fn lock_token(&self, config: &WorkspaceConfig) -> Option<String> {
        let (token, _) = Self::credentials(config).ok()?;
        let digest = Sha256::digest(token.as_bytes());
        Some(format!("telegram:{digest:x}"))
    }

    async fn build_and_run(&self, ctx: TransportContext) -> Result<(), TransportRunError> {
        let (token, chat_id) =
            Self::credentials(&ctx.workspace).map_err(|message| {
                TransportRunError::NotConfigured {
                    id: self.id().to_string(),
                    message,
                }
            })?;

        tracing::info!(chat_id, "starting telegram transport");
        let bot = BotClient::new(TelegramClient::new(token), OutboxPacing::default());
        run_workspace_loop(BridgeConfig {
            bot,
            channel_id: chat_id,
            workspace: ctx.workspace,
            engines: ctx.engines,
            commands: ctx.commands,
            startup_msg: ctx.startup_msg,
            progress_edit_every: ctx.progress_edit_every,
            shutdown: ctx.shutdown,
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "transport_backend_tests.rs"]
mod tests;
