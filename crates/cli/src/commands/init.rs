// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay init`: create a workspace config

use anyhow::{bail, Result};
use clap::Args;
use relay_config::{
    save_workspace_config, WorkspaceConfig, WORKSPACE_CONFIG_DIR, WORKSPACE_CONFIG_FILE,
};

#[derive(Args)]
pub struct InitArgs {
    /// Workspace name (defaults to the directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Telegram bot token
    #[arg(long)]
    pub bot_token: Option<String>,

    /// Telegram group chat ID
    #[arg(long, allow_hyphen_values = true)]
    pub chat_id: Option<i64>,

    /// Default engine
    #[arg(long, default_value = "claude")]
    pub engine: String,
}

pub fn run(args: InitArgs) -> Result<i32> {
    let root = std::env::current_dir()?;
    let config_path = root.join(WORKSPACE_CONFIG_DIR).join(WORKSPACE_CONFIG_FILE);
    if config_path.exists() {
        bail!("workspace already initialized at {}", config_path.display());
    }

    let name = args.name.unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("workspace")
            .to_string()
    });

    let mut config = WorkspaceConfig::new(name, root.clone());
    config.default_engine = relay_core::EngineId::new(args.engine);

    let mut telegram = toml::Table::new();
    if let Some(token) = args.bot_token {
        telegram.insert("bot_token".into(), toml::Value::String(token));
    }
    if let Some(chat_id) = args.chat_id {
        telegram.insert("chat_id".into(), toml::Value::Integer(chat_id));
    }
    if !telegram.is_empty() {
        config.transports.insert("telegram".into(), telegram);
    }

    save_workspace_config(&config)?;
    println!("created {}", config_path.display());
    if config.transport_config("telegram").is_none() {
        println!("add [transports.telegram] bot_token and chat_id before `relay run`");
    }
    Ok(0)
}
