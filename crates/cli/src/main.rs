// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! relay - chat-driven agent orchestrator

mod commands;
mod startup;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "relay",
    version,
    about = "relay - route chat topics to AI-agent runs in workspace folders"
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Verbose logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workspace bridge (default)
    Run,
    /// Create a workspace config in the current directory
    Init(commands::init::InitArgs),
    /// Show workspace and engine status
    Info,
    /// List registered plugins
    Plugins,
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "relay=debug,info" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Some(directory) = &cli.directory {
        if let Err(err) = std::env::set_current_dir(directory) {
            eprintln!("error: cannot change to {}: {err}", directory.display());
            std::process::exit(1);
        }
    }

    let result: Result<i32> = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => startup::run_workspace().await,
        Commands::Init(args) => commands::init::run(args),
        Commands::Info => commands::info::run(),
        Commands::Plugins => commands::plugins::run(),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
