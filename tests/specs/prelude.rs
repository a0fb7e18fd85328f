//! Test harness for behavioral specifications.
//!
//! Boots the workspace loop against a [`FakeChatApi`] and scripted engines,
//! with helpers to push updates and await observable effects.

#![allow(dead_code)]

use indexmap::IndexMap;
use relay_adapters::{BotClient, FakeChatApi, OutboxPacing};
use relay_bridge::{run_workspace_loop, BridgeConfig, BridgeError};
use relay_config::{FolderConfig, WorkspaceConfig};
use relay_core::EngineId;
use relay_engines::{AutoRouter, RunnerEntry, Runner, ScriptRunner};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const CHANNEL: i64 = -100;
pub const BACKEND_TOPIC: i64 = 100;

/// First message the fake API hands out is ID 2; with one progress message
/// per turn, that progress message is ID 2.
pub const FIRST_PROGRESS_ID: i64 = 2;

pub struct SpecHarness {
    pub api: FakeChatApi,
    pub shutdown: CancellationToken,
    pub handle: tokio::task::JoinHandle<Result<(), BridgeError>>,
    _workspace_dir: tempfile::TempDir,
}

impl SpecHarness {
    /// Start the loop with one scripted engine (plus any extra entries),
    /// and wait until it is polling (startup drains the backlog, so pushing
    /// updates earlier would lose them).
    pub async fn start(
        runner: Arc<ScriptRunner>,
        extra_entries: Vec<RunnerEntry>,
        default_engine: &str,
    ) -> Self {
        let workspace_dir = tempfile::tempdir().expect("workspace dir");
        std::fs::create_dir_all(workspace_dir.path().join("backend")).expect("backend dir");
        let mut workspace = WorkspaceConfig::new("specs", workspace_dir.path().to_path_buf());
        workspace.add_folder(FolderConfig {
            name: "backend".to_string(),
            path: "backend".to_string(),
            topic_id: Some(BACKEND_TOPIC),
            ..FolderConfig::default()
        });

        let mut entries = vec![RunnerEntry::available(runner as Arc<dyn Runner>)];
        entries.extend(extra_entries);
        let engines = Arc::new(
            AutoRouter::new(entries, EngineId::new(default_engine)).expect("router"),
        );

        let api = FakeChatApi::new();
        let shutdown = CancellationToken::new();
        let cfg = BridgeConfig {
            bot: BotClient::new(api.clone(), OutboxPacing::none()),
            channel_id: CHANNEL,
            workspace,
            engines,
            commands: IndexMap::new(),
            startup_msg: None,
            progress_edit_every: Duration::from_millis(100),
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(run_workspace_loop(cfg));
        let harness = Self {
            api,
            shutdown,
            handle,
            _workspace_dir: workspace_dir,
        };
        let probe = harness.api.clone();
        wait_until(move || !probe.calls_for("set_my_commands").is_empty()).await;
        harness
    }

    /// Push a user message into the backend topic.
    pub fn user_message(&self, message_id: i64, text: &str) {
        self.api
            .push_message(CHANNEL, Some(BACKEND_TOPIC), message_id, text, None, None);
    }

    /// Push a reply to an earlier message.
    pub fn user_reply(
        &self,
        message_id: i64,
        text: &str,
        reply_to: i64,
        reply_text: &str,
    ) {
        self.api.push_message(
            CHANNEL,
            Some(BACKEND_TOPIC),
            message_id,
            text,
            Some(reply_to),
            Some(reply_text),
        );
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.handle.await.expect("join").expect("loop result");
    }
}

/// Poll until the condition holds; panics after ~5 virtual seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
