// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

fn configured_workspace() -> WorkspaceConfig {
    let mut config = WorkspaceConfig::new("demo", PathBuf::from("/ws"));
    let mut telegram = toml::Table::new();
    telegram.insert(
        "bot_token".into(),
        toml::Value::String("123:abcDEF".into()),
    );
    telegram.insert("chat_id".into(), toml::Value::Integer(-100));
    config.transports.insert("telegram".into(), telegram);
    config
}

#[test]
fn check_setup_ready_with_credentials() {
    let result = TelegramTransportBackend.check_setup(&configured_workspace());
    assert!(result.ready);
    assert!(result.message.contains("-100"));
}

#[test]
fn check_setup_missing_section() {
    let config = WorkspaceConfig::new("demo", PathBuf::from("/ws"));
    let result = TelegramTransportBackend.check_setup(&config);
    assert!(!result.ready);
    assert!(result.message.contains("[telegram]"));
}

#[test]
fn check_setup_missing_token() {
    let mut config = WorkspaceConfig::new("demo", PathBuf::from("/ws"));
    let mut telegram = toml::Table::new();
    telegram.insert("chat_id".into(), toml::Value::Integer(-100));
    config.transports.insert("telegram".into(), telegram);
    let result = TelegramTransportBackend.check_setup(&config);
    assert!(!result.ready);
    assert!(result.message.contains("bot_token"));
}

#[test]
fn check_setup_missing_chat_id() {
    let mut config = WorkspaceConfig::new("demo", PathBuf::from("/ws"));
    let mut telegram = toml::Table::new();
    telegram.insert("bot_token".into(), toml::Value::String("123:abc".into()));
    config.transports.insert("telegram".into(), telegram);
    let result = TelegramTransportBackend.check_setup(&config);
    assert!(!result.ready);
    assert!(result.message.contains("chat_id"));
}

#[test]
fn lock_token_is_stable_and_redacted() {
    let config = configured_workspace();
    let token = TelegramTransportBackend.lock_token(&config).unwrap();
    assert!(token.starts_with("telegram:"));
    assert!(!token.contains("123:abcDEF"), "raw credential must not leak");
    assert_eq!(TelegramTransportBackend.lock_token(&config), Some(token));
}

#[test]
fn lock_token_none_without_credentials() {
    let config = WorkspaceConfig::new("demo", PathBuf::from("/ws"));
    assert!(TelegramTransportBackend.lock_token(&config).is_none());
}

#[tokio::test]
async fn build_and_run_without_credentials_errors() {
    let ctx = TransportContext {
        workspace: WorkspaceConfig::new("demo", PathBuf::from("/ws")),
        engines: Arc::new(
            relay_engines::AutoRouter::new(
                vec![relay_engines::RunnerEntry::unavailable(
                    // A placeholder runner is enough; the run fails before use.
                    Arc::new(NoopRunner),
                    "unused",
                )],
                relay_core::EngineId::new("noop"),
            )
            .unwrap(),
        ),
        commands: IndexMap::new(),
        startup_msg: None,
        progress_edit_every: Duration::from_secs(1),
        shutdown: CancellationToken::new(),
    };
    let err = TelegramTransportBackend.build_and_run(ctx).await.unwrap_err();
    assert!(matches!(err, TransportRunError::NotConfigured { .. }));
}

#[derive(Debug)]
struct NoopRunner;

#[async_trait]
impl relay_engines::Runner for NoopRunner {
    fn engine(&self) -> &relay_core::EngineId {
        static ENGINE: std::sync::OnceLock<relay_core::EngineId> = std::sync::OnceLock::new();
        ENGINE.get_or_init(|| relay_core::EngineId::new("noop"))
    }

    fn format_resume(
        &self,
        _token: &relay_core::ResumeToken,
    ) -> Result<String, relay_engines::RunnerError> {
        Ok(String::new())
    }

    fn extract_resume(&self, _text: &str) -> Option<relay_core::ResumeToken> {
        None
    }

    fn is_resume_line(&self, _line: &str) -> bool {
        false
    }

    async fn run(
        &self,
        _request: relay_engines::RunRequest,
        _events: tokio::sync::mpsc::Sender<relay_core::EngineEvent>,
        _cancel: CancellationToken,
    ) -> Result<(), relay_engines::RunnerError> {
        Ok(())
    }
}
