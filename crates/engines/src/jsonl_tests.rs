// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_core::Usage;
use std::time::Duration;

/// Dialect driving `sh -c <script>` so tests exercise the real subprocess
/// plumbing with deterministic output.
#[derive(Debug)]
struct ShellDialect {
    engine: EngineId,
    script: String,
}

impl ShellDialect {
    fn new(script: &str) -> Self {
        Self {
            engine: EngineId::new("fake"),
            script: script.to_string(),
        }
    }
}

impl EngineDialect for ShellDialect {
    type State = ();

    fn engine(&self) -> &EngineId {
        &self.engine
    }

    fn title(&self) -> &str {
        "Fake"
    }

    fn command(&self) -> &str {
        "sh"
    }

    fn new_state(&self, _prompt: &str, _resume: Option<&ResumeToken>) -> Self::State {}

    fn build_args(
        &self,
        _prompt: &str,
        _resume: Option<&ResumeToken>,
        _state: &Self::State,
    ) -> Vec<String> {
        vec!["-c".to_string(), self.script.clone()]
    }

    fn translate(
        &self,
        value: serde_json::Value,
        _state: &mut Self::State,
    ) -> Result<Vec<EngineEvent>, TranslateError> {
        let engine = self.engine.clone();
        let kind = value.get("type").and_then(serde_json::Value::as_str);
        match kind {
            Some("started") => {
                let session = value
                    .get("session")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("s1");
                Ok(vec![EngineEvent::Started {
                    engine: engine.clone(),
                    resume: ResumeToken::new(engine, session),
                    title: "Fake".to_string(),
                    meta: None,
                }])
            }
            Some("act") => Ok(vec![EngineEvent::Action {
                engine: engine.clone(),
                action: Action::new("a1", ActionKind::Command, "work"),
                phase: ActionPhase::Completed,
                ok: Some(true),
                message: None,
                level: None,
            }]),
            Some("done") => Ok(vec![EngineEvent::Completed {
                engine,
                ok: true,
                answer: value
                    .get("answer")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("done")
                    .to_string(),
                resume: None,
                error: None,
                usage: Some(Usage::default()),
            }]),
            Some("boom") => Err(TranslateError::new("unsupported payload")),
            _ => Ok(vec![]),
        }
    }
}

async fn run_collect(
    script: &str,
    resume: Option<ResumeToken>,
) -> (Result<(), RunnerError>, Vec<EngineEvent>) {
    let runner = JsonlRunner::new(ShellDialect::new(script));
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let request = RunRequest::new("hello").with_resume(resume);
    let result = runner.run(request, tx, cancel).await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (result, events)
}

fn completed_of(events: &[EngineEvent]) -> Option<(bool, String, Option<String>)> {
    events.iter().find_map(|event| match event {
        EngineEvent::Completed {
            ok, answer, error, ..
        } => Some((*ok, answer.clone(), error.clone())),
        _ => None,
    })
}

#[tokio::test]
async fn happy_stream_yields_started_action_completed() {
    let script = r#"
echo '{"type":"started","session":"S1"}'
echo '{"type":"act"}'
echo '{"type":"done","answer":"all good"}'
"#;
    let (result, events) = run_collect(script, None).await;
    result.unwrap();
    let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["started", "action", "completed"]);
    assert_eq!(
        completed_of(&events),
        Some((true, "all good".to_string(), None))
    );
}

#[tokio::test]
async fn prompt_reaches_stdin() {
    let script = r#"read line; echo "{\"type\":\"done\",\"answer\":\"$line\"}""#;
    let (result, events) = run_collect(script, None).await;
    result.unwrap();
    let (_, answer, _) = completed_of(&events).unwrap();
    assert_eq!(answer, "hello");
}

#[tokio::test]
async fn invalid_json_becomes_warning_and_run_continues() {
    let script = r#"
echo 'this is not json'
echo '{"type":"done"}'
"#;
    let (result, events) = run_collect(script, None).await;
    result.unwrap();
    let warning = events
        .iter()
        .find_map(|event| match event {
            EngineEvent::Action { action, level, .. } if action.kind == ActionKind::Warning => {
                Some((action.clone(), *level))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(warning.1, Some(NoteLevel::Warning));
    assert_eq!(
        warning.0.detail["line"],
        serde_json::json!("this is not json")
    );
    assert!(completed_of(&events).unwrap().0);
}

#[tokio::test]
async fn translate_error_becomes_warning_with_type_tag() {
    let script = r#"
echo '{"type":"boom","item":{"type":"widget"}}'
echo '{"type":"done"}'
"#;
    let (result, events) = run_collect(script, None).await;
    result.unwrap();
    let warning = events
        .iter()
        .find_map(|event| match event {
            EngineEvent::Action { action, .. } if action.kind == ActionKind::Warning => {
                Some(action.clone())
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(warning.detail["type"], serde_json::json!("boom"));
    assert_eq!(warning.detail["item_type"], serde_json::json!("widget"));
}

#[tokio::test]
async fn eof_without_completed_synthesizes_failure() {
    let script = r#"echo '{"type":"started","session":"S1"}'"#;
    let (result, events) = run_collect(script, None).await;
    result.unwrap();
    let (ok, _, error) = completed_of(&events).unwrap();
    assert!(!ok);
    assert!(error.unwrap().contains("finished without a result"));
    // The synthetic completion still carries the learned session.
    let resume = events.iter().find_map(|event| match event {
        EngineEvent::Completed { resume, .. } => resume.clone(),
        _ => None,
    });
    assert_eq!(resume.unwrap().value, "S1");
}

#[tokio::test]
async fn nonzero_exit_adds_warning_and_failed_completion() {
    let script = r#"exit 3"#;
    let (result, events) = run_collect(script, None).await;
    result.unwrap();
    let has_rc_warning = events.iter().any(|event| matches!(
        event,
        EngineEvent::Action { message: Some(m), .. } if m.contains("rc=3")
    ));
    assert!(has_rc_warning, "events: {events:?}");
    let (ok, _, error) = completed_of(&events).unwrap();
    assert!(!ok);
    assert!(error.unwrap().contains("rc=3"));
}

#[tokio::test]
async fn duplicate_started_is_suppressed() {
    let script = r#"
echo '{"type":"started","session":"S1"}'
echo '{"type":"started","session":"S1"}'
echo '{"type":"done"}'
"#;
    let (result, events) = run_collect(script, None).await;
    result.unwrap();
    let started_count = events.iter().filter(|e| e.name() == "started").count();
    assert_eq!(started_count, 1);
}

#[tokio::test]
async fn session_drift_fails_the_run() {
    let script = r#"
echo '{"type":"started","session":"S1"}'
echo '{"type":"started","session":"S2"}'
echo '{"type":"done"}'
"#;
    let (result, _) = run_collect(script, None).await;
    assert!(matches!(result, Err(RunnerError::SessionDrift { .. })));
}

#[tokio::test]
async fn expected_session_mismatch_fails_the_run() {
    let script = r#"echo '{"type":"started","session":"S2"}'"#;
    let resume = Some(ResumeToken::new("fake", "S1"));
    let (result, _) = run_collect(script, resume).await;
    assert!(matches!(result, Err(RunnerError::SessionDrift { .. })));
}

#[tokio::test]
async fn wrong_engine_resume_token_is_rejected() {
    let resume = Some(ResumeToken::new("other", "S1"));
    let (result, _) = run_collect("echo hi", resume).await;
    assert!(matches!(result, Err(RunnerError::WrongEngine { .. })));
}

#[tokio::test]
async fn cancel_terminates_the_subprocess() {
    let runner = JsonlRunner::new(ShellDialect::new(
        r#"echo '{"type":"started","session":"S1"}'; sleep 30"#,
    ));
    let (tx, mut rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { runner.run(RunRequest::new("hi"), tx, cancel).await })
    };

    // Wait for the run to actually start.
    let started = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    assert_eq!(started.unwrap().name(), "started");

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("cancel must terminate the engine promptly")
        .unwrap();
    result.unwrap();
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    #[derive(Debug)]
    struct MissingDialect(EngineId);
    impl EngineDialect for MissingDialect {
        type State = ();
        fn engine(&self) -> &EngineId {
            &self.0
        }
        fn title(&self) -> &str {
            "Missing"
        }
        fn command(&self) -> &str {
            "definitely-not-a-real-binary-xyz"
        }
        fn new_state(&self, _prompt: &str, _resume: Option<&ResumeToken>) {}
        fn build_args(
            &self,
            _prompt: &str,
            _resume: Option<&ResumeToken>,
            _state: &(),
        ) -> Vec<String> {
            vec![]
        }
        fn translate(
            &self,
            _value: serde_json::Value,
            _state: &mut (),
        ) -> Result<Vec<EngineEvent>, TranslateError> {
            Ok(vec![])
        }
    }

    let runner = JsonlRunner::new(MissingDialect(EngineId::new("missing")));
    let (tx, _rx) = mpsc::channel(4);
    let result = runner
        .run(RunRequest::new("hi"), tx, CancellationToken::new())
        .await;
    assert!(matches!(result, Err(RunnerError::Spawn { .. })));
}
