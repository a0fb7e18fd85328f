//! Spec: resume routing and session serialization

use crate::prelude::*;
use relay_engines::{RunnerEntry, Runner, ScriptRunner, ScriptStep};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn reply_with_resume_footer_resumes_the_session() {
    let runner = Arc::new(ScriptRunner::answering("claude", "S1", "resumed fine"));
    let h = SpecHarness::start(Arc::clone(&runner), vec![], "claude").await;

    h.user_reply(
        20,
        "continue please",
        15,
        "earlier answer\n\n`ctx: backend`\n`claude resume S1`",
    );

    let probe = Arc::clone(&runner);
    wait_until(move || probe.run_count() == 1).await;
    let request = runner.requests()[0].clone();
    assert_eq!(request.prompt, "continue please");
    assert_eq!(request.resume.as_ref().map(|r| r.value.as_str()), Some("S1"));
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn follow_up_waits_for_in_flight_first_turn() {
    // First turn: session learned mid-run, then a long tail.
    let runner = Arc::new(ScriptRunner::new(
        "claude",
        vec![
            ScriptStep::started("S1"),
            ScriptStep::Sleep(Duration::from_millis(500)),
            ScriptStep::returns("first done"),
        ],
    ));
    runner.push_script(vec![
        ScriptStep::started("S1"),
        ScriptStep::Sleep(Duration::from_millis(500)),
        ScriptStep::returns("first done"),
    ]);
    runner.push_script(vec![
        ScriptStep::started("S1"),
        ScriptStep::returns("second done"),
    ]);

    let h = SpecHarness::start(Arc::clone(&runner), vec![], "claude").await;

    h.user_message(10, "start the conversation");
    let probe = Arc::clone(&runner);
    wait_until(move || probe.run_count() == 1).await;

    // Rapid follow-up resuming the same session while turn one is running.
    h.user_reply(11, "and another thing", 9, "`claude resume S1`");

    let probe = Arc::clone(&runner);
    wait_until(move || probe.run_count() == 2).await;
    let probe = Arc::clone(&runner);
    wait_until(move || probe.run_spans().len() == 2).await;

    let spans = runner.run_spans();
    assert!(
        spans[0].1 <= spans[1].0,
        "second turn must start after the first ends: {spans:?}"
    );
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn resume_in_text_beats_resume_in_reply() {
    let claude = Arc::new(ScriptRunner::answering("claude", "S1", "ok"));
    let h = SpecHarness::start(Arc::clone(&claude), vec![], "claude").await;

    h.user_reply(
        20,
        "`claude resume from-text`\ngo on",
        15,
        "`claude resume from-reply`",
    );

    let probe = Arc::clone(&claude);
    wait_until(move || probe.run_count() == 1).await;
    let request = claude.requests()[0].clone();
    assert_eq!(
        request.resume.as_ref().map(|r| r.value.as_str()),
        Some("from-text")
    );
    // The signature line never reaches the engine.
    assert_eq!(request.prompt, "go on");
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn resume_for_uninstalled_engine_is_a_user_error() {
    let claude = Arc::new(ScriptRunner::answering("claude", "S1", "ok"));
    let codex = Arc::new(ScriptRunner::answering("codex", "S9", "ok"));
    let codex_entry = RunnerEntry::unavailable(
        Arc::clone(&codex) as Arc<dyn Runner>,
        "codex not found on PATH",
    );
    let h = SpecHarness::start(Arc::clone(&claude), vec![codex_entry], "claude").await;

    h.user_reply(20, "continue", 15, "`codex resume S9`");

    let api = h.api.clone();
    wait_until(move || {
        api.sent_texts()
            .iter()
            .any(|text| text.contains("engine codex unavailable: codex not found on PATH"))
    })
    .await;
    assert_eq!(claude.run_count(), 0);
    assert_eq!(codex.run_count(), 0);
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn resume_only_prompt_becomes_continue() {
    let runner = Arc::new(ScriptRunner::answering("claude", "S1", "resumed"));
    let h = SpecHarness::start(Arc::clone(&runner), vec![], "claude").await;

    h.user_message(10, "`claude resume S1`");
    let probe = Arc::clone(&runner);
    wait_until(move || probe.run_count() == 1).await;
    assert_eq!(runner.requests()[0].prompt, "continue");
    h.stop().await;
}
