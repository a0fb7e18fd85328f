//! Spec: rapid-fire messages debounce into one turn

use crate::prelude::*;
use relay_engines::ScriptRunner;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn rapid_messages_become_one_run_with_combined_prompt() {
    let runner = Arc::new(ScriptRunner::answering("claude", "S1", "handled"));
    let h = SpecHarness::start(Arc::clone(&runner), vec![], "claude").await;

    // Three messages inside the 200ms window.
    h.user_message(10, "first");
    tokio::time::sleep(Duration::from_millis(30)).await;
    h.user_message(11, "second");
    tokio::time::sleep(Duration::from_millis(30)).await;
    h.user_message(12, "third");

    let probe = Arc::clone(&runner);
    wait_until(move || probe.run_count() >= 1).await;
    // Let any stragglers dispatch before asserting exactly-once.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let requests = runner.requests();
    assert_eq!(requests.len(), 1, "one batched run, got {requests:?}");
    assert_eq!(requests[0].prompt, "first\nsecond\nthird");

    // One progress message for the whole batch.
    let sends = h.api.calls_for("send_message");
    assert_eq!(sends.len(), 1);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn messages_outside_window_run_separately() {
    let runner = Arc::new(ScriptRunner::answering("claude", "S1", "ok"));
    let h = SpecHarness::start(Arc::clone(&runner), vec![], "claude").await;

    h.user_message(10, "first");
    // Past the debounce window: the first batch fires alone.
    tokio::time::sleep(Duration::from_millis(400)).await;
    h.user_message(11, "second");

    let probe = Arc::clone(&runner);
    wait_until(move || probe.run_count() >= 2).await;
    let prompts: Vec<String> = runner
        .requests()
        .into_iter()
        .map(|request| request.prompt)
        .collect();
    assert!(prompts.contains(&"first".to_string()));
    assert!(prompts.contains(&"second".to_string()));
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn slash_command_bypasses_the_batch() {
    let runner = Arc::new(ScriptRunner::answering("claude", "S1", "ok"));
    let h = SpecHarness::start(Arc::clone(&runner), vec![], "claude").await;

    h.user_message(10, "pending thought");
    // The slash command flushes the pending batch and rides alone.
    h.user_message(11, "/cancel");

    let api = h.api.clone();
    wait_until(move || {
        api.sent_texts()
            .iter()
            .any(|text| text.contains("No active run to cancel"))
    })
    .await;

    let probe = Arc::clone(&runner);
    wait_until(move || probe.run_count() >= 1).await;
    assert_eq!(runner.requests()[0].prompt, "pending thought");
    h.stop().await;
}
