//! Spec: cancelling a turn mid-stream

use crate::prelude::*;
use relay_core::ActionKind;
use relay_engines::{ScriptRunner, ScriptStep};
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn cancel_reply_kills_run_and_renders_cancelled() {
    let runner = Arc::new(ScriptRunner::new(
        "claude",
        vec![
            ScriptStep::started("S1"),
            ScriptStep::action_started("cmd1", ActionKind::Command, "long build"),
            ScriptStep::WaitCancel,
        ],
    ));
    let h = SpecHarness::start(Arc::clone(&runner), vec![], "claude").await;

    h.user_message(10, "do something long");

    // Wait for the run to be streaming.
    let probe = Arc::clone(&runner);
    wait_until(move || probe.run_count() == 1).await;
    let api = h.api.clone();
    wait_until(move || api.message_text(FIRST_PROGRESS_ID).is_some()).await;

    // User replies /cancel to the progress message.
    h.user_reply(11, "/cancel", FIRST_PROGRESS_ID, "progress body");

    let api = h.api.clone();
    wait_until(move || {
        api.message_text(FIRST_PROGRESS_ID)
            .is_some_and(|text| text.contains("cancelled"))
    })
    .await;

    // The engine run actually ended.
    wait_until(|| runner.run_spans().len() == 1).await;

    // Status is cancelled and the learned token is preserved in the footer.
    let final_text = h.api.message_text(FIRST_PROGRESS_ID).unwrap();
    assert!(final_text.contains("🚫"));
    assert!(final_text.contains("`claude resume S1`"));
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn cancel_with_wrong_reply_target_is_harmless() {
    let runner = Arc::new(ScriptRunner::answering("claude", "S1", "ok"));
    let h = SpecHarness::start(Arc::clone(&runner), vec![], "claude").await;

    h.user_reply(11, "/cancel", 999, "not a progress message");
    let api = h.api.clone();
    wait_until(move || {
        api.sent_texts()
            .iter()
            .any(|text| text.contains("No active run to cancel"))
    })
    .await;
    assert_eq!(runner.run_count(), 0);
    h.stop().await;
}
