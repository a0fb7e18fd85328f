//! Spec: the happy turn

use crate::prelude::*;
use relay_core::ActionKind;
use relay_engines::{ScriptRunner, ScriptStep};
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn happy_turn_streams_progress_and_finalizes_in_place() {
    let runner = Arc::new(ScriptRunner::new(
        "claude",
        vec![
            ScriptStep::started("S1"),
            ScriptStep::action_started("cmd1", ActionKind::Command, "ls -la"),
            ScriptStep::Sleep(std::time::Duration::from_millis(250)),
            ScriptStep::action_completed("cmd1", ActionKind::Command, "ls -la", true),
            ScriptStep::returns("done"),
        ],
    ));
    let h = SpecHarness::start(Arc::clone(&runner), vec![], "claude").await;

    h.user_message(10, "hello");

    let api = h.api.clone();
    wait_until(move || {
        api.message_text(FIRST_PROGRESS_ID)
            .is_some_and(|text| text.contains("✅") && text.contains("done"))
    })
    .await;

    // The engine ran once, in the folder, with the raw prompt.
    let requests = runner.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt, "hello");
    assert!(requests[0]
        .cwd
        .as_ref()
        .is_some_and(|cwd| cwd.ends_with("backend")));

    // Only the initial progress send; everything after was an edit in place.
    assert_eq!(h.api.calls_for("send_message").len(), 1);

    // Final body: answer plus routing footer, resume line only in the footer.
    let final_text = h.api.message_text(FIRST_PROGRESS_ID).unwrap();
    assert!(final_text.contains("done"));
    assert!(final_text.contains("`ctx: backend`"));
    assert!(final_text.contains("`claude resume S1`"));

    // Progress edits carried the streamed action and the resume footer.
    let edits = h.api.edit_texts();
    assert!(edits.iter().any(|text| text.contains("ls -la")));
    assert!(edits.iter().any(|text| text.contains("`claude resume S1`")));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_engine_turn_reports_error_in_place() {
    let runner = Arc::new(ScriptRunner::new(
        "claude",
        vec![ScriptStep::started("S1"), ScriptStep::fails("it broke")],
    ));
    let h = SpecHarness::start(Arc::clone(&runner), vec![], "claude").await;

    h.user_message(10, "try something");
    let api = h.api.clone();
    wait_until(move || {
        api.message_text(FIRST_PROGRESS_ID)
            .is_some_and(|text| text.contains("❌"))
    })
    .await;

    let final_text = h.api.message_text(FIRST_PROGRESS_ID).unwrap();
    assert!(final_text.contains("it broke"));
    assert!(final_text.contains("`claude resume S1`"));
    h.stop().await;
}
