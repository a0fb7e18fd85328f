//! Spec: the outbox under a rate-limit storm

use relay_adapters::{BotClient, FakeChatApi, OutboxPacing};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn edit_storm_with_retry_after_sends_latest_body() {
    let api = FakeChatApi::new();
    // The platform answers the first call with retry_after = 2s.
    api.script_retry_after(1, 2.0);
    let client = BotClient::new(api.clone(), OutboxPacing::none());

    // Twenty rapid fire-and-forget edits to the same message.
    for n in 0..20 {
        client
            .edit_message(-100, 42, format!("progress body {n}"), false)
            .await
            .expect("fire-and-forget edits never error");
    }

    assert!(client.flush(Duration::from_secs(10)).await);

    // At most two API calls got through; the body that landed is the
    // newest one; nothing surfaced as an error.
    let edits = api.edit_texts();
    assert!(edits.len() <= 2, "expected ≤ 2 calls, saw {edits:?}");
    assert_eq!(api.message_text(42).as_deref(), Some("progress body 19"));
}

#[tokio::test(start_paused = true)]
async fn channel_pacing_holds_between_calls() {
    let api = FakeChatApi::new();
    let client = BotClient::new(
        api.clone(),
        OutboxPacing {
            private_interval: Duration::from_millis(500),
            group_interval: Duration::from_millis(1000),
        },
    );

    for n in 0..3 {
        client
            .edit_message(-100, 42, format!("tick {n}"), false)
            .await
            .expect("enqueue");
        // Distinct bodies per pacing slot so nothing coalesces away.
        tokio::time::sleep(Duration::from_millis(1100)).await;
    }
    assert!(client.flush(Duration::from_secs(10)).await);

    let calls = api.calls_for("edit_message_text");
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        let gap = pair[1].at - pair[0].at;
        assert!(
            gap >= client.interval_for(-100),
            "calls only {gap:?} apart"
        );
    }
}
