// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

fn job(user_msg_id: i64, text: &str, token: &ResumeToken) -> ThreadJob {
    ThreadJob {
        channel_id: 1,
        thread_id: None,
        user_msg_id,
        text: text.to_string(),
        resume_token: token.clone(),
        engine: token.engine.clone(),
        cwd: None,
        run_ctx: None,
    }
}

fn token(value: &str) -> ResumeToken {
    ResumeToken::new("test_engine", value)
}

/// Scheduler whose run_job records (event, user_msg_id) pairs.
fn recording_scheduler(
    work: Duration,
) -> (ThreadScheduler, Arc<Mutex<Vec<(String, i64)>>>) {
    let log: Arc<Mutex<Vec<(String, i64)>>> = Arc::new(Mutex::new(Vec::new()));
    let run_log = Arc::clone(&log);
    let scheduler = ThreadScheduler::new(Arc::new(move |job: ThreadJob| {
        let log = Arc::clone(&run_log);
        Box::pin(async move {
            log.lock().push(("start".to_string(), job.user_msg_id));
            tokio::time::sleep(work).await;
            log.lock().push(("end".to_string(), job.user_msg_id));
        })
    }));
    (scheduler, log)
}

#[test]
fn thread_key_combines_engine_and_session() {
    assert_eq!(
        ThreadScheduler::thread_key(&token("session-123")),
        "test_engine:session-123"
    );
    let other = ResumeToken::new("other", "session-123");
    assert_ne!(
        ThreadScheduler::thread_key(&token("session-123")),
        ThreadScheduler::thread_key(&other)
    );
}

#[tokio::test(start_paused = true)]
async fn single_job_runs() {
    let (scheduler, log) = recording_scheduler(Duration::from_millis(10));
    scheduler.enqueue(job(1, "hello", &token("s1")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        *log.lock(),
        vec![("start".to_string(), 1), ("end".to_string(), 1)]
    );
}

#[tokio::test(start_paused = true)]
async fn same_key_jobs_serialize_in_order() {
    let (scheduler, log) = recording_scheduler(Duration::from_millis(20));
    for n in 0..3 {
        scheduler.enqueue(job(n, "work", &token("s1")));
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        *log.lock(),
        vec![
            ("start".to_string(), 0),
            ("end".to_string(), 0),
            ("start".to_string(), 1),
            ("end".to_string(), 1),
            ("start".to_string(), 2),
            ("end".to_string(), 2),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn different_keys_run_in_parallel() {
    let (scheduler, log) = recording_scheduler(Duration::from_millis(50));
    scheduler.enqueue(job(1, "a", &token("thread-1")));
    scheduler.enqueue(job(2, "b", &token("thread-2")));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let events = log.lock().clone();
    let start2 = events
        .iter()
        .position(|e| e == &("start".to_string(), 2))
        .unwrap();
    let end1 = events
        .iter()
        .position(|e| e == &("end".to_string(), 1))
        .unwrap();
    // Second thread starts before the first one finishes.
    assert!(start2 < end1, "events: {events:?}");
}

#[tokio::test(start_paused = true)]
async fn busy_gate_blocks_until_done() {
    let (scheduler, log) = recording_scheduler(Duration::from_millis(10));
    let done = CancellationToken::new();
    scheduler.note_thread_known(&token("s1"), done.clone());

    scheduler.enqueue(job(1, "waiting", &token("s1")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(log.lock().is_empty(), "job must wait for the gate");

    done.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        *log.lock(),
        vec![("start".to_string(), 1), ("end".to_string(), 1)]
    );
}

#[tokio::test(start_paused = true)]
async fn gate_cleared_when_done_fires_before_enqueue() {
    let (scheduler, log) = recording_scheduler(Duration::from_millis(10));
    let done = CancellationToken::new();
    scheduler.note_thread_known(&token("s1"), done.clone());
    done.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;

    scheduler.enqueue(job(1, "go", &token("s1")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(log.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn worker_removes_key_when_queue_drains() {
    let (scheduler, _log) = recording_scheduler(Duration::from_millis(10));
    let t = token("s1");
    scheduler.enqueue(job(1, "only", &t));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!scheduler.has_thread(&t));

    // A later enqueue re-creates the worker.
    scheduler.enqueue(job(2, "again", &t));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!scheduler.has_thread(&t));
}

#[tokio::test(start_paused = true)]
async fn jobs_enqueued_while_running_keep_order() {
    let (scheduler, log) = recording_scheduler(Duration::from_millis(50));
    scheduler.enqueue(job(1, "first", &token("s1")));
    tokio::time::sleep(Duration::from_millis(10)).await;
    scheduler.enqueue(job(2, "second", &token("s1")));
    scheduler.enqueue(job(3, "third", &token("s1")));
    tokio::time::sleep(Duration::from_millis(500)).await;

    let order: Vec<i64> = log
        .lock()
        .iter()
        .filter(|(event, _)| event == "start")
        .map(|(_, id)| *id)
        .collect();
    assert_eq!(order, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn failed_job_does_not_poison_queue() {
    let log: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let run_log = Arc::clone(&log);
    let scheduler = ThreadScheduler::new(Arc::new(move |job: ThreadJob| {
        let log = Arc::clone(&run_log);
        Box::pin(async move {
            // First job "fails" (its driver logs the failure and returns).
            if job.user_msg_id == 1 {
                return;
            }
            log.lock().push(job.user_msg_id);
        })
    }));
    scheduler.enqueue(job(1, "fails", &token("s1")));
    scheduler.enqueue(job(2, "runs", &token("s1")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*log.lock(), vec![2]);
}
