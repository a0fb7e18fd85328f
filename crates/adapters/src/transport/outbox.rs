// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate-limited outbox for outbound platform calls
//!
//! Every channel gets its own queue and worker. Within a channel, sends
//! outrank edits outrank deletes; within a class, FIFO. Pending edits to the
//! same message coalesce to the newest body, a queued delete drops the edits
//! behind it, and a platform retry-after blocks the channel without failing
//! the operation.

use super::{ChatApi, ChatUpdate, MessageRef, SendRequest, TransportError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Minimum intervals between calls on one channel
#[derive(Debug, Clone)]
pub struct OutboxPacing {
    pub private_interval: Duration,
    pub group_interval: Duration,
}

impl Default for OutboxPacing {
    fn default() -> Self {
        Self {
            private_interval: Duration::from_millis(500),
            group_interval: Duration::from_millis(1000),
        }
    }
}

impl OutboxPacing {
    /// No pacing at all, for tests.
    pub fn none() -> Self {
        Self {
            private_interval: Duration::ZERO,
            group_interval: Duration::ZERO,
        }
    }

    /// Group chats have negative IDs on Telegram; anything else is private.
    pub fn interval_for(&self, channel_id: i64) -> Duration {
        if channel_id < 0 {
            self.group_interval
        } else {
            self.private_interval
        }
    }
}

#[derive(Debug, Clone)]
enum OpKind {
    Send(SendRequest),
    Edit { message_id: i64, text: String },
    Delete { message_id: i64 },
}

impl OpKind {
    fn priority(&self) -> u8 {
        match self {
            OpKind::Send(_) => 0,
            OpKind::Edit { .. } => 1,
            OpKind::Delete { .. } => 2,
        }
    }

    fn method(&self) -> &'static str {
        match self {
            OpKind::Send(_) => "send",
            OpKind::Edit { .. } => "edit",
            OpKind::Delete { .. } => "delete",
        }
    }
}

type Reply = oneshot::Sender<Result<Option<MessageRef>, TransportError>>;

struct QueuedOp {
    seq: u64,
    kind: OpKind,
    replies: Vec<Reply>,
}

#[derive(Default)]
struct ChannelQueue {
    ops: Vec<QueuedOp>,
    worker_running: bool,
    last_call_at: Option<Instant>,
    blocked_until: Option<Instant>,
}

struct ChannelState {
    queue: Mutex<ChannelQueue>,
}

struct OutboxInner<A: ChatApi> {
    api: Arc<A>,
    pacing: OutboxPacing,
    channels: Mutex<HashMap<i64, Arc<ChannelState>>>,
    seq: AtomicU64,
}

/// Per-channel prioritized operation queue over a [`ChatApi`]
pub struct Outbox<A: ChatApi> {
    inner: Arc<OutboxInner<A>>,
}

impl<A: ChatApi> Clone for Outbox<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ChatApi> Outbox<A> {
    pub fn new(api: Arc<A>, pacing: OutboxPacing) -> Self {
        Self {
            inner: Arc::new(OutboxInner {
                api,
                pacing,
                channels: Mutex::new(HashMap::new()),
                seq: AtomicU64::new(1),
            }),
        }
    }

    pub fn interval_for(&self, channel_id: i64) -> Duration {
        self.inner.pacing.interval_for(channel_id)
    }

    /// Queue a send and wait for the delivered message reference.
    pub async fn send(&self, request: SendRequest) -> Result<MessageRef, TransportError> {
        let channel_id = request.channel_id;
        let rx = self.enqueue(channel_id, OpKind::Send(request), true);
        match rx {
            Some(rx) => match rx.await {
                Ok(Ok(Some(message_ref))) => Ok(message_ref),
                Ok(Ok(None)) => Err(TransportError::Closed),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(TransportError::Closed),
            },
            None => Err(TransportError::Closed),
        }
    }

    /// Queue an edit. With `wait`, resolves after the API round-trip;
    /// otherwise returns immediately and the edit lands later (or coalesces
    /// into a newer one).
    pub async fn edit(
        &self,
        channel_id: i64,
        message_id: i64,
        text: String,
        wait: bool,
    ) -> Result<(), TransportError> {
        let rx = self.enqueue(channel_id, OpKind::Edit { message_id, text }, wait);
        match rx {
            Some(rx) => match rx.await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(TransportError::Closed),
            },
            None => Ok(()),
        }
    }

    /// Queue a delete and wait for it. Pending edits for the message are
    /// dropped immediately.
    pub async fn delete(&self, channel_id: i64, message_id: i64) -> Result<(), TransportError> {
        let rx = self.enqueue(channel_id, OpKind::Delete { message_id }, true);
        match rx {
            Some(rx) => match rx.await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(TransportError::Closed),
            },
            None => Ok(()),
        }
    }

    /// Wait for every channel queue to drain. Returns false on timeout.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let drained = {
                let channels = self.inner.channels.lock();
                channels.values().all(|state| {
                    let queue = state.queue.lock();
                    queue.ops.is_empty() && !queue.worker_running
                })
            };
            if drained {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn channel(&self, channel_id: i64) -> Arc<ChannelState> {
        let mut channels = self.inner.channels.lock();
        Arc::clone(channels.entry(channel_id).or_insert_with(|| {
            Arc::new(ChannelState {
                queue: Mutex::new(ChannelQueue::default()),
            })
        }))
    }

    fn enqueue(
        &self,
        channel_id: i64,
        kind: OpKind,
        wait: bool,
    ) -> Option<oneshot::Receiver<Result<Option<MessageRef>, TransportError>>> {
        let state = self.channel(channel_id);
        let mut queue = state.queue.lock();

        match &kind {
            OpKind::Edit { message_id, text } => {
                // Coalesce into a pending edit for the same message: only the
                // freshest body is worth sending.
                let pending = queue.ops.iter_mut().find(|op| {
                    matches!(&op.kind, OpKind::Edit { message_id: m, .. } if m == message_id)
                });
                if let Some(op) = pending {
                    if let OpKind::Edit { text: body, .. } = &mut op.kind {
                        *body = text.clone();
                    }
                    if wait {
                        let (tx, rx) = oneshot::channel();
                        op.replies.push(tx);
                        return Some(rx);
                    }
                    return None;
                }
            }
            OpKind::Delete { message_id } => {
                // A delete makes every pending edit for that message moot.
                queue.ops.retain_mut(|op| {
                    let stale = matches!(
                        &op.kind,
                        OpKind::Edit { message_id: m, .. } if m == message_id
                    );
                    if stale {
                        for reply in op.replies.drain(..) {
                            let _ = reply.send(Ok(None));
                        }
                    }
                    !stale
                });
            }
            OpKind::Send(_) => {}
        }

        let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst);
        let (replies, rx) = if wait {
            let (tx, rx) = oneshot::channel();
            (vec![tx], Some(rx))
        } else {
            (Vec::new(), None)
        };
        queue.ops.push(QueuedOp { seq, kind, replies });

        if !queue.worker_running {
            queue.worker_running = true;
            let inner = Arc::clone(&self.inner);
            let state = Arc::clone(&state);
            tokio::spawn(run_worker(inner, channel_id, state));
        }
        rx
    }
}

async fn run_worker<A: ChatApi>(
    inner: Arc<OutboxInner<A>>,
    channel_id: i64,
    state: Arc<ChannelState>,
) {
    let interval = inner.pacing.interval_for(channel_id);
    loop {
        // Honor retry-after blocks and pacing before the next call.
        let wait_until = {
            let queue = state.queue.lock();
            let mut deadline = queue.blocked_until;
            if let Some(last) = queue.last_call_at {
                let paced = last + interval;
                deadline = Some(deadline.map_or(paced, |d| d.max(paced)));
            }
            deadline
        };
        if let Some(deadline) = wait_until {
            if deadline > Instant::now() {
                tokio::time::sleep_until(deadline).await;
            }
        }

        let op = {
            let mut queue = state.queue.lock();
            let best = queue
                .ops
                .iter()
                .enumerate()
                .min_by_key(|(_, op)| (op.kind.priority(), op.seq))
                .map(|(index, _)| index);
            match best {
                Some(index) => queue.ops.remove(index),
                None => {
                    queue.worker_running = false;
                    return;
                }
            }
        };

        let result = execute(inner.api.as_ref(), channel_id, &op.kind).await;
        match result {
            Err(TransportError::RetryAfter(seconds)) => {
                tracing::debug!(
                    channel_id,
                    seconds,
                    method = op.kind.method(),
                    "rate limited, requeueing at head"
                );
                let mut queue = state.queue.lock();
                queue.blocked_until = Some(Instant::now() + Duration::from_secs_f64(seconds));
                queue.ops.insert(0, op);
            }
            Ok(message_ref) => {
                {
                    let mut queue = state.queue.lock();
                    queue.last_call_at = Some(Instant::now());
                    queue.blocked_until = None;
                }
                for reply in op.replies {
                    let _ = reply.send(Ok(message_ref.clone()));
                }
            }
            Err(err) => {
                {
                    let mut queue = state.queue.lock();
                    queue.last_call_at = Some(Instant::now());
                }
                if op.replies.is_empty() {
                    tracing::warn!(
                        channel_id,
                        method = op.kind.method(),
                        error = %err,
                        "outbox operation failed"
                    );
                }
                for reply in op.replies {
                    let _ = reply.send(Err(err.clone()));
                }
            }
        }
    }
}

async fn execute<A: ChatApi>(
    api: &A,
    channel_id: i64,
    kind: &OpKind,
) -> Result<Option<MessageRef>, TransportError> {
    match kind {
        OpKind::Send(request) => api.send_message(request.clone()).await.map(Some),
        OpKind::Edit { message_id, text } => api
            .edit_message_text(channel_id, *message_id, text.clone())
            .await
            .map(|_| None),
        OpKind::Delete { message_id } => api
            .delete_message(channel_id, *message_id)
            .await
            .map(|_| None),
    }
}

/// High-level bot handle: the outbox plus the direct calls that don't need
/// queueing (long-polls, callback answers, topic management).
pub struct BotClient<A: ChatApi> {
    api: Arc<A>,
    outbox: Outbox<A>,
}

impl<A: ChatApi> Clone for BotClient<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            outbox: self.outbox.clone(),
        }
    }
}

impl<A: ChatApi> BotClient<A> {
    pub fn new(api: A, pacing: OutboxPacing) -> Self {
        let api = Arc::new(api);
        let outbox = Outbox::new(Arc::clone(&api), pacing);
        Self { api, outbox }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn outbox(&self) -> &Outbox<A> {
        &self.outbox
    }

    pub fn interval_for(&self, channel_id: i64) -> Duration {
        self.outbox.interval_for(channel_id)
    }

    pub async fn send_message(
        &self,
        request: SendRequest,
    ) -> Result<MessageRef, TransportError> {
        self.outbox.send(request).await
    }

    pub async fn edit_message(
        &self,
        channel_id: i64,
        message_id: i64,
        text: String,
        wait: bool,
    ) -> Result<(), TransportError> {
        self.outbox.edit(channel_id, message_id, text, wait).await
    }

    pub async fn delete_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<(), TransportError> {
        self.outbox.delete(channel_id, message_id).await
    }

    /// Long-poll for updates, sleeping through platform retry-after answers.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_s: u64,
    ) -> Result<Vec<ChatUpdate>, TransportError> {
        loop {
            match self.api.get_updates(offset, timeout_s).await {
                Err(TransportError::RetryAfter(seconds)) => {
                    tracing::debug!(seconds, "get_updates rate limited");
                    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                }
                other => return other,
            }
        }
    }

    pub async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<String>,
    ) -> Result<(), TransportError> {
        self.api.answer_callback_query(callback_id, text).await
    }

    pub async fn edit_reply_markup(
        &self,
        channel_id: i64,
        message_id: i64,
        markup: serde_json::Value,
    ) -> Result<(), TransportError> {
        self.api
            .edit_reply_markup(channel_id, message_id, markup)
            .await
    }

    pub async fn create_forum_topic(
        &self,
        channel_id: i64,
        name: &str,
    ) -> Result<i64, TransportError> {
        self.api.create_forum_topic(channel_id, name).await
    }

    pub async fn set_my_commands(
        &self,
        commands: Vec<super::BotCommand>,
    ) -> Result<(), TransportError> {
        self.api.set_my_commands(commands).await
    }

    pub async fn flush(&self, timeout: Duration) -> bool {
        self.outbox.flush(timeout).await
    }
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
