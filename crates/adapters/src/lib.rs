// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-adapters: Platform and OS adapters
//!
//! Everything that talks to the outside world lives here: the chat platform
//! client with its rate-limited outbox, subprocess helpers, and git worktree
//! plumbing. The rest of the system sees traits and never the wire.

pub mod git;
pub mod subprocess;
pub mod transport;
pub mod worktrees;

pub use transport::outbox::{BotClient, Outbox, OutboxPacing};
pub use transport::telegram::{redact_token, TelegramClient};
pub use transport::{
    BotCommand, ChatApi, ChatUpdate, MessageRef, SendRequest, TransportError, UpdateKind,
};

#[cfg(any(test, feature = "test-support"))]
pub use transport::fake::{ApiCall, FakeChatApi};
