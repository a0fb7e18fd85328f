// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-engines: Engine adapters and the subprocess runner
//!
//! An engine is an AI-agent CLI that speaks line-delimited JSON on stdout.
//! Each adapter (dialect) describes how to invoke its CLI and how to
//! translate its JSON into the normalized event algebra; the JSONL runner
//! does the process plumbing once for all of them.

pub mod backend;
pub mod claude;
pub mod codex;
pub mod jsonl;
pub mod resume;
pub mod router;
pub mod runner;

#[cfg(any(test, feature = "test-support"))]
pub mod script;

pub use backend::{
    builtin_engine_backends, claude_backend, cli_available, codex_backend, BackendError,
    EngineBackend,
};
pub use jsonl::{EngineDialect, JsonlRunner, TranslateError};
pub use resume::{strip_resume_lines, ResumeMatcher};
pub use router::{AutoRouter, RouterError, RunnerEntry, RunnerUnavailableError};
pub use runner::{session_locks, RunRequest, Runner, RunnerError, SessionLocks};

#[cfg(any(test, feature = "test-support"))]
pub use script::{ScriptRunner, ScriptStep};
