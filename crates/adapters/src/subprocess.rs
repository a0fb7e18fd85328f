// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Default timeout for git worktree operations.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for git clone operations.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(300);

/// Grace period between SIGTERM and SIGKILL when stopping an engine.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Stop a child process: SIGTERM first, SIGKILL after the grace period.
///
/// Always waits for the process to be reaped before returning.
pub async fn terminate_gracefully(child: &mut Child, grace: Duration) -> Option<i32> {
    if let Some(pid) = child.id() {
        let pid = nix::unistd::Pid::from_raw(pid as i32);
        if let Err(err) = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM) {
            tracing::debug!(%pid, error = %err, "SIGTERM failed, process may have exited");
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => return status.code(),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "wait after SIGTERM failed");
            return None;
        }
        Err(_elapsed) => {
            tracing::debug!("process survived SIGTERM, killing");
        }
    }

    if let Err(err) = child.start_kill() {
        tracing::debug!(error = %err, "kill failed, process may have exited");
    }
    match child.wait().await {
        Ok(status) => status.code(),
        Err(err) => {
            tracing::warn!(error = %err, "wait after SIGKILL failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
