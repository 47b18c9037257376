// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SIGKILL protection.
//!
//! PMS stops its transcoder with SIGKILL, which cannot be trapped, so a
//! straight replacement would leak the remote job every time a viewer
//! stops playback. The shim therefore re-executes itself: the parent
//! stays in the shim slot and absorbs the SIGKILL, while the supervised
//! child does the actual work and polls the parent for liveness. When
//! the parent disappears the child cancels the session, deletes the
//! remote job, and exits on its own terms.

use crate::exit_error::ExitError;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::env;
use std::process::Command;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Marker set on the supervised child. Any non-empty value counts.
pub const ENV_PROTECTION: &str = "KUBE_TRANSCODE_SIGKILL_PROTECTION";
/// Pid of the supervising parent, set alongside the marker.
pub const ENV_PARENT_PID: &str = "KUBE_TRANSCODE_PARENT_PID";

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// Running without a supervising parent (re-exec failed).
    Disabled,
    /// Running as the supervised child of `parent`.
    Supervised { parent: i32 },
}

/// Establish SIGKILL protection before any real work starts.
///
/// In the parent role this function does not return: it re-executes the
/// shim with the marker environment set, waits for the child, and exits
/// with the child's code. In the child role it strips the marker
/// variables so they do not leak into the remote job's environment and
/// returns the parent pid to watch.
pub fn ensure_protected() -> Result<Protection, ExitError> {
    if env::var_os(ENV_PROTECTION).is_none() {
        return Ok(respawn_supervised());
    }

    let parent = env::var(ENV_PARENT_PID).ok();
    env::remove_var(ENV_PROTECTION);
    env::remove_var(ENV_PARENT_PID);

    match parse_parent_pid(parent.as_deref()) {
        Some(parent) => Ok(Protection::Supervised { parent }),
        None => Err(ExitError::config(format!(
            "{ENV_PARENT_PID} is missing or not a valid pid; refusing to run unsupervised"
        ))),
    }
}

/// Parent role: run the supervised child and mirror its exit code.
/// Returns only if the child could not be spawned.
fn respawn_supervised() -> Protection {
    let exe = match env::current_exe() {
        Ok(exe) => exe,
        Err(err) => {
            eprintln!("kube-transcode: cannot resolve own executable ({err}); running unprotected");
            return Protection::Disabled;
        }
    };

    let status = Command::new(exe)
        .args(env::args().skip(1))
        .env(ENV_PROTECTION, "1")
        .env(ENV_PARENT_PID, std::process::id().to_string())
        .status();

    match status {
        Ok(status) => std::process::exit(status.code().unwrap_or(1)),
        Err(err) => {
            eprintln!("kube-transcode: failed to respawn supervised ({err}); running unprotected");
            Protection::Disabled
        }
    }
}

fn parse_parent_pid(value: Option<&str>) -> Option<i32> {
    value.and_then(|v| v.parse::<i32>().ok()).filter(|pid| *pid > 0)
}

/// Poll the parent with the null signal until it disappears, then cancel
/// the session. EPERM still proves the pid exists; only ESRCH means gone.
pub async fn watch_parent(parent: i32, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let pid = Pid::from_raw(parent);
    loop {
        ticker.tick().await;
        if kill(pid, None) == Err(Errno::ESRCH) {
            info!(parent, "supervising parent is gone; cancelling session");
            cancel.cancel();
            return;
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod supervisor_tests;
