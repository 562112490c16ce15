//! Graceful shutdown logic for `tokio::process::Child` with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use tokio::time::timeout;
#[cfg(unix)]
use tracing::debug;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Gracefully shut down a child process and its group.
///
/// # Strategy
/// 1. Send SIGTERM to the process group and wait up to `grace`
/// 2. If still running, send SIGKILL to the group
/// 3. Wait for process reaping (required to avoid zombies)
///
/// # Platform behavior
/// - Unix: Uses nix `killpg`, falling back to the single PID when the child
///   does not lead a group
/// - Windows: Immediately calls `.kill()` (no graceful shutdown available)
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        shutdown_unix(child, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        shutdown_windows(child).await
    }
}

/// Send `signal` to the process group led by `pid`.
///
/// Returns `Ok(false)` when no such group exists any more.
#[cfg(unix)]
pub fn signal_group(pid: u32, signal: Signal) -> io::Result<bool> {
    match signal::killpg(to_pid(pid)?, signal) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(unix)]
fn to_pid(pid: u32) -> io::Result<Pid> {
    i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "PID out of range"))
}

/// Signal the group, or the single process when it does not lead one.
///
/// Only valid while the child has not been reaped, so its PID cannot have
/// been reused.
#[cfg(unix)]
fn signal_child(pid: u32, signal: Signal) -> io::Result<bool> {
    if signal_group(pid, signal)? {
        return Ok(true);
    }
    match signal::kill(to_pid(pid)?, signal) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(unix)]
async fn shutdown_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    // No PID means the child was already reaped
    let Some(pid) = child.id() else {
        return child.wait().await;
    };

    // Phase 1: SIGTERM with grace period
    if !signal_child(pid, Signal::SIGTERM)? {
        return child.wait().await;
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        // The leader is gone; make sure nothing it started lingers
        let _ = signal_group(pid, Signal::SIGKILL);
        return result;
    }

    // Phase 2: SIGKILL
    debug!(pid, grace_ms = grace.as_millis(), "Process ignored SIGTERM, sending SIGKILL");
    let _ = signal_child(pid, Signal::SIGKILL);
    child.kill().await?;

    // Phase 3: Wait for reaping (should be fast after SIGKILL)
    child.wait().await
}

#[cfg(not(unix))]
async fn shutdown_windows(child: &mut Child) -> io::Result<ExitStatus> {
    // Windows has no SIGTERM equivalent - terminate immediately
    child.kill().await?;
    child.wait().await
}
