//! Run one external command as part of a dev session.
//!
//! The command gets its own process group, a null stdin and piped output that
//! is forwarded line by line to the caller's sinks. It runs until it exits or
//! the cancellation token fires; in the latter case the whole group is
//! terminated and the run counts as successful.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::shutdown::shutdown_child;
use super::stream::spawn_stream_reader;
use crate::output::OutputSink;

/// Time a process gets to exit after SIGTERM before it is killed.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Output still buffered in the pipes gets this long to be forwarded.
const READER_DRAIN: Duration = Duration::from_secs(1);

/// Complete environment of a child process.
///
/// Starts from a snapshot of the parent environment; overrides replace
/// inherited values of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessEnv {
    vars: BTreeMap<String, String>,
}

impl ProcessEnv {
    /// Snapshot of the current process environment. Variables whose name or
    /// value is not valid UTF-8 are skipped.
    pub fn inherit() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in overrides {
            self.vars.insert(key.into(), value.into());
        }
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// What to run and how.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: ProcessEnv,
    pub grace: Duration,
}

impl ExecRequest {
    /// Request inheriting the parent environment and the default grace period.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: ProcessEnv::inherit(),
            grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn env(mut self, env: ProcessEnv) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn envs<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = self.env.with_overrides(overrides);
        self
    }

    #[must_use]
    pub const fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} {reason}")]
    Exited { program: String, reason: ExitReason },

    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// How a process ended without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Code(i32),
    Signal(i32),
    Unknown,
}

impl ExitReason {
    fn from_status(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }
        exit_signal(&status).map_or(Self::Unknown, Self::Signal)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exited with code {code}"),
            Self::Signal(signal) => write!(f, "was terminated by signal {signal}"),
            Self::Unknown => write!(f, "exited abnormally"),
        }
    }
}

/// Run `request` to completion, or until `cancel` fires.
///
/// Returns `Ok(())` when the process exits with status 0 or when it was
/// stopped because of cancellation. A non-zero exit is [`ExecError::Exited`].
pub async fn exec(
    request: &ExecRequest,
    stdout: OutputSink,
    stderr: OutputSink,
    cancel: &CancellationToken,
) -> Result<(), ExecError> {
    if cancel.is_cancelled() {
        debug!(program = %request.program, "Cancelled before start, not spawning");
        return Ok(());
    }

    let mut command = Command::new(&request.program);
    command
        .args(&request.args)
        .env_clear()
        .envs(request.env.iter())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &request.cwd {
        command.current_dir(cwd);
    }
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| ExecError::Spawn {
        program: request.program.clone(),
        source,
    })?;
    let pid = child.id();
    let mut group = GroupGuard { pid };
    debug!(program = %request.program, ?pid, args = ?request.args, "Spawned process");

    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(out) = child.stdout.take() {
        readers.push(spawn_stream_reader(out, stdout));
    }
    if let Some(err) = child.stderr.take() {
        readers.push(spawn_stream_reader(err, stderr));
    }

    let status = tokio::select! {
        status = child.wait() => status,
        () = cancel.cancelled() => {
            debug!(program = %request.program, ?pid, "Cancellation requested, stopping process");
            if let Err(e) = shutdown_child(&mut child, request.grace).await {
                warn!(program = %request.program, error = %e, "Failed to stop process cleanly");
            }
            group.disarm();
            finish_readers(readers).await;
            return Ok(());
        }
    };

    let status = status.map_err(|source| ExecError::Wait {
        program: request.program.clone(),
        source,
    })?;
    group.disarm();
    reap_leftovers(pid);
    finish_readers(readers).await;

    if status.success() {
        debug!(program = %request.program, "Process exited successfully");
        return Ok(());
    }

    Err(ExecError::Exited {
        program: request.program.clone(),
        reason: ExitReason::from_status(status),
    })
}

/// Kills the process group when `exec` is dropped before its child was
/// reaped, e.g. when the caller aborts it during the SIGTERM grace period.
///
/// Declared after the child so it runs while the leader's PID is still
/// reserved.
struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    const fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };
        #[cfg(unix)]
        if let Ok(true) = super::shutdown::signal_group(pid, nix::sys::signal::Signal::SIGKILL) {
            debug!(pid, "Killed the process group of an abandoned run");
        }
        #[cfg(not(unix))]
        let _ = pid;
    }
}

/// Stop anything the exited process left behind in its group.
fn reap_leftovers(pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        if let Ok(true) = super::shutdown::signal_group(pid, nix::sys::signal::Signal::SIGTERM) {
            debug!(pid, "Terminated processes left behind in the group");
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

async fn finish_readers(readers: Vec<JoinHandle<()>>) {
    for mut reader in readers {
        if tokio::time::timeout(READER_DRAIN, &mut reader).await.is_err() {
            reader.abort();
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
const fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_inherited_values() {
        let env = ProcessEnv::empty()
            .with_overrides([("PORT", "3000"), ("HOST", "localhost")])
            .with_overrides([("PORT", "4000")]);
        assert_eq!(env.get("PORT"), Some("4000"));
        assert_eq!(env.get("HOST"), Some("localhost"));
        assert_eq!(env.iter().count(), 2);
    }

    #[test]
    fn exit_messages_name_the_program() {
        let err = ExecError::Exited {
            program: "npm".to_string(),
            reason: ExitReason::Code(1),
        };
        assert_eq!(err.to_string(), "npm exited with code 1");

        let err = ExecError::Exited {
            program: "node".to_string(),
            reason: ExitReason::Signal(9),
        };
        assert_eq!(err.to_string(), "node was terminated by signal 9");
    }
}
