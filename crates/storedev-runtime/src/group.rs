//! Concurrent process group with all-or-nothing cancellation.
//!
//! Every action runs on its own task with a child of the group token. An
//! action finishing successfully changes nothing for the others. The first
//! failure cancels the group; the rest are given `drain` to wind down and
//! are aborted after that. The group's result is the first failure, or
//! `Ok(())` when every action finished cleanly or the caller cancelled.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::output::OutputMux;
use crate::target::{ActionContext, NamedAction};

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("{prefix}: {source}")]
    Failed {
        prefix: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{prefix} panicked: {message}")]
    Panicked { prefix: String, message: String },
}

impl GroupError {
    pub fn prefix(&self) -> &str {
        match self {
            Self::Failed { prefix, .. } | Self::Panicked { prefix, .. } => prefix,
        }
    }
}

/// Run `actions` concurrently until all finish, one fails, or `cancel` fires.
///
/// `cancel` is cancelled by the group itself on the first failure, so callers
/// sharing it observe the teardown too.
pub async fn run_all(
    actions: Vec<NamedAction>,
    output: &OutputMux,
    cancel: &CancellationToken,
    drain: Duration,
) -> Result<(), GroupError> {
    let mut tasks: JoinSet<anyhow::Result<()>> = JoinSet::new();
    let mut prefixes: HashMap<Id, String> = HashMap::new();

    for action in actions {
        let (stdout, stderr) = output.pair(&action.prefix);
        let prefix = action.prefix.clone();
        let ctx = ActionContext {
            stdout,
            stderr,
            cancel: cancel.child_token(),
        };
        let handle = tasks.spawn(action.start(ctx));
        debug!(%prefix, "Started action");
        prefixes.insert(handle.id(), prefix);
    }

    let mut failure: Option<GroupError> = None;

    loop {
        let next = tokio::select! {
            next = tasks.join_next_with_id() => next,
            () = cancel.cancelled() => break,
        };
        let Some(joined) = next else { break };

        if let Some(err) = classify(joined, &prefixes) {
            error!(prefix = err.prefix(), error = %err, "Action failed, stopping the group");
            failure = Some(err);
            cancel.cancel();
            break;
        }
    }

    drain_remaining(&mut tasks, &prefixes, drain).await;
    failure.map_or(Ok(()), Err)
}

/// Map a joined task to a failure, or `None` when it finished cleanly.
fn classify(
    joined: Result<(Id, anyhow::Result<()>), tokio::task::JoinError>,
    prefixes: &HashMap<Id, String>,
) -> Option<GroupError> {
    let label = |id: Id| prefixes.get(&id).cloned().unwrap_or_default();
    match joined {
        Ok((id, Ok(()))) => {
            debug!(prefix = %label(id), "Action finished");
            None
        }
        Ok((id, Err(source))) => Some(GroupError::Failed {
            prefix: label(id),
            source,
        }),
        Err(join_err) if join_err.is_panic() => {
            let id = join_err.id();
            let payload = join_err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Some(GroupError::Panicked {
                prefix: label(id),
                message,
            })
        }
        // Aborted; only the group aborts its own tasks
        Err(_) => None,
    }
}

async fn drain_remaining(
    tasks: &mut JoinSet<anyhow::Result<()>>,
    prefixes: &HashMap<Id, String>,
    drain: Duration,
) {
    if tasks.is_empty() {
        return;
    }
    debug!(remaining = tasks.len(), "Waiting for actions to stop");

    let drained = tokio::time::timeout(drain, async {
        while let Some(joined) = tasks.join_next_with_id().await {
            if let Some(err) = classify(joined, prefixes) {
                // Secondary failures during teardown are logged, not returned
                warn!(prefix = err.prefix(), error = %err, "Action failed while stopping");
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            remaining = tasks.len(),
            drain_ms = drain.as_millis(),
            "Actions did not stop in time, aborting"
        );
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
    }
}
