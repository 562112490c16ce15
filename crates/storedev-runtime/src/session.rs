//! A full dev session: optional proxy plus every target in one group.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::group::{GroupError, run_all};
use crate::output::OutputMux;
use crate::process::PortPlanner;
use crate::proxy::{ProxySupervisor, SupervisorConfig, SupervisorError};
use crate::target::{NamedAction, ProxyTarget, Target};

/// Default time actions get to stop once the session is torn down.
pub const DEFAULT_GROUP_DRAIN: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub proxy: SupervisorConfig,
    pub group_drain: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            proxy: SupervisorConfig::default(),
            group_drain: DEFAULT_GROUP_DRAIN,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Group(#[from] GroupError),
}

/// Everything bound and ready; nothing is running yet.
#[derive(Debug)]
pub struct PreparedSession {
    proxy_address: Option<SocketAddr>,
    actions: Vec<NamedAction>,
    group_drain: Duration,
}

impl PreparedSession {
    /// Where the proxy listens, when the session has one.
    pub const fn proxy_address(&self) -> Option<SocketAddr> {
        self.proxy_address
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|action| action.prefix.as_str())
    }

    /// Run every action until they all finish, one fails, or `cancel` fires.
    pub async fn run(self, output: &OutputMux, cancel: &CancellationToken) -> Result<(), SessionError> {
        run_all(self.actions, output, cancel, self.group_drain).await?;
        Ok(())
    }
}

/// Decide whether a proxy is needed and prepare every target.
///
/// Without proxied targets no listener is opened and the plain processes run
/// on their own.
pub async fn prepare_session(
    config: SessionConfig,
    targets: Vec<Target>,
    planner: &mut PortPlanner,
) -> Result<PreparedSession, SessionError> {
    let mut proxied: Vec<ProxyTarget> = Vec::new();
    let mut plain: Vec<NamedAction> = Vec::new();
    for target in targets {
        match target {
            Target::Proxied(target) => proxied.push(target),
            Target::Plain(action) => plain.push(action),
        }
    }

    if proxied.is_empty() {
        info!(processes = plain.len(), "No proxied targets, running without a proxy");
        return Ok(PreparedSession {
            proxy_address: None,
            actions: plain,
            group_drain: config.group_drain,
        });
    }

    let supervisor = ProxySupervisor::new(config.proxy);
    let prepared = supervisor.prepare(proxied, planner).await?;
    let mut actions = prepared.actions;
    actions.extend(plain);

    Ok(PreparedSession {
        proxy_address: Some(prepared.address),
        actions,
        group_drain: config.group_drain,
    })
}

/// Prepare and run a session in one step.
pub async fn run_session(
    config: SessionConfig,
    targets: Vec<Target>,
    planner: &mut PortPlanner,
    output: &OutputMux,
    cancel: &CancellationToken,
) -> Result<(), SessionError> {
    prepare_session(config, targets, planner)
        .await?
        .run(output, cancel)
        .await
}
