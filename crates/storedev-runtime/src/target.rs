//! Units of work run by a dev session.
//!
//! A [`NamedAction`] is a prefix plus a one-shot async closure. Proxied
//! targets are the same thing, except the closure also receives the port the
//! proxy routes to; [`ProxyTarget::bind`] turns one into a plain action once
//! that port is known.

use std::fmt;
use std::future::Future;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::output::OutputSink;

/// Everything an action receives when it starts.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub stdout: OutputSink,
    pub stderr: OutputSink,
    /// Fires when the session is torn down. Actions must stop promptly and
    /// return `Ok(())` once it does.
    pub cancel: CancellationToken,
}

pub type ActionFuture = BoxFuture<'static, anyhow::Result<()>>;

type BoxedAction = Box<dyn FnOnce(ActionContext) -> ActionFuture + Send>;
type BoxedPortAction = Box<dyn FnOnce(ActionContext, u16) -> ActionFuture + Send>;

/// An action with the prefix its output is labelled with.
pub struct NamedAction {
    pub prefix: String,
    action: BoxedAction,
}

impl NamedAction {
    pub fn new<F, Fut>(prefix: impl Into<String>, action: F) -> Self
    where
        F: FnOnce(ActionContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            prefix: prefix.into(),
            action: Box::new(move |ctx| Box::pin(action(ctx))),
        }
    }

    pub(crate) fn start(self, ctx: ActionContext) -> ActionFuture {
        (self.action)(ctx)
    }
}

impl fmt::Debug for NamedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedAction")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// A process that is not exposed through the proxy.
pub type PlainProcess = NamedAction;

/// A process reachable through the proxy.
pub struct ProxyTarget {
    pub log_prefix: String,
    /// `None` makes this the catch-all route.
    pub path_prefix: Option<String>,
    /// Fixed port; one is allocated when absent.
    pub custom_port: Option<u16>,
    action: BoxedPortAction,
}

impl ProxyTarget {
    pub fn new<F, Fut>(
        log_prefix: impl Into<String>,
        path_prefix: Option<String>,
        custom_port: Option<u16>,
        action: F,
    ) -> Self
    where
        F: FnOnce(ActionContext, u16) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            log_prefix: log_prefix.into(),
            path_prefix,
            custom_port,
            action: Box::new(move |ctx, port| Box::pin(action(ctx, port))),
        }
    }

    /// Fix the port and turn this target into a plain action.
    pub fn bind(self, port: u16) -> NamedAction {
        let action = self.action;
        NamedAction {
            prefix: self.log_prefix,
            action: Box::new(move |ctx| action(ctx, port)),
        }
    }
}

impl fmt::Debug for ProxyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyTarget")
            .field("log_prefix", &self.log_prefix)
            .field("path_prefix", &self.path_prefix)
            .field("custom_port", &self.custom_port)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum Target {
    Proxied(ProxyTarget),
    Plain(PlainProcess),
}

impl Target {
    pub fn prefix(&self) -> &str {
        match self {
            Self::Proxied(target) => &target.log_prefix,
            Self::Plain(action) => &action.prefix,
        }
    }
}

impl From<ProxyTarget> for Target {
    fn from(target: ProxyTarget) -> Self {
        Self::Proxied(target)
    }
}

impl From<NamedAction> for Target {
    fn from(action: NamedAction) -> Self {
        Self::Plain(action)
    }
}
