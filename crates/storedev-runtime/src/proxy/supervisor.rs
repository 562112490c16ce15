//! Proxy supervisor for a dev session.
//!
//! Key design decisions:
//! - **Bind-then-report**: the listener binds before any target starts, so a
//!   taken proxy port fails the session before anything is spawned
//! - **Shared scope**: the proxy runs as one more group action, so it stops
//!   with the session and a proxy failure tears the session down
//! - **Ports before routes**: every proxied target gets a distinct port,
//!   fixed or allocated, before the route table is built

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use storedev_proxy::{PreviewUrl, ProxyConfig, Route, RouteTable, RoutingError};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::process::{PortError, PortPlanner};
use crate::target::{NamedAction, ProxyTarget};

/// Output prefix of the proxy itself.
pub const PROXY_PREFIX: &str = "proxy";

/// Error from supervisor operations.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration for the session proxy.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Host to bind to (e.g., "127.0.0.1" or "0.0.0.0").
    pub host: String,
    /// Port to bind to (0 for auto-assign).
    pub port: u16,
    /// How long open connections may finish after shutdown starts.
    pub drain_timeout: Duration,
    pub preview_url: PreviewUrl,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            drain_timeout: storedev_proxy::DEFAULT_DRAIN_TIMEOUT,
            preview_url: PreviewUrl::default(),
        }
    }
}

/// A bound proxy and its targets, ready to run.
pub struct PreparedProxy {
    /// Address the proxy listens on.
    pub address: SocketAddr,
    /// Resolved routes in registration order.
    pub routes: Vec<Route>,
    /// The proxy action first, then one action per target.
    pub actions: Vec<NamedAction>,
}

impl fmt::Debug for PreparedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedProxy")
            .field("address", &self.address)
            .field("routes", &self.routes)
            .field("actions", &self.actions.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ProxySupervisor {
    config: SupervisorConfig,
}

impl ProxySupervisor {
    #[must_use]
    pub const fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    pub fn preview_url(&self) -> PreviewUrl {
        self.config.preview_url.clone()
    }

    /// Assign ports, build the route table and bind the proxy listener.
    ///
    /// # Errors
    ///
    /// Fails on conflicting ports or routes, or when the proxy port cannot be
    /// bound. Nothing has been started at that point.
    pub async fn prepare(
        &self,
        targets: Vec<ProxyTarget>,
        planner: &mut PortPlanner,
    ) -> Result<PreparedProxy, SupervisorError> {
        let proxy_port = self.config.port;
        if proxy_port != 0 && planner.label_of(proxy_port).is_none() {
            planner.claim(PROXY_PREFIX, proxy_port)?;
        }

        let mut routes = Vec::with_capacity(targets.len());
        for target in &targets {
            let port = match target.custom_port {
                Some(port) => planner.claim_fixed(&target.log_prefix, port)?,
                None => planner.allocate(&target.log_prefix, None)?,
            };
            debug!(prefix = %target.log_prefix, port, "Assigned target port");
            routes.push(Route {
                label: target.log_prefix.clone(),
                path_prefix: target.path_prefix.clone(),
                port,
            });
        }
        let table = RouteTable::new(routes.clone())?;

        // Bind FIRST - get real address before anything starts
        let bind_addr = format!("{}:{}", self.config.host, proxy_port);
        let listener =
            TcpListener::bind(&bind_addr)
                .await
                .map_err(|e| SupervisorError::BindFailed {
                    address: bind_addr.clone(),
                    reason: e.to_string(),
                })?;
        let address = listener
            .local_addr()
            .map_err(|e| SupervisorError::Internal(format!("Failed to get local address: {e}")))?;

        info!("Proxy bound to {address}");

        let proxy_config = ProxyConfig {
            drain_timeout: self.config.drain_timeout,
            preview_url: self.config.preview_url.clone(),
        };

        let mut actions = Vec::with_capacity(targets.len() + 1);
        actions.push(NamedAction::new(PROXY_PREFIX, move |ctx| async move {
            storedev_proxy::serve(listener, table, proxy_config, ctx.cancel).await
        }));
        for (target, route) in targets.into_iter().zip(&routes) {
            actions.push(target.bind(route.port));
        }

        Ok(PreparedProxy {
            address,
            routes,
            actions,
        })
    }
}
