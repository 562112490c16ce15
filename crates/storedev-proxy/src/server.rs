//! Reverse proxy server.
//!
//! This module provides the `serve()` function that runs the proxy on a
//! pre-bound `TcpListener`. Every request goes through one fallback handler
//! that resolves the route table:
//!
//! - a matching route forwards the request (or upgrade) to its port
//! - `/` with no catch-all redirects to the preview URL, once one is set
//! - anything else is answered with 404
//!
//! Connections are served with hyper-util directly instead of `axum::serve`
//! so that shutdown can bound the drain and force-close what remains.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use reqwest::{Client, redirect::Policy};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::forward::forward_request;
use crate::routing::RouteTable;
use crate::upgrade::{forward_upgrade, is_upgrade_request};

/// Default time in-flight connections get to finish after cancellation.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared, updatable preview URL.
///
/// Cloning yields another handle to the same value, so the URL can be set
/// after the proxy has started.
#[derive(Debug, Clone)]
pub struct PreviewUrl {
    inner: Arc<watch::Sender<Option<String>>>,
}

impl PreviewUrl {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            inner: Arc::new(watch::channel(initial).0),
        }
    }

    pub fn set(&self, url: impl Into<String>) {
        self.inner.send_replace(Some(url.into()));
    }

    pub fn get(&self) -> Option<String> {
        self.inner.borrow().clone()
    }
}

impl Default for PreviewUrl {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Configuration for a proxy run.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// How long in-flight connections may run after cancellation.
    pub drain_timeout: Duration,
    pub preview_url: PreviewUrl,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            preview_url: PreviewUrl::default(),
        }
    }
}

/// Shared application state for the proxy server.
#[derive(Clone)]
struct ProxyState {
    routes: Arc<RouteTable>,
    /// HTTP client for forwarding requests to targets.
    client: Client,
    preview_url: PreviewUrl,
    cancel: CancellationToken,
}

/// Run the proxy on a pre-bound listener until `cancel` fires.
///
/// After cancellation the listener is closed, open connections are asked to
/// finish their current request and get `drain_timeout` to do so; whatever is
/// still open after that is dropped.
pub async fn serve(
    listener: TcpListener,
    routes: RouteTable,
    config: ProxyConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;

    let client = Client::builder()
        .redirect(Policy::none())
        .pool_max_idle_per_host(10)
        .build()?;

    for route in routes.routes() {
        info!(
            route = %route.label,
            prefix = route.path_prefix.as_deref().unwrap_or("*"),
            port = route.port,
            "Proxy route"
        );
    }

    let state = ProxyState {
        routes: Arc::new(routes),
        client,
        preview_url: config.preview_url,
        cancel: cancel.clone(),
    };

    let app = Router::new().fallback(proxy_request).with_state(state);
    let service = TowerToHyperService::new(app);
    let builder = auto::Builder::new(TokioExecutor::new());
    let mut connections = JoinSet::new();

    info!("Proxy listening on {addr}");

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };
                let service = service.clone();
                let builder = builder.clone();
                let cancel = cancel.clone();
                connections.spawn(async move {
                    let connection =
                        builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                    let mut connection = std::pin::pin!(connection);
                    tokio::select! {
                        result = connection.as_mut() => {
                            if let Err(e) = result {
                                debug!(%peer, error = %e, "Connection ended with error");
                            }
                        }
                        () = cancel.cancelled() => {
                            connection.as_mut().graceful_shutdown();
                            if let Err(e) = connection.await {
                                debug!(%peer, error = %e, "Connection ended with error during drain");
                            }
                        }
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    debug!(open = connections.len(), "Proxy listener closed, draining connections");

    let drained = tokio::time::timeout(config.drain_timeout, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            open = connections.len(),
            "Proxy drain timed out; closing remaining connections"
        );
        connections.abort_all();
        while connections.join_next().await.is_some() {}
    }

    info!("Proxy server shut down");
    Ok(())
}

/// Single entry point for every request.
async fn proxy_request(State(state): State<ProxyState>, request: Request) -> Response {
    let path = request.uri().path().to_string();

    let Some(route) = state.routes.resolve(&path) else {
        if path == "/" {
            if let Some(url) = state.preview_url.get() {
                debug!(%url, "Redirecting to preview");
                return redirect_found(&url);
            }
        }
        debug!(%path, "Reverse HTTP proxy error - Invalid path");
        return (StatusCode::NOT_FOUND, format!("Invalid path {path}\n")).into_response();
    };

    if is_upgrade_request(request.headers()) {
        return forward_upgrade(route, request, state.cancel.clone()).await;
    }

    forward_request(&state.client, route, request).await
}

fn redirect_found(location: &str) -> Response {
    match header::HeaderValue::try_from(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            warn!(%location, "Preview URL is not a valid header value");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_url_is_shared_between_clones() {
        let preview = PreviewUrl::default();
        let other = preview.clone();
        assert_eq!(other.get(), None);

        preview.set("https://store.example/admin");
        assert_eq!(other.get().as_deref(), Some("https://store.example/admin"));
    }

    #[test]
    fn redirect_uses_found_status() {
        let response = redirect_found("http://localhost:3000/extensions/dev-console");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "http://localhost:3000/extensions/dev-console"
        );
    }
}
