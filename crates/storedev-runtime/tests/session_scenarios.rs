//! Dev sessions with and without the reverse proxy.

use std::time::Duration;

use axum::Router;
use storedev_runtime::{
    ActionContext, NamedAction, OutputMux, PortPlanner, ProxyTarget, SessionConfig,
    SupervisorConfig, Target, get_available_tcp_port, is_port_available, prepare_session,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn local_config(proxy_port: u16) -> SessionConfig {
    SessionConfig {
        proxy: SupervisorConfig {
            host: "127.0.0.1".to_string(),
            port: proxy_port,
            drain_timeout: Duration::from_millis(500),
            ..SupervisorConfig::default()
        },
        group_drain: Duration::from_secs(5),
    }
}

/// Proxied target answering every request with its name.
fn named_server(name: &'static str, path_prefix: Option<&str>) -> Target {
    ProxyTarget::new(
        name,
        path_prefix.map(ToString::to_string),
        None,
        move |ctx: ActionContext, port| async move {
            let listener = TcpListener::bind(("127.0.0.1", port)).await?;
            ctx.stdout.write(format!("listening on {port}"));
            let app = Router::new().fallback(move || async move { name });
            axum::serve(listener, app)
                .with_graceful_shutdown(ctx.cancel.cancelled_owned())
                .await?;
            Ok(())
        },
    )
    .into()
}

async fn get_with_retry(url: &str) -> String {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(response) = client.get(url).send().await {
            if response.status().is_success() {
                return response.text().await.unwrap();
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("no successful response from {url}");
}

#[tokio::test]
async fn routes_extensions_and_catch_all_through_the_proxy() {
    let (mux, _rx) = OutputMux::new();
    let cancel = CancellationToken::new();
    let proxy_port = get_available_tcp_port(None).unwrap();
    let mut planner = PortPlanner::new();

    let session = prepare_session(
        local_config(proxy_port),
        vec![named_server("extensions", Some("/extensions")), named_server("frontend", None)],
        &mut planner,
    )
    .await
    .unwrap();
    assert_eq!(session.proxy_address().unwrap().port(), proxy_port);

    let session_cancel = cancel.clone();
    let running = tokio::spawn(async move { session.run(&mux, &session_cancel).await });

    let base = format!("http://127.0.0.1:{proxy_port}");
    assert_eq!(get_with_retry(&format!("{base}/extensions/x")).await, "extensions");
    assert_eq!(get_with_retry(&format!("{base}/")).await, "frontend");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("session did not stop")
        .unwrap()
        .unwrap();
    assert!(is_port_available(proxy_port));
}

#[tokio::test]
async fn plain_processes_run_without_a_listener() {
    let (mux, _rx) = OutputMux::new();
    let cancel = CancellationToken::new();
    let proxy_port = get_available_tcp_port(None).unwrap();
    let mut planner = PortPlanner::new();

    let probe = NamedAction::new("probe", move |_ctx| async move {
        anyhow::ensure!(is_port_available(proxy_port), "proxy port is bound");
        Ok(())
    });

    let session = prepare_session(local_config(proxy_port), vec![probe.into()], &mut planner)
        .await
        .unwrap();
    assert!(session.proxy_address().is_none());
    assert_eq!(session.prefixes().collect::<Vec<_>>(), vec!["probe"]);

    session.run(&mux, &cancel).await.unwrap();
}

#[tokio::test]
async fn failing_target_tears_down_the_proxy() {
    let (mux, _rx) = OutputMux::new();
    let cancel = CancellationToken::new();
    let proxy_port = get_available_tcp_port(None).unwrap();
    let mut planner = PortPlanner::new();

    let crashing: Target = ProxyTarget::new(
        "backend",
        Some("/api".to_string()),
        None,
        |_ctx: ActionContext, _port| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            anyhow::bail!("backend crashed")
        },
    )
    .into();

    let session = prepare_session(
        local_config(proxy_port),
        vec![crashing, named_server("frontend", None)],
        &mut planner,
    )
    .await
    .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), session.run(&mux, &cancel))
        .await
        .expect("session did not stop")
        .unwrap_err();
    assert_eq!(err.to_string(), "backend: backend crashed");
    assert!(cancel.is_cancelled());
    assert!(is_port_available(proxy_port));
}
