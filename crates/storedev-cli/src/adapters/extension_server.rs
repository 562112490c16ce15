//! Local dev server for previewable UI extensions.
//!
//! Serves, under `/extensions`:
//! - `/extensions` - JSON manifest of the app and every extension
//! - `/extensions/dev-console` - HTML page linking to each preview
//! - `/extensions/:uuid` - manifest entry of one extension
//! - `/extensions/:uuid/assets/*` - files of the extension's `dist` directory
//!
//! Each extension is bundled in watch mode while the server runs; build
//! results update the status reported in the manifest.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use anyhow::{Context, anyhow};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use storedev_core::UiExtension;
use storedev_core::domain::CHECKOUT_UI_EXTENSION;
use storedev_core::ports::{BundleOutcome, BundleRequest, ExtensionBundlerPort};
use storedev_runtime::ActionContext;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tower_http::services::ServeDir;
use tracing::{debug, info};

use crate::handlers::dev::ExtensionServerPlan;

const SUBSCRIPTION_EXTENSION: &str = "product_subscription";
const MANIFEST_VERSION: &str = "3";

/// Build state of one extension as shown in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Building,
    Success,
    Error,
}

struct ServerState {
    plan: ExtensionServerPlan,
    statuses: RwLock<BTreeMap<String, BuildStatus>>,
}

impl ServerState {
    fn new(plan: ExtensionServerPlan) -> Self {
        let statuses = plan
            .extensions
            .iter()
            .map(|ext| (ext.dev_uuid.clone(), BuildStatus::Building))
            .collect();
        Self {
            plan,
            statuses: RwLock::new(statuses),
        }
    }

    fn set_status(&self, uuid: &str, status: BuildStatus) {
        if let Ok(mut statuses) = self.statuses.write() {
            statuses.insert(uuid.to_string(), status);
        }
    }

    fn status(&self, uuid: &str) -> BuildStatus {
        self.statuses
            .read()
            .ok()
            .and_then(|statuses| statuses.get(uuid).copied())
            .unwrap_or(BuildStatus::Building)
    }

    fn extensions_url(&self) -> String {
        format!("{}/extensions", self.plan.url.trim_end_matches('/'))
    }

    /// Page the extension renders on when previewed.
    fn resource_url(&self, extension: &UiExtension) -> String {
        let url = match extension.extension_type.as_str() {
            CHECKOUT_UI_EXTENSION => self.plan.checkout_cart_url.as_deref(),
            SUBSCRIPTION_EXTENSION => self.plan.subscription_product_url.as_deref(),
            _ => None,
        };
        url.unwrap_or_default().to_string()
    }

    fn extension_manifest(&self, extension: &UiExtension) -> Value {
        let root = format!("{}/{}", self.extensions_url(), extension.dev_uuid);
        json!({
            "uuid": extension.dev_uuid,
            "type": extension.extension_type,
            "title": extension.title,
            "surface": extension.surface(),
            "extensionPoints": extension.targets,
            "development": {
                "root": { "url": root },
                "resource": { "url": self.resource_url(extension) },
                "status": self.status(&extension.dev_uuid),
                "hidden": false,
            },
            "assets": {
                "main": { "name": "main", "url": format!("{root}/assets/main.js") },
            },
        })
    }

    fn manifest(&self) -> Value {
        json!({
            "version": MANIFEST_VERSION,
            "root": { "url": self.extensions_url() },
            "store": self.plan.store_fqdn,
            "app": {
                "id": self.plan.app_id,
                "apiKey": self.plan.api_key,
                "url": self.plan.url,
                "grantedScopes": self.plan.granted_scopes,
            },
            "extensions": self
                .plan
                .extensions
                .iter()
                .map(|ext| self.extension_manifest(ext))
                .collect::<Vec<_>>(),
        })
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn dev_console_html(state: &ServerState) -> String {
    let rows: String = state
        .plan
        .extensions
        .iter()
        .map(|ext| {
            let resource = state.resource_url(ext);
            let link = if resource.is_empty() {
                format!("{}/{}", state.extensions_url(), ext.dev_uuid)
            } else {
                resource
            };
            format!(
                "<li><a href=\"{}\">{}</a> <small>{} - {:?}</small></li>",
                escape_html(&link),
                escape_html(&ext.title),
                escape_html(&ext.extension_type),
                state.status(&ext.dev_uuid),
            )
        })
        .collect();
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>Extensions</title></head>\
         <body><h1>{}</h1><ul>{rows}</ul></body></html>",
        escape_html(&state.plan.store_fqdn)
    )
}

async fn manifest(State(state): State<Arc<ServerState>>) -> Json<Value> {
    Json(state.manifest())
}

async fn dev_console(State(state): State<Arc<ServerState>>) -> Html<String> {
    Html(dev_console_html(&state))
}

async fn extension(
    State(state): State<Arc<ServerState>>,
    Path(uuid): Path<String>,
) -> Response {
    state
        .plan
        .extensions
        .iter()
        .find(|ext| ext.dev_uuid == uuid)
        .map_or_else(
            || (StatusCode::NOT_FOUND, format!("Extension {uuid} not found")).into_response(),
            |ext| Json(json!({ "extension": state.extension_manifest(ext) })).into_response(),
        )
}

fn router(state: Arc<ServerState>) -> Router {
    let mut router = Router::new()
        .route("/extensions", get(manifest))
        .route("/extensions/", get(manifest))
        .route("/extensions/dev-console", get(dev_console))
        .route("/extensions/:uuid", get(extension));
    for ext in &state.plan.extensions {
        let dist = ext
            .output_bundle_path
            .parent()
            .map_or_else(|| ext.directory.join("dist"), std::path::Path::to_path_buf);
        router = router.nest_service(
            &format!("/extensions/{}/assets", ext.dev_uuid),
            ServeDir::new(dist),
        );
    }
    router.with_state(state)
}

/// Bundle one extension until cancelled, recording every build.
async fn watch_extension(
    extension: UiExtension,
    state: Arc<ServerState>,
    bundler: Arc<dyn ExtensionBundlerPort>,
    ctx: ActionContext,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<BundleOutcome>();
    let request = BundleRequest {
        entry_point: extension.entry_point.clone(),
        output_path: extension.output_bundle_path.clone(),
        working_dir: extension.directory.clone(),
        env: state.plan.bundle_env.clone(),
        minify: false,
    };
    let watcher = bundler.watch(request, tx, ctx.cancel.clone());
    tokio::pin!(watcher);

    loop {
        tokio::select! {
            outcome = rx.recv() => match outcome {
                Some(outcome) if outcome.is_success() => {
                    state.set_status(&extension.dev_uuid, BuildStatus::Success);
                    for warning in &outcome.warnings {
                        ctx.stdout.line(format!("{}: {warning}", extension.local_identifier));
                    }
                    ctx.stdout.line(format!("Build succeeded: {}", extension.local_identifier));
                }
                Some(outcome) => {
                    state.set_status(&extension.dev_uuid, BuildStatus::Error);
                    for error in &outcome.errors {
                        ctx.stderr.line(format!("{}: {error}", extension.local_identifier));
                    }
                }
                None => break,
            },
            result = &mut watcher => return result.map_err(Into::into),
        }
    }
    watcher.await.map_err(Into::into)
}

/// Run the server and the extension watchers on `port` until cancelled.
pub async fn serve(
    plan: ExtensionServerPlan,
    bundler: Arc<dyn ExtensionBundlerPort>,
    ctx: ActionContext,
    port: u16,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind the extension server to port {port}"))?;
    let state = Arc::new(ServerState::new(plan));
    info!(port, extensions = state.plan.extensions.len(), "Extension server listening");

    let mut tasks: JoinSet<anyhow::Result<()>> = JoinSet::new();
    for extension in state.plan.extensions.clone() {
        tasks.spawn(watch_extension(
            extension,
            Arc::clone(&state),
            Arc::clone(&bundler),
            ctx.clone(),
        ));
    }

    let cancel = ctx.cancel.clone();
    let app = router(Arc::clone(&state));
    tasks.spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .context("Extension server failed")
    });

    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(|e| anyhow!("Extension server task stopped unexpectedly: {e}"));
        if let Err(e) = result.and_then(|result| result) {
            tasks.abort_all();
            return Err(e);
        }
    }
    debug!("Extension server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use storedev_runtime::OutputMux;
    use tokio_util::sync::CancellationToken;

    use crate::testing::{FakeBundler, ui_extension};

    fn plan(dir: &std::path::Path) -> ExtensionServerPlan {
        ExtensionServerPlan {
            app_id: "1".into(),
            api_key: "api-key".into(),
            store_fqdn: "my-store.myshopify.com".into(),
            url: "https://tunnel.example".into(),
            granted_scopes: vec!["write_products".into()],
            checkout_cart_url: Some("https://my-store.myshopify.com/cart/1:1".into()),
            subscription_product_url: None,
            extensions: vec![ui_extension(dir, "checkout", CHECKOUT_UI_EXTENSION)],
            bundle_env: BTreeMap::new(),
        }
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    async fn get_until_ready(url: &str) -> reqwest::Response {
        for _ in 0..50 {
            if let Ok(response) = reqwest::get(url).await {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("server at {url} never came up");
    }

    #[test]
    fn manifest_links_through_the_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let state = ServerState::new(plan(dir.path()));
        let manifest = state.manifest();

        assert_eq!(manifest["store"], "my-store.myshopify.com");
        assert_eq!(manifest["app"]["apiKey"], "api-key");
        let ext = &manifest["extensions"][0];
        assert_eq!(ext["uuid"], "dev-checkout");
        assert_eq!(ext["surface"], "checkout");
        assert_eq!(ext["development"]["status"], "building");
        assert_eq!(
            ext["development"]["resource"]["url"],
            "https://my-store.myshopify.com/cart/1:1"
        );
        assert_eq!(
            ext["assets"]["main"]["url"],
            "https://tunnel.example/extensions/dev-checkout/assets/main.js"
        );
    }

    #[test]
    fn dev_console_escapes_titles() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = plan(dir.path());
        plan.extensions[0].title = "<b>Checkout</b>".into();
        let html = dev_console_html(&ServerState::new(plan));
        assert!(html.contains("&lt;b&gt;Checkout&lt;/b&gt;"));
        assert!(html.contains("https://my-store.myshopify.com/cart/1:1"));
    }

    #[tokio::test]
    async fn serves_manifest_and_built_assets_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = Arc::new(FakeBundler::with_bundle(b"console.log('hi')".to_vec()));
        let (mux, mut rx) = OutputMux::new();
        let (stdout, stderr) = mux.pair("extensions");
        let cancel = CancellationToken::new();
        let ctx = ActionContext {
            stdout,
            stderr,
            cancel: cancel.clone(),
        };
        let port = free_port();

        let task = tokio::spawn(serve(plan(dir.path()), bundler.clone(), ctx, port));

        let line = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.text(), "Build succeeded: checkout");

        let base = format!("http://127.0.0.1:{port}/extensions");
        let manifest: Value = get_until_ready(&base).await.json().await.unwrap();
        assert_eq!(manifest["extensions"][0]["development"]["status"], "success");

        let asset = reqwest::get(format!("{base}/dev-checkout/assets/main.js"))
            .await
            .unwrap();
        assert_eq!(asset.status(), StatusCode::OK);
        assert_eq!(asset.text().await.unwrap(), "console.log('hi')");

        let missing = reqwest::get(format!("{base}/nope")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(bundler.requests().len(), 1);
    }
}
