//! `storedev dev`: run an app, its extensions and a proxy locally.
//!
//! The workflow is a straight line:
//!
//! 1. resolve the dev context (token, remote app, store)
//! 2. load the project and install its dependencies
//! 3. validate fixed ports and plan the rest
//! 4. expose the app and reconcile the remote URLs
//! 5. assemble targets
//! 6. launch them, behind the proxy when any target is routable
//!
//! Everything up to step 6 fails before a process or listener starts. An
//! interrupt during those steps drops the call in flight and launches nothing.

mod drafts;
mod error;
mod launch;
mod ports;
mod targets;
mod theme;
mod urls;
mod webhook;

use std::collections::BTreeMap;

use storedev_core::domain::CHECKOUT_UI_EXTENSION;
use storedev_core::ports::ProductVariantPort;
use storedev_core::{AppModel, DevOptions, WebType};
use storedev_runtime::{
    OutputMux, PROXY_PREFIX, PortPlanner, PreparedSession, PreviewUrl, SessionConfig,
    SupervisorConfig, prepare_session,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bootstrap::CliContext;
use crate::presentation::{OutputRenderer, StartupSummary, UrlsSummary, render_startup_summary};

pub use error::DevError;
pub use launch::LaunchDeps;
pub use targets::{
    Assembly, CommandPlan, DevTarget, DraftExtension, DraftPlan, ExtensionServerPlan,
    ThemeSetup, WebhookPlan, Work, assemble_targets,
};
pub use urls::{
    FrontendUrl, build_app_url_for_web, generate_partners_urls, parse_tunnel_url,
};
pub use webhook::sign_payload;

/// Host the session proxy binds to.
const PROXY_HOST: &str = "0.0.0.0";

/// Run a dev session until it fails or the user interrupts it.
///
/// Ctrl-C cancels the session; pressing it again while shutting down has no
/// further effect.
pub async fn execute(ctx: &CliContext, options: DevOptions) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let interrupts = spawn_interrupt_handler(cancel.clone());

    let (output, lines) = OutputMux::new();
    let renderer = tokio::spawn(OutputRenderer::stdout().run(lines));

    let result = run(ctx, options, &output, &cancel).await;

    // Also stops a tunnel opened during planning.
    cancel.cancel();
    interrupts.abort();
    drop(output);
    if let Err(e) = renderer.await {
        debug!(error = %e, "Output renderer stopped abnormally");
    }

    result.map_err(Into::into)
}

fn spawn_interrupt_handler(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if cancel.is_cancelled() {
                debug!("Interrupt received while already shutting down");
            } else {
                info!("Interrupt received, shutting down");
                cancel.cancel();
            }
        }
    })
}

/// The whole workflow, with output going to `output`.
///
/// Cancelling before launch resolves `Ok` without touching the remote app.
pub async fn run(
    ctx: &CliContext,
    options: DevOptions,
    output: &OutputMux,
    cancel: &CancellationToken,
) -> Result<(), DevError> {
    let planned = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        planned = plan(ctx, options, cancel) => Some(planned?),
    };
    let Some((session, summary)) = planned else {
        info!("Interrupted before launch");
        return Ok(());
    };

    println!("{}", render_startup_summary(&summary));
    session.run(output, cancel).await?;
    info!("Dev session finished");
    Ok(())
}

/// Everything that happens before a target runs, proxy binding included.
async fn plan(
    ctx: &CliContext,
    options: DevOptions,
    cancel: &CancellationToken,
) -> Result<(PreparedSession, StartupSummary), DevError> {
    let settings = &ctx.settings;

    let token = ctx.session.partners_token().await?;
    let dev_context = ctx.dev_context.resolve(&options, &token).await?;
    let remote_app = &dev_context.remote_app;
    let api_key = remote_app.api_key.clone();
    info!(app = %remote_app.title, store = %dev_context.store_fqdn, "Resolved dev context");

    let mut app = ctx.app_loader.load(&options.directory).await?;
    if !options.skip_dependencies_installation {
        ctx.installer.install(&app).await?;
    }

    let backend = app.web(WebType::Backend).cloned();
    let frontend = app.web(WebType::Frontend).cloned();
    ports::validate_custom_ports(backend.as_ref(), frontend.as_ref())?;

    let mut planner = PortPlanner::new();
    let backend_label = WebType::Backend.as_str();
    let backend_port = match backend.as_ref().and_then(|web| web.configuration.port) {
        Some(port) => planner.claim(backend_label, port)?,
        None => planner.allocate(backend_label, None)?,
    };

    let frontend_url = urls::generate_frontend_url(
        &options,
        &app,
        ctx.tunnel.as_ref(),
        &mut planner,
        cancel,
    )
    .await?;
    let exposed_url = frontend_url.exposed_url();
    let proxy_port = if frontend_url.using_localhost {
        planner.allocate(PROXY_PREFIX, None)?
    } else {
        frontend_url.port
    };
    let proxy_url = if frontend_url.using_localhost {
        format!("{}:{proxy_port}", frontend_url.url)
    } else {
        frontend_url.url.clone()
    };

    let mut preview_url = None;
    let mut urls_summary = None;
    if app.has_web() && options.update {
        let current = ctx.partners.get_urls(&api_key, &token).await?;
        let callback_paths = backend
            .as_ref()
            .map(|web| web.configuration.auth_callback_path.clone())
            .unwrap_or_default();
        let proposed = urls::generate_partners_urls(&exposed_url, &callback_paths);
        let update = urls::should_update_urls(
            &dev_context,
            &current,
            &proposed,
            &app.directory,
            ctx.prompt.as_ref(),
            ctx.dev_context.as_ref(),
        )
        .await?;
        if update {
            ctx.partners.update_urls(&proposed, &api_key, &token).await?;
        }
        urls_summary = Some(UrlsSummary {
            updated: update,
            urls: proposed,
        });
        preview_url = Some(urls::build_app_url_for_web(
            &dev_context.store_fqdn,
            &exposed_url,
        ));
    }
    if !app.ui_extensions.is_empty() {
        preview_url = Some(format!("{proxy_url}/extensions/dev-console"));
    }

    let env_ids = app.env_extension_ids(&api_key);
    for extension in &mut app.ui_extensions {
        if let Some(id) = env_ids.get(&extension.local_identifier) {
            extension.dev_uuid.clone_from(id);
        }
    }
    let registrations = if app.ui_extensions.is_empty() && app.theme_extensions.is_empty() {
        BTreeMap::new()
    } else {
        ctx.partners
            .ensure_extension_ids(&app, &api_key, &token)
            .await?
    };

    let checkout_cart_url = build_cart_url_if_needed(
        &app,
        &dev_context.store_fqdn,
        options.checkout_cart_url.as_deref(),
        ctx.product_variant.as_ref(),
    )
    .await?;

    let theme = theme::theme_setup(
        &app,
        &options,
        &dev_context.store_fqdn,
        &token,
        settings.effective_theme_extension_command(),
        settings.effective_env_prefix(),
        ctx.session.as_ref(),
        ctx.dev_theme.as_ref(),
    )
    .await?;

    let targets = targets::assemble_targets(&Assembly {
        app: &app,
        env_prefix: settings.effective_env_prefix(),
        remote_app,
        remote_app_updated: dev_context.remote_app_updated,
        store_fqdn: &dev_context.store_fqdn,
        frontend: &frontend_url,
        backend_port,
        proxy_url: &proxy_url,
        registrations: &registrations,
        checkout_cart_url: checkout_cart_url.as_deref(),
        subscription_product_url: options.subscription_product_url.as_deref(),
        default_webhooks_path: settings.effective_webhooks_path(),
        theme: theme.as_ref(),
    });
    let proxied = targets.iter().filter(|target| target.is_proxied()).count();
    debug!(targets = targets.len(), proxied, "Assembled targets");

    let deps = LaunchDeps {
        bundler: ctx.bundler.clone(),
        partners: ctx.partners.clone(),
        token,
        grace: settings.shutdown_grace(),
    };
    let config = SessionConfig {
        proxy: SupervisorConfig {
            host: PROXY_HOST.to_string(),
            port: proxy_port,
            drain_timeout: settings.proxy_drain(),
            preview_url: PreviewUrl::new(preview_url.clone()),
        },
        group_drain: settings.group_drain(),
    };
    let session =
        prepare_session(config, launch::runtime_targets(targets, &deps), &mut planner).await?;

    let summary = StartupSummary {
        app_title: remote_app.title.clone(),
        store_fqdn: dev_context.store_fqdn.clone(),
        proxy_address: session.proxy_address(),
        preview_url,
        urls: urls_summary,
        theme_extensions: app
            .theme_extensions
            .iter()
            .map(|extension| extension.title.clone())
            .collect(),
    };
    Ok((session, summary))
}

/// Cart path for checkout previews, when a checkout UI extension is served.
///
/// An explicit URL wins; otherwise the store's first product variant is used
/// and failing to find one is fatal.
pub async fn build_cart_url_if_needed(
    app: &AppModel,
    store_fqdn: &str,
    checkout_cart_url: Option<&str>,
    product_variant: &dyn ProductVariantPort,
) -> Result<Option<String>, DevError> {
    let has_checkout_extension = app
        .ui_extensions
        .iter()
        .any(|ext| ext.is_previewable() && ext.extension_type == CHECKOUT_UI_EXTENSION);
    if !has_checkout_extension {
        return Ok(None);
    }
    if let Some(url) = checkout_cart_url {
        return Ok(Some(url.to_string()));
    }
    let variant_id = product_variant.fetch_product_variant(store_fqdn).await?;
    Ok(Some(format!("/cart/{variant_id}:1")))
}
