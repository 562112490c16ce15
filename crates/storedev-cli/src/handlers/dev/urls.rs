//! Public URL generation and reconciliation with the remote app record.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use storedev_core::ports::{DevContextPort, PromptPort, TunnelPort};
use storedev_core::{AppModel, AppUrls, DevContext, DevOptions, WebType};
use storedev_runtime::PortPlanner;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::DevError;

/// Redirect paths registered when a backend declares none.
const DEFAULT_AUTH_CALLBACK_PATHS: &[&str] =
    &["/auth/callback", "/auth/shopify/callback", "/api/auth/callback"];

/// Tunnel provider used when none is named on the command line.
pub const DEFAULT_TUNNEL_PROVIDER: &str = "cloudflare";

/// Where the app is reachable from the outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendUrl {
    /// Scheme and host, without a port.
    pub url: String,
    /// Local port behind `url`: the proxy when tunnelled, the frontend
    /// process otherwise.
    pub port: u16,
    pub using_localhost: bool,
}

impl FrontendUrl {
    /// URL visitors use, including the port on localhost.
    pub fn exposed_url(&self) -> String {
        if self.using_localhost {
            format!("{}:{}", self.url, self.port)
        } else {
            self.url.clone()
        }
    }
}

/// Split a `https://<host>:<port>` tunnel URL.
pub fn parse_tunnel_url(tunnel_url: &str) -> Result<(String, u16), DevError> {
    let invalid = || {
        DevError::Configuration(format!(
            "Invalid tunnel URL: {tunnel_url}. Valid format: \"https://my-tunnel-url:port\""
        ))
    };

    let start = tunnel_url.find("https://").ok_or_else(invalid)?;
    let rest = &tunnel_url[start + "https://".len()..];
    let (host, after) = rest.split_once(':').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }
    let digits: String = after.chars().take_while(char::is_ascii_digit).collect();
    let port: u16 = digits.parse().map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }

    Ok((format!("https://{host}"), port))
}

/// Decide how the app is exposed and claim the matching port.
///
/// A tunnel URL from the flags wins; otherwise a tunnel is opened when there
/// is anything to expose, unless tunnelling is disabled. The tunnel lives
/// until `cancel` fires.
pub async fn generate_frontend_url(
    options: &DevOptions,
    app: &AppModel,
    tunnel: &dyn TunnelPort,
    planner: &mut PortPlanner,
    cancel: &CancellationToken,
) -> Result<FrontendUrl, DevError> {
    if let Some(tunnel_url) = &options.tunnel_url {
        let (url, port) = parse_tunnel_url(tunnel_url)?;
        planner.claim(storedev_runtime::PROXY_PREFIX, port)?;
        return Ok(FrontendUrl {
            url,
            port,
            using_localhost: false,
        });
    }

    let needs_tunnel = (app.has_web() || !app.ui_extensions.is_empty()) && !options.no_tunnel;
    if needs_tunnel {
        let port = planner.allocate(storedev_runtime::PROXY_PREFIX, None)?;
        let provider = options
            .tunnel_provider
            .as_deref()
            .unwrap_or(DEFAULT_TUNNEL_PROVIDER);
        info!(provider, port, "Opening tunnel");
        let url = tunnel.open(provider, port, cancel.child_token()).await?;
        return Ok(FrontendUrl {
            url,
            port,
            using_localhost: false,
        });
    }

    let label = WebType::Frontend.as_str();
    let port = match app.web(WebType::Frontend).and_then(|web| web.configuration.port) {
        Some(port) => planner.claim(label, port)?,
        None => planner.allocate(label, None)?,
    };
    Ok(FrontendUrl {
        url: "http://localhost".to_string(),
        port,
        using_localhost: true,
    })
}

/// URLs to register for `base_url`.
pub fn generate_partners_urls(base_url: &str, auth_callback_paths: &[String]) -> AppUrls {
    let redirect_url_whitelist = if auth_callback_paths.is_empty() {
        DEFAULT_AUTH_CALLBACK_PATHS
            .iter()
            .map(|path| format!("{base_url}{path}"))
            .collect()
    } else {
        auth_callback_paths
            .iter()
            .filter(|path| !path.is_empty())
            .map(|path| format!("{base_url}{path}"))
            .collect()
    };

    AppUrls {
        application_url: base_url.to_string(),
        redirect_url_whitelist,
    }
}

/// Whether the remote URLs should be replaced with `proposed`.
///
/// New apps always update. A remembered answer is used as is. Otherwise the
/// user is asked, unless nothing would change; "always" and "never" are
/// remembered for the project.
pub async fn should_update_urls(
    context: &DevContext,
    current: &AppUrls,
    proposed: &AppUrls,
    directory: &Path,
    prompt: &dyn PromptPort,
    dev_context: &dyn DevContextPort,
) -> Result<bool, DevError> {
    if context.remote_app.new_app {
        return Ok(true);
    }
    if let Some(update) = context.update_urls {
        debug!(update, "Using remembered URL update preference");
        return Ok(update);
    }
    if current == proposed {
        return Ok(false);
    }

    let choice = prompt.choose_url_update(current, proposed).await?;
    if let Some(remembered) = choice.remembered() {
        dev_context
            .remember_update_urls(directory, remembered)
            .await?;
    }
    Ok(choice.should_update())
}

/// Admin entry point for an app served at `public_url`.
pub fn build_app_url_for_web(store_fqdn: &str, public_url: &str) -> String {
    let host = STANDARD_NO_PAD.encode(format!("{store_fqdn}/admin"));
    format!("{public_url}?shop={store_fqdn}&host={host}")
}
