//! Summary printed once everything is planned, before processes start.

use std::fmt::Write;
use std::net::SocketAddr;

use console::style;
use storedev_core::AppUrls;

/// What happened to the remote app URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlsSummary {
    pub updated: bool,
    pub urls: AppUrls,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupSummary {
    pub app_title: String,
    pub store_fqdn: String,
    pub proxy_address: Option<SocketAddr>,
    pub preview_url: Option<String>,
    pub urls: Option<UrlsSummary>,
    /// Titles of served theme app extensions.
    pub theme_extensions: Vec<String>,
}

pub fn render_startup_summary(summary: &StartupSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} on {}",
        style("Running").green().bold(),
        style(&summary.app_title).bold(),
        summary.store_fqdn
    );

    match &summary.urls {
        Some(urls) if urls.updated => {
            let _ = writeln!(out, "{}", style("URL updated").green());
        }
        Some(urls) => {
            let _ = writeln!(
                out,
                "To make URL updates manually, you can add the following URLs as redirects in your Partners Dashboard:"
            );
            let _ = writeln!(out, "  App URL: {}", urls.urls.application_url);
            for redirect in &urls.urls.redirect_url_whitelist {
                let _ = writeln!(out, "  Redirect: {redirect}");
            }
        }
        None => {}
    }

    if let Some(address) = summary.proxy_address {
        let _ = writeln!(out, "Proxy listening on {address}");
    }
    if let Some(url) = &summary.preview_url {
        let _ = writeln!(out, "Preview URL: {}", style(url).cyan().underlined());
    }
    for title in &summary.theme_extensions {
        let _ = writeln!(
            out,
            "Theme app extension {title} is served with your development theme; open the theme editor to preview it."
        );
    }

    out.trim_end().to_string()
}
