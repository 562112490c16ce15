//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter. All concrete implementations are instantiated here:
//! - Session tokens from the environment
//! - Partner service client (GraphQL over reqwest)
//! - Project loader and dev context cache
//! - Local tools: package manager, esbuild, cloudflared
//! - Admin API clients and the interactive prompt
//!
//! Command handlers receive the fully-composed `CliContext` and only talk to
//! ports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use storedev_core::ports::{
    AppLoaderPort, DependencyInstallerPort, DevContextPort, DevThemePort, ExtensionBundlerPort,
    PartnersPort, ProductVariantPort, PromptPort, RemoteRequestPort, SessionPort, TunnelPort,
};
use storedev_core::{Settings, settings_path, validate_settings};

use crate::adapters::{
    AdminDevTheme, CloudflaredTunnel, EnvSession, EsbuildBundler, GraphqlClient,
    PackageManagerInstaller, PartnersClient, PartnersDevContext, StdinPrompt,
    AdminProductVariant, TomlAppLoader,
};

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Settings file; `None` uses built-in defaults.
    pub settings_path: Option<PathBuf>,
}

impl CliConfig {
    /// Create config with the default settings location.
    pub fn with_defaults() -> Self {
        Self {
            settings_path: settings_path(),
        }
    }
}

/// Fully composed application context for CLI commands.
#[derive(Clone)]
pub struct CliContext {
    pub settings: Settings,
    pub session: Arc<dyn SessionPort>,
    pub partners: Arc<dyn PartnersPort>,
    pub dev_context: Arc<dyn DevContextPort>,
    pub app_loader: Arc<dyn AppLoaderPort>,
    pub installer: Arc<dyn DependencyInstallerPort>,
    pub bundler: Arc<dyn ExtensionBundlerPort>,
    pub product_variant: Arc<dyn ProductVariantPort>,
    pub dev_theme: Arc<dyn DevThemePort>,
    pub tunnel: Arc<dyn TunnelPort>,
    pub prompt: Arc<dyn PromptPort>,
}

/// Every port the CLI needs, for wiring a context by hand.
pub struct CliPorts {
    pub session: Arc<dyn SessionPort>,
    pub partners: Arc<dyn PartnersPort>,
    pub dev_context: Arc<dyn DevContextPort>,
    pub app_loader: Arc<dyn AppLoaderPort>,
    pub installer: Arc<dyn DependencyInstallerPort>,
    pub bundler: Arc<dyn ExtensionBundlerPort>,
    pub product_variant: Arc<dyn ProductVariantPort>,
    pub dev_theme: Arc<dyn DevThemePort>,
    pub tunnel: Arc<dyn TunnelPort>,
    pub prompt: Arc<dyn PromptPort>,
}

/// Bootstrap the CLI application.
///
/// This is the composition root. It:
/// 1. Loads and validates settings
/// 2. Creates the partner service client
/// 3. Creates the local tool adapters
/// 4. Creates the admin API clients
pub fn bootstrap(config: &CliConfig) -> Result<CliContext> {
    // 1. Settings
    let settings = match &config.settings_path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::with_defaults(),
    };
    validate_settings(&settings)?;

    // 2. Partner service
    let session: Arc<dyn SessionPort> = Arc::new(EnvSession::from_env());
    let remote: Arc<dyn RemoteRequestPort> =
        Arc::new(GraphqlClient::new(settings.effective_partners_url())?);
    let partners: Arc<dyn PartnersPort> = Arc::new(PartnersClient::new(remote));
    let dev_context: Arc<dyn DevContextPort> = Arc::new(PartnersDevContext::new(partners.clone()));

    // 3. Local tools
    let tunnel_timeout = Duration::from_secs(settings.effective_tunnel_timeout_secs());
    let ports = CliPorts {
        session: session.clone(),
        partners,
        dev_context,
        app_loader: Arc::new(TomlAppLoader::new()),
        installer: Arc::new(PackageManagerInstaller::new()),
        bundler: Arc::new(EsbuildBundler::new(settings.shutdown_grace())),
        // 4. Admin API
        product_variant: Arc::new(AdminProductVariant::new(session.clone())?),
        dev_theme: Arc::new(AdminDevTheme::new()?),
        tunnel: Arc::new(CloudflaredTunnel::new(tunnel_timeout, settings.shutdown_grace())),
        prompt: Arc::new(StdinPrompt),
    };

    Ok(bootstrap_with(settings, ports))
}

/// Bootstrap with custom ports (for testing).
pub fn bootstrap_with(settings: Settings, ports: CliPorts) -> CliContext {
    CliContext {
        settings,
        session: ports.session,
        partners: ports.partners,
        dev_context: ports.dev_context,
        app_loader: ports.app_loader,
        installer: ports.installer,
        bundler: ports.bundler,
        product_variant: ports.product_variant,
        dev_theme: ports.dev_theme,
        tunnel: ports.tunnel,
        prompt: ports.prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_file_bootstraps_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            settings_path: Some(dir.path().join("settings.json")),
        };
        let ctx = bootstrap(&config).unwrap();
        assert_eq!(ctx.settings.effective_env_prefix(), "SHOPIFY");
    }

    #[test]
    fn invalid_settings_fail_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"shutdown_grace_secs": 0}"#).unwrap();
        let config = CliConfig {
            settings_path: Some(path),
        };
        assert!(bootstrap(&config).is_err());
    }
}
