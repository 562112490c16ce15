//! Settings domain types and validation.
//!
//! Settings are read from `settings.json` in the storedev config directory.
//! Every field is optional; the `effective_*` accessors apply defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default GraphQL endpoint of the partner service.
pub const DEFAULT_PARTNERS_URL: &str = "https://partners.shopify.com/api/cli/graphql";

/// Seconds a subprocess gets between SIGTERM and SIGKILL.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Seconds in-flight proxy connections get to finish after cancellation.
pub const DEFAULT_PROXY_DRAIN_SECS: u64 = 5;

/// Seconds cancelled actions get to settle before they are aborted.
pub const DEFAULT_GROUP_DRAIN_SECS: u64 = 10;

/// Seconds to wait for a tunnel to report its public URL.
pub const DEFAULT_TUNNEL_TIMEOUT_SECS: u64 = 15;

/// Program that serves theme app extensions.
pub const DEFAULT_THEME_EXTENSION_COMMAND: &str = "shopify-theme-extension";

/// Webhooks path assumed when the backend declares none.
pub const DEFAULT_WEBHOOKS_PATH: &str = "/api/webhooks";

/// Prefix of the api key and secret variables handed to web processes.
pub const DEFAULT_ENV_PREFIX: &str = "SHOPIFY";

/// Application settings structure.
///
/// All fields are optional to support partial files and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// GraphQL endpoint of the partner service.
    pub partners_url: Option<String>,

    pub shutdown_grace_secs: Option<u64>,

    pub proxy_drain_secs: Option<u64>,

    pub group_drain_secs: Option<u64>,

    pub tunnel_timeout_secs: Option<u64>,

    /// Program (and leading arguments) that serves theme app extensions.
    pub theme_extension_command: Option<String>,

    pub webhooks_path: Option<String>,

    pub env_prefix: Option<String>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            partners_url: Some(DEFAULT_PARTNERS_URL.to_string()),
            shutdown_grace_secs: Some(DEFAULT_SHUTDOWN_GRACE_SECS),
            proxy_drain_secs: Some(DEFAULT_PROXY_DRAIN_SECS),
            group_drain_secs: Some(DEFAULT_GROUP_DRAIN_SECS),
            tunnel_timeout_secs: Some(DEFAULT_TUNNEL_TIMEOUT_SECS),
            theme_extension_command: Some(DEFAULT_THEME_EXTENSION_COMMAND.to_string()),
            webhooks_path: Some(DEFAULT_WEBHOOKS_PATH.to_string()),
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
        }
    }

    pub fn effective_partners_url(&self) -> &str {
        self.partners_url.as_deref().unwrap_or(DEFAULT_PARTNERS_URL)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(
            self.shutdown_grace_secs
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
        )
    }

    pub fn proxy_drain(&self) -> Duration {
        Duration::from_secs(self.proxy_drain_secs.unwrap_or(DEFAULT_PROXY_DRAIN_SECS))
    }

    pub fn group_drain(&self) -> Duration {
        Duration::from_secs(self.group_drain_secs.unwrap_or(DEFAULT_GROUP_DRAIN_SECS))
    }

    pub const fn effective_tunnel_timeout_secs(&self) -> u64 {
        match self.tunnel_timeout_secs {
            Some(secs) => secs,
            None => DEFAULT_TUNNEL_TIMEOUT_SECS,
        }
    }

    pub fn effective_theme_extension_command(&self) -> &str {
        self.theme_extension_command
            .as_deref()
            .unwrap_or(DEFAULT_THEME_EXTENSION_COMMAND)
    }

    pub fn effective_webhooks_path(&self) -> &str {
        self.webhooks_path.as_deref().unwrap_or(DEFAULT_WEBHOOKS_PATH)
    }

    pub fn effective_env_prefix(&self) -> &str {
        self.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX)
    }

    /// Read settings from `path`, falling back to defaults when it is missing.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(SettingsError::Unreadable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let settings: Self =
            serde_json::from_str(&raw).map_err(|e| SettingsError::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        validate_settings(&settings)?;
        Ok(settings)
    }
}

/// Location of the settings file, if a config directory exists.
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("storedev").join("settings.json"))
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("{field} must be at least 1 second")]
    ZeroDuration { field: &'static str },

    #[error(
        "group_drain_secs ({drain}) must be longer than shutdown_grace_secs ({grace}) so processes are stopped before they are abandoned"
    )]
    DrainShorterThanGrace { drain: u64, grace: u64 },

    #[error("Partners URL must start with http:// or https://, got {0}")]
    InvalidPartnersUrl(String),

    #[error("Webhooks path must start with '/', got {0}")]
    InvalidWebhooksPath(String),

    #[error("Theme extension command cannot be empty")]
    EmptyThemeCommand,

    #[error("Failed to read settings from {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    let durations = [
        ("shutdown_grace_secs", settings.shutdown_grace_secs),
        ("proxy_drain_secs", settings.proxy_drain_secs),
        ("group_drain_secs", settings.group_drain_secs),
        ("tunnel_timeout_secs", settings.tunnel_timeout_secs),
    ];
    for (field, value) in durations {
        if value == Some(0) {
            return Err(SettingsError::ZeroDuration { field });
        }
    }

    let drain = settings.group_drain().as_secs();
    let grace = settings.shutdown_grace().as_secs();
    if drain <= grace {
        return Err(SettingsError::DrainShorterThanGrace { drain, grace });
    }

    if let Some(url) = &settings.partners_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsError::InvalidPartnersUrl(url.clone()));
        }
    }

    if let Some(path) = &settings.webhooks_path {
        if !path.starts_with('/') {
            return Err(SettingsError::InvalidWebhooksPath(path.clone()));
        }
    }

    if settings
        .theme_extension_command
        .as_ref()
        .is_some_and(|cmd| cmd.trim().is_empty())
    {
        return Err(SettingsError::EmptyThemeCommand);
    }

    Ok(())
}
