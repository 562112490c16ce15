//! Dev context resolution backed by a per-project cache file.
//!
//! The cache lives at `<app>/.storedev/project.json` and remembers the app
//! and store of the previous session so later runs need no flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storedev_core::ports::{DevContextPort, PartnersPort};
use storedev_core::{AppConfiguration, ContextError, DevContext, DevOptions};
use tracing::{debug, info};

use super::toml_loader::APP_CONFIG_FILE;

pub const CACHE_DIR: &str = ".storedev";
pub const CACHE_FILE: &str = "project.json";
const STORE_DOMAIN: &str = ".myshopify.com";

/// What a project remembers between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCache {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_fqdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_urls: Option<bool>,
}

fn cache_path(directory: &Path) -> PathBuf {
    directory.join(CACHE_DIR).join(CACHE_FILE)
}

fn cache_error(path: &Path, err: impl std::fmt::Display) -> ContextError {
    ContextError::Cache(format!("{}: {err}", path.display()))
}

/// Read the project cache; a missing file is an empty cache.
pub fn read_cache(directory: &Path) -> Result<ProjectCache, ContextError> {
    let path = cache_path(directory);
    match std::fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(|e| cache_error(&path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProjectCache::default()),
        Err(e) => Err(cache_error(&path, e)),
    }
}

pub fn write_cache(directory: &Path, cache: &ProjectCache) -> Result<(), ContextError> {
    let path = cache_path(directory);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| cache_error(parent, e))?;
    }
    let json = serde_json::to_string_pretty(cache).map_err(|e| cache_error(&path, e))?;
    std::fs::write(&path, json).map_err(|e| cache_error(&path, e))
}

/// `My-Store`, `https://my-store.myshopify.com/` -> `my-store.myshopify.com`.
pub fn normalize_store_fqdn(store: &str) -> String {
    let store = store.trim();
    let store = store
        .strip_prefix("https://")
        .or_else(|| store.strip_prefix("http://"))
        .unwrap_or(store);
    let store = store.trim_end_matches('/').to_lowercase();
    if store.contains('.') {
        store
    } else {
        format!("{store}{STORE_DOMAIN}")
    }
}

/// `client_id` from the app configuration file, when it has one.
fn configured_client_id(directory: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(directory.join(APP_CONFIG_FILE)).ok()?;
    let config: AppConfiguration = toml::from_str(&raw).ok()?;
    config.client_id.filter(|id| !id.is_empty())
}

pub struct PartnersDevContext {
    partners: Arc<dyn PartnersPort>,
}

impl PartnersDevContext {
    pub fn new(partners: Arc<dyn PartnersPort>) -> Self {
        Self { partners }
    }
}

#[async_trait]
impl DevContextPort for PartnersDevContext {
    async fn resolve(&self, options: &DevOptions, token: &str) -> Result<DevContext, ContextError> {
        let directory = &options.directory;
        let cached = if options.reset {
            info!("Resetting the project configuration");
            ProjectCache::default()
        } else {
            read_cache(directory)?
        };

        let api_key = options
            .api_key
            .clone()
            .or_else(|| cached.api_key.clone())
            .or_else(|| configured_client_id(directory))
            .ok_or(ContextError::MissingClientId)?;
        let store_fqdn = options
            .store_fqdn
            .as_deref()
            .or(cached.store_fqdn.as_deref())
            .map(normalize_store_fqdn)
            .ok_or(ContextError::MissingStore)?;

        let remote_app = self
            .partners
            .fetch_app(&api_key, token)
            .await?
            .ok_or(ContextError::AppNotFound)?;

        let same_app = cached.api_key.as_deref() == Some(api_key.as_str());
        let update_urls = if same_app { cached.update_urls } else { None };
        debug!(api_key = %api_key, store = %store_fqdn, same_app, "Resolved dev context");

        write_cache(
            directory,
            &ProjectCache {
                api_key: Some(api_key),
                store_fqdn: Some(store_fqdn.clone()),
                update_urls,
            },
        )?;

        Ok(DevContext {
            store_fqdn,
            remote_app,
            remote_app_updated: !same_app,
            update_urls,
        })
    }

    async fn remember_update_urls(
        &self,
        directory: &Path,
        update: bool,
    ) -> Result<(), ContextError> {
        let mut cache = read_cache(directory)?;
        cache.update_urls = Some(update);
        write_cache(directory, &cache)
    }
}
