//! Store admin API clients.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use storedev_core::ports::{DevThemePort, ProductVariantPort, SessionPort};
use storedev_core::{AdminSession, RemoteError};
use tracing::{debug, info};

use super::graphql::{execute, http_client};

pub const ADMIN_API_VERSION: &str = "2024-01";
pub const DEV_THEME_NAME: &str = "storedev development theme";
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const DEVELOPMENT_ROLE: &str = "development";

const FIRST_VARIANT_QUERY: &str = r"
query FirstProductVariant {
  products(first: 1) {
    edges { node { variants(first: 1) { edges { node { id } } } } }
  }
}";

/// Base URL of the admin API of `store_fqdn`.
fn admin_base(store_fqdn: &str) -> String {
    format!("https://{store_fqdn}/admin/api/{ADMIN_API_VERSION}")
}

/// Last path segment of a global id (`gid://shop/ProductVariant/42` -> `42`).
fn numeric_id(gid: &str) -> &str {
    gid.rsplit('/').next().unwrap_or(gid)
}

/// Looks up the first product variant of a store through the admin API.
pub struct AdminProductVariant {
    client: Client,
    session: Arc<dyn SessionPort>,
    base_override: Option<String>,
}

impl AdminProductVariant {
    pub fn new(session: Arc<dyn SessionPort>) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            session,
            base_override: None,
        })
    }

    /// Send requests to `base` instead of the store's own host.
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_override = Some(base.into());
        self
    }
}

#[async_trait]
impl ProductVariantPort for AdminProductVariant {
    async fn fetch_product_variant(&self, store_fqdn: &str) -> Result<String, RemoteError> {
        let session = self
            .session
            .admin_session(store_fqdn)
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let base = self
            .base_override
            .clone()
            .unwrap_or_else(|| admin_base(&session.store_fqdn));
        let request = self
            .client
            .post(format!("{base}/graphql.json"))
            .header(ACCESS_TOKEN_HEADER, &session.token);
        let data = execute(request, FIRST_VARIANT_QUERY, json!({})).await?;

        let gid = data["products"]["edges"][0]["node"]["variants"]["edges"][0]["node"]["id"]
            .as_str()
            .ok_or_else(|| {
                RemoteError::NotFound(format!(
                    "Couldn't find a product variant in {store_fqdn}. Add a product to build a cart URL."
                ))
            })?;
        debug!(store = %store_fqdn, variant = %gid, "Found product variant");
        Ok(numeric_id(gid).to_string())
    }
}

#[derive(Debug, Deserialize)]
struct Theme {
    id: u64,
    name: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct ThemeList {
    themes: Vec<Theme>,
}

#[derive(Debug, Deserialize)]
struct CreatedTheme {
    theme: Theme,
}

/// Finds or creates the store's development theme over the REST admin API.
pub struct AdminDevTheme {
    client: Client,
    name: String,
    base_override: Option<String>,
}

impl AdminDevTheme {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            name: DEV_THEME_NAME.to_string(),
            base_override: None,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_override = Some(base.into());
        self
    }

    fn base(&self, session: &AdminSession) -> String {
        self.base_override
            .clone()
            .unwrap_or_else(|| admin_base(&session.store_fqdn))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        request: reqwest::RequestBuilder,
    ) -> Result<T, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DevThemePort for AdminDevTheme {
    async fn find_or_create(&self, session: &AdminSession) -> Result<String, RemoteError> {
        let url = format!("{}/themes.json", self.base(session));

        let list: ThemeList = Self::send(
            self.client
                .get(&url)
                .header(ACCESS_TOKEN_HEADER, &session.token),
        )
        .await?;
        if let Some(theme) = list
            .themes
            .iter()
            .find(|theme| theme.role == DEVELOPMENT_ROLE && theme.name == self.name)
        {
            debug!(theme = theme.id, "Reusing development theme");
            return Ok(theme.id.to_string());
        }

        let created: CreatedTheme = Self::send(
            self.client
                .post(&url)
                .header(ACCESS_TOKEN_HEADER, &session.token)
                .json(&json!({ "theme": { "name": self.name, "role": DEVELOPMENT_ROLE } })),
        )
        .await?;
        info!(theme = created.theme.id, store = %session.store_fqdn, "Created development theme");
        Ok(created.theme.id.to_string())
    }
}
