//! Records owned by the remote partner and admin services.

use serde::{Deserialize, Serialize};

/// The remote app a dev session is bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteApp {
    pub id: String,
    pub title: String,
    pub api_key: String,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub granted_scopes: Vec<String>,
    /// The app was created during this session.
    #[serde(default)]
    pub new_app: bool,
}

/// URLs registered on the remote app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUrls {
    pub application_url: String,
    pub redirect_url_whitelist: Vec<String>,
}

/// Credentials for the admin API of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub token: String,
    pub store_fqdn: String,
}

/// A remote extension registration, keyed by local identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRegistration {
    pub uuid: String,
    pub id: String,
    pub title: String,
}
