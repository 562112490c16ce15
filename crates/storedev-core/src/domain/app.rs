//! Local application model.
//!
//! The model is produced by an [`AppLoaderPort`](crate::ports::AppLoaderPort)
//! from a project directory and is read-only for the rest of a dev session.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::surface::extension_point_target_surface;

/// Role of a web process inside the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebType {
    Frontend,
    Backend,
}

impl WebType {
    /// Label used for merged output lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
        }
    }
}

impl fmt::Display for WebType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands a web process declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebCommands {
    /// Command line started during development, split on whitespace.
    pub dev: String,
}

/// Configuration block of one web process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfiguration {
    #[serde(rename = "type")]
    pub web_type: WebType,
    pub commands: WebCommands,
    /// Fixed port requested by the project.
    #[serde(default)]
    pub port: Option<u16>,
    /// OAuth callback paths, appended to the public URL.
    #[serde(default)]
    pub auth_callback_path: Vec<String>,
    #[serde(default)]
    pub webhooks_path: Option<String>,
}

/// A web process (frontend or backend) rooted in its own directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Web {
    pub directory: PathBuf,
    pub configuration: WebConfiguration,
}

impl Web {
    /// Split the dev command into program and arguments.
    ///
    /// Returns `None` when the command is blank.
    pub fn dev_command(&self) -> Option<(String, Vec<String>)> {
        let mut parts = self.configuration.commands.dev.split_whitespace();
        let program = parts.next()?.to_string();
        Some((program, parts.map(str::to_string).collect()))
    }
}

/// Extension kinds that render inside a host surface and can be previewed
/// through the local extension dev server.
pub const PREVIEWABLE_EXTENSION_TYPES: &[&str] = &[
    "checkout_ui_extension",
    "checkout_post_purchase",
    "product_subscription",
    "pos_ui_extension",
    "customer_accounts_ui_extension",
    "ui_extension",
];

/// Kind of UI extension that needs a cart to be previewed.
pub const CHECKOUT_UI_EXTENSION: &str = "checkout_ui_extension";

/// A UI extension bundled from JavaScript sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiExtension {
    /// Directory name, stable across machines.
    pub local_identifier: String,
    pub title: String,
    pub extension_type: String,
    pub directory: PathBuf,
    pub entry_point: PathBuf,
    pub output_bundle_path: PathBuf,
    pub targets: Vec<String>,
    /// Identifier used by the dev server; replaced by the deployed id when known.
    pub dev_uuid: String,
    /// Explicit override of the per-type previewable default.
    pub previewable: Option<bool>,
    /// Extension-specific settings pushed with every draft.
    pub settings: serde_json::Value,
}

impl UiExtension {
    pub fn is_previewable(&self) -> bool {
        self.previewable
            .unwrap_or_else(|| PREVIEWABLE_EXTENSION_TYPES.contains(&self.extension_type.as_str()))
    }

    /// Surface of the first target that maps to one.
    pub fn surface(&self) -> Option<&'static str> {
        self.targets
            .iter()
            .find_map(|target| extension_point_target_surface(target))
    }

    /// Configuration sent alongside the serialized bundle.
    pub fn deploy_config(&self, serialized_script: &str) -> serde_json::Value {
        let mut config = match &self.settings {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        config.insert(
            "extension_points".to_string(),
            serde_json::Value::from(self.targets.clone()),
        );
        config.insert(
            "serialized_script".to_string(),
            serde_json::Value::from(serialized_script),
        );
        serde_json::Value::Object(config)
    }
}

/// A theme app extension served by the theme tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeExtension {
    pub local_identifier: String,
    pub title: String,
    pub directory: PathBuf,
}

/// App-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfiguration {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Comma separated access scopes.
    #[serde(default)]
    pub scopes: String,
}

/// Everything the dev workflow needs to know about the local project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppModel {
    pub directory: PathBuf,
    pub configuration: AppConfiguration,
    pub webs: Vec<Web>,
    pub ui_extensions: Vec<UiExtension>,
    pub theme_extensions: Vec<ThemeExtension>,
    /// Variables from the app's `.env` file.
    pub dotenv: BTreeMap<String, String>,
}

impl AppModel {
    pub fn web(&self, web_type: WebType) -> Option<&Web> {
        self.webs
            .iter()
            .find(|web| web.configuration.web_type == web_type)
    }

    pub fn has_web(&self) -> bool {
        !self.webs.is_empty()
    }

    /// Deployed extension ids stored in `.env` for a given api key.
    ///
    /// The file records which app it belongs to under `STOREDEV_API_KEY`; ids
    /// for a different app are ignored.
    pub fn env_extension_ids(&self, api_key: &str) -> BTreeMap<String, String> {
        if self.dotenv.get("STOREDEV_API_KEY").map(String::as_str) != Some(api_key) {
            return BTreeMap::new();
        }
        self.ui_extensions
            .iter()
            .filter_map(|ext| {
                let key = format!(
                    "STOREDEV_{}_ID",
                    ext.local_identifier.to_uppercase().replace('-', "_")
                );
                self.dotenv
                    .get(&key)
                    .map(|id| (ext.local_identifier.clone(), id.clone()))
            })
            .collect()
    }
}
