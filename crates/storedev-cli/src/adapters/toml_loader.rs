//! Project loader for `storedev.*.toml` files.
//!
//! Layout:
//!
//! ```text
//! <app>/storedev.app.toml
//! <app>/.env
//! <app>/web/**/storedev.web.toml
//! <app>/extensions/<id>/storedev.extension.toml
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use storedev_core::ports::AppLoaderPort;
use storedev_core::{
    AppConfiguration, AppModel, LoaderError, ThemeExtension, UiExtension, Web, WebCommands,
    WebConfiguration, WebType,
};
use tracing::debug;

pub const APP_CONFIG_FILE: &str = "storedev.app.toml";
pub const WEB_CONFIG_FILE: &str = "storedev.web.toml";
pub const EXTENSION_CONFIG_FILE: &str = "storedev.extension.toml";

const THEME_EXTENSION_TYPE: &str = "theme";
const ENTRY_POINT_CANDIDATES: &[&str] = &[
    "src/index.js",
    "src/index.jsx",
    "src/index.ts",
    "src/index.tsx",
];
/// Directories never searched for web configurations.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist"];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(path) => vec![path],
            Self::Many(paths) => paths,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawWeb {
    #[serde(rename = "type")]
    web_type: WebType,
    commands: WebCommands,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    auth_callback_path: Option<OneOrMany>,
    #[serde(default)]
    webhooks_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawExtension {
    #[serde(rename = "type")]
    extension_type: String,
    name: String,
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    entry_point: Option<PathBuf>,
    #[serde(default)]
    previewable: Option<bool>,
    #[serde(default)]
    settings: Option<toml::Table>,
}

enum LoadedExtension {
    Ui(UiExtension),
    Theme(ThemeExtension),
}

fn io_error(path: &Path, err: &std::io::Error) -> LoaderError {
    LoaderError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

fn parse_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoaderError> {
    let raw = std::fs::read_to_string(path).map_err(|e| io_error(path, &e))?;
    toml::from_str(&raw).map_err(|e| LoaderError::Parse {
        path: path.display().to_string(),
        message: e.message().to_string(),
    })
}

/// Every `name` file below `root`, in a stable order.
fn find_files(root: &Path, name: &str) -> Result<Vec<PathBuf>, LoaderError> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(io_error(&dir, &e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&dir, &e))?;
            let path = entry.path();
            let file_name = entry.file_name();
            if path.is_dir() {
                if !SKIPPED_DIRS.iter().any(|skip| file_name == *skip) {
                    pending.push(path);
                }
            } else if file_name == name {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn load_web(path: &Path) -> Result<Web, LoaderError> {
    let raw: RawWeb = parse_toml(path)?;
    let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(Web {
        directory,
        configuration: WebConfiguration {
            web_type: raw.web_type,
            commands: raw.commands,
            port: raw.port,
            auth_callback_path: raw
                .auth_callback_path
                .map(OneOrMany::into_vec)
                .unwrap_or_default(),
            webhooks_path: raw.webhooks_path,
        },
    })
}

fn load_extension(path: &Path) -> Result<LoadedExtension, LoaderError> {
    let raw: RawExtension = parse_toml(path)?;
    let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let local_identifier = directory
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    if raw.extension_type == THEME_EXTENSION_TYPE {
        return Ok(LoadedExtension::Theme(ThemeExtension {
            local_identifier,
            title: raw.name,
            directory,
        }));
    }

    let entry_point = match raw.entry_point {
        Some(entry) => directory.join(entry),
        None => ENTRY_POINT_CANDIDATES
            .iter()
            .map(|candidate| directory.join(candidate))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| LoaderError::Parse {
                path: path.display().to_string(),
                message: format!(
                    "No entry point found. Add one of {} or set entry_point.",
                    ENTRY_POINT_CANDIDATES.join(", ")
                ),
            })?,
    };
    let settings = raw
        .settings
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| LoaderError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
        .unwrap_or(serde_json::Value::Null);

    Ok(LoadedExtension::Ui(UiExtension {
        dev_uuid: format!("dev-{local_identifier}"),
        local_identifier,
        title: raw.name,
        extension_type: raw.extension_type,
        output_bundle_path: directory.join("dist").join("main.js"),
        entry_point,
        directory,
        targets: raw.targets,
        previewable: raw.previewable,
        settings,
    }))
}

fn load_dotenv(directory: &Path) -> Result<BTreeMap<String, String>, LoaderError> {
    let path = directory.join(".env");
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    let entries = dotenvy::from_path_iter(&path).map_err(|e| LoaderError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    entries
        .map(|entry| {
            entry.map_err(|e| LoaderError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Load the app rooted at `directory`.
pub fn load_app(directory: &Path) -> Result<AppModel, LoaderError> {
    let app_file = directory.join(APP_CONFIG_FILE);
    if !app_file.is_file() {
        return Err(LoaderError::NotFound(directory.display().to_string()));
    }
    let configuration: AppConfiguration = parse_toml(&app_file)?;

    let mut webs: Vec<Web> = Vec::new();
    for path in find_files(&directory.join("web"), WEB_CONFIG_FILE)? {
        let web = load_web(&path)?;
        if webs
            .iter()
            .any(|known| known.configuration.web_type == web.configuration.web_type)
        {
            return Err(LoaderError::Parse {
                path: path.display().to_string(),
                message: format!(
                    "Only one web of type {} is allowed",
                    web.configuration.web_type
                ),
            });
        }
        webs.push(web);
    }

    let mut ui_extensions = Vec::new();
    let mut theme_extensions = Vec::new();
    let extensions_dir = directory.join("extensions");
    if extensions_dir.is_dir() {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&extensions_dir)
            .map_err(|e| io_error(&extensions_dir, &e))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.join(EXTENSION_CONFIG_FILE).is_file())
            .collect();
        dirs.sort();
        for dir in dirs {
            match load_extension(&dir.join(EXTENSION_CONFIG_FILE))? {
                LoadedExtension::Ui(ext) => ui_extensions.push(ext),
                LoadedExtension::Theme(ext) => theme_extensions.push(ext),
            }
        }
    }

    debug!(
        webs = webs.len(),
        ui_extensions = ui_extensions.len(),
        theme_extensions = theme_extensions.len(),
        "Loaded app"
    );

    Ok(AppModel {
        directory: directory.to_path_buf(),
        configuration,
        webs,
        ui_extensions,
        theme_extensions,
        dotenv: load_dotenv(directory)?,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TomlAppLoader;

impl TomlAppLoader {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AppLoaderPort for TomlAppLoader {
    async fn load(&self, directory: &Path) -> Result<AppModel, LoaderError> {
        let directory = directory.to_path_buf();
        tokio::task::spawn_blocking(move || load_app(&directory))
            .await
            .map_err(|e| LoaderError::Io {
                path: String::new(),
                message: e.to_string(),
            })?
    }
}
