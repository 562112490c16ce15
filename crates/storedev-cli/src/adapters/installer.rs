//! Node dependency installation before a dev session.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use storedev_core::ports::DependencyInstallerPort;
use storedev_core::{AppModel, ToolError};
use tokio::process::Command;
use tracing::{debug, info};

/// Lines of stderr kept in a failure message.
const STDERR_TAIL: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManager {
    pub const fn binary(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }

    /// Pick the package manager from the lock file in `directory`.
    pub fn detect(directory: &Path) -> Self {
        if directory.join("yarn.lock").is_file() {
            Self::Yarn
        } else if directory.join("pnpm-lock.yaml").is_file() {
            Self::Pnpm
        } else {
            Self::Npm
        }
    }
}

/// App root first, then every web directory with its own `package.json`.
pub fn install_directories(app: &AppModel) -> Vec<PathBuf> {
    let mut dirs = vec![app.directory.clone()];
    for web in &app.webs {
        if web.directory != app.directory
            && web.directory.join("package.json").is_file()
            && !dirs.contains(&web.directory)
        {
            dirs.push(web.directory.clone());
        }
    }
    dirs
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PackageManagerInstaller;

impl PackageManagerInstaller {
    pub const fn new() -> Self {
        Self
    }

    async fn install_in(manager: PackageManager, directory: &Path) -> Result<(), ToolError> {
        let tool = manager.binary();
        let binary = which::which(tool).map_err(|_| ToolError::NotFound {
            tool: tool.to_string(),
        })?;
        info!(directory = %directory.display(), "Installing dependencies with {tool}");

        let output = Command::new(binary)
            .arg("install")
            .current_dir(directory)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolError::Failed {
                tool: tool.to_string(),
                message: e.to_string(),
            })?;
        if output.status.success() {
            return Ok(());
        }
        Err(ToolError::Failed {
            tool: tool.to_string(),
            message: format!(
                "install in {} exited with {}\n{}",
                directory.display(),
                output.status,
                tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL)
            ),
        })
    }
}

#[async_trait]
impl DependencyInstallerPort for PackageManagerInstaller {
    async fn install(&self, app: &AppModel) -> Result<(), ToolError> {
        let manager = PackageManager::detect(&app.directory);
        debug!(manager = manager.binary(), "Detected package manager");
        for directory in install_directories(app) {
            Self::install_in(manager, &directory).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_app, web};
    use storedev_core::WebType;

    #[test]
    fn lock_files_pick_the_manager() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Npm);
        std::fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Pnpm);
        std::fs::write(dir.path().join("yarn.lock"), "").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Yarn);
    }

    #[test]
    fn webs_with_manifests_are_installed_too() {
        let dir = tempfile::tempdir().unwrap();
        let frontend = dir.path().join("web/frontend");
        let backend = dir.path().join("web/backend");
        std::fs::create_dir_all(&frontend).unwrap();
        std::fs::create_dir_all(&backend).unwrap();
        std::fs::write(frontend.join("package.json"), "{}").unwrap();

        let mut app = test_app(dir.path());
        app.webs = vec![
            web(&frontend, WebType::Frontend, "npm run dev", None),
            web(&backend, WebType::Backend, "npm run dev", None),
        ];

        assert_eq!(install_directories(&app), vec![dir.path().to_path_buf(), frontend]);
    }

    #[test]
    fn stderr_tail_keeps_the_last_lines() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
    }
}
