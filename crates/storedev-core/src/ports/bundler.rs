//! Extension bundler port.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::ToolError;

/// What to bundle and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    pub entry_point: PathBuf,
    pub output_path: PathBuf,
    pub working_dir: PathBuf,
    /// Values exposed to the bundle as `process.env.*`.
    pub env: BTreeMap<String, String>,
    pub minify: bool,
}

/// Result of one (re)build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOutcome {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl BundleOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Bundles extension code in watch mode.
#[async_trait]
pub trait ExtensionBundlerPort: Send + Sync {
    /// Build, then rebuild on every source change until `cancel` fires.
    ///
    /// Every finished build sends one [`BundleOutcome`]. Returns `Ok(())` once
    /// cancelled; an `Err` means the watcher itself died.
    async fn watch(
        &self,
        request: BundleRequest,
        outcomes: mpsc::UnboundedSender<BundleOutcome>,
        cancel: CancellationToken,
    ) -> Result<(), ToolError>;
}
