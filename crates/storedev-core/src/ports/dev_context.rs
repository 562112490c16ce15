//! Dev context resolution port.

use std::path::Path;

use async_trait::async_trait;

use super::ContextError;
use crate::domain::{DevContext, DevOptions};

/// Resolves which remote app and store a session targets.
#[async_trait]
pub trait DevContextPort: Send + Sync {
    async fn resolve(&self, options: &DevOptions, token: &str) -> Result<DevContext, ContextError>;

    /// Persist the answer to the URL update question for this project.
    async fn remember_update_urls(&self, directory: &Path, update: bool)
    -> Result<(), ContextError>;
}
