//! Project loader port.

use std::path::Path;

use async_trait::async_trait;

use super::LoaderError;
use crate::domain::AppModel;

/// Builds the application model from a project directory.
#[async_trait]
pub trait AppLoaderPort: Send + Sync {
    async fn load(&self, directory: &Path) -> Result<AppModel, LoaderError>;
}
