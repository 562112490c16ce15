//! Dependency installation port.

use async_trait::async_trait;

use super::ToolError;
use crate::domain::AppModel;

#[async_trait]
pub trait DependencyInstallerPort: Send + Sync {
    async fn install(&self, app: &AppModel) -> Result<(), ToolError>;
}
