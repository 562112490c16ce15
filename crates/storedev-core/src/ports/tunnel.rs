//! Public tunnel port.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::ToolError;

/// Exposes a local port on a public HTTPS URL.
#[async_trait]
pub trait TunnelPort: Send + Sync {
    /// Open a tunnel to `http://localhost:{port}` and return its public URL.
    ///
    /// The tunnel stays up until `cancel` fires.
    async fn open(
        &self,
        provider: &str,
        port: u16,
        cancel: CancellationToken,
    ) -> Result<String, ToolError>;
}
