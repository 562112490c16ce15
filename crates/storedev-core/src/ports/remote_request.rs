//! Raw GraphQL request port.

use async_trait::async_trait;

use super::RemoteError;

/// Sends one GraphQL document to the partner service.
#[async_trait]
pub trait RemoteRequestPort: Send + Sync {
    /// Execute `query` with `variables`, returning the `data` object.
    async fn request(
        &self,
        query: &str,
        token: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, RemoteError>;
}
