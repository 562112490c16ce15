//! Store-side collaborators: product variants and development themes.

use async_trait::async_trait;

use super::RemoteError;
use crate::domain::AdminSession;

/// Fetches a product variant to build a cart for checkout previews.
#[async_trait]
pub trait ProductVariantPort: Send + Sync {
    async fn fetch_product_variant(&self, store_fqdn: &str) -> Result<String, RemoteError>;
}

/// Finds the development theme of a store, creating it when missing.
#[async_trait]
pub trait DevThemePort: Send + Sync {
    /// Returns the theme id.
    async fn find_or_create(&self, session: &AdminSession) -> Result<String, RemoteError>;
}
