//! Credential lookup for the remote services.

use async_trait::async_trait;

use super::SessionError;
use crate::domain::AdminSession;

/// Supplies tokens for the partner, admin and storefront services.
///
/// Token acquisition (login flows, refresh) happens outside this tool; the
/// port only hands out what is already available.
#[async_trait]
pub trait SessionPort: Send + Sync {
    async fn partners_token(&self) -> Result<String, SessionError>;

    async fn admin_session(&self, store_fqdn: &str) -> Result<AdminSession, SessionError>;

    async fn storefront_token(&self) -> Result<String, SessionError>;
}
