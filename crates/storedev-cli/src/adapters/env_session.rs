//! Tokens handed in through the environment.

use async_trait::async_trait;
use storedev_core::ports::SessionPort;
use storedev_core::{AdminSession, SessionError};

pub const PARTNERS_TOKEN_VAR: &str = "STOREDEV_PARTNERS_TOKEN";
pub const ADMIN_TOKEN_VAR: &str = "STOREDEV_ADMIN_TOKEN";
pub const STOREFRONT_TOKEN_VAR: &str = "STOREDEV_STOREFRONT_TOKEN";

/// Session backed by pre-issued tokens.
#[derive(Debug, Clone, Default)]
pub struct EnvSession {
    partners: Option<String>,
    admin: Option<String>,
    storefront: Option<String>,
}

impl EnvSession {
    pub const fn new(
        partners: Option<String>,
        admin: Option<String>,
        storefront: Option<String>,
    ) -> Self {
        Self {
            partners,
            admin,
            storefront,
        }
    }

    /// Read tokens once; blank values count as missing.
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self::new(
            read(PARTNERS_TOKEN_VAR),
            read(ADMIN_TOKEN_VAR),
            read(STOREFRONT_TOKEN_VAR),
        )
    }
}

fn require(
    token: Option<&String>,
    service: &'static str,
    variable: &'static str,
) -> Result<String, SessionError> {
    token
        .cloned()
        .ok_or(SessionError::MissingToken { service, variable })
}

#[async_trait]
impl SessionPort for EnvSession {
    async fn partners_token(&self) -> Result<String, SessionError> {
        require(self.partners.as_ref(), "partner", PARTNERS_TOKEN_VAR)
    }

    async fn admin_session(&self, store_fqdn: &str) -> Result<AdminSession, SessionError> {
        Ok(AdminSession {
            token: require(self.admin.as_ref(), "admin", ADMIN_TOKEN_VAR)?,
            store_fqdn: store_fqdn.to_string(),
        })
    }

    async fn storefront_token(&self) -> Result<String, SessionError> {
        require(self.storefront.as_ref(), "storefront", STOREFRONT_TOKEN_VAR)
    }
}
