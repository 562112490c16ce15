//! Intent-based operations against the partner service.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::RemoteError;
use crate::domain::{AppModel, AppUrls, ExtensionRegistration, RemoteApp, UserError};

/// A new draft of a UI extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDraft {
    pub api_key: String,
    pub registration_id: String,
    pub config: serde_json::Value,
}

/// Operations the dev workflow performs on the remote app record.
#[async_trait]
pub trait PartnersPort: Send + Sync {
    /// Look up an app by api key.
    async fn fetch_app(&self, api_key: &str, token: &str)
    -> Result<Option<RemoteApp>, RemoteError>;

    async fn get_urls(&self, api_key: &str, token: &str) -> Result<AppUrls, RemoteError>;

    /// Replace the registered URLs. User errors are returned as
    /// [`RemoteError::UserErrors`].
    async fn update_urls(
        &self,
        urls: &AppUrls,
        api_key: &str,
        token: &str,
    ) -> Result<(), RemoteError>;

    /// Make sure every extension of `app` is registered remotely.
    ///
    /// Returns registrations keyed by local identifier. Missing registrations
    /// are created.
    async fn ensure_extension_ids(
        &self,
        app: &AppModel,
        api_key: &str,
        token: &str,
    ) -> Result<BTreeMap<String, ExtensionRegistration>, RemoteError>;

    /// Push a draft; a rejected draft is reported through the returned user
    /// errors rather than as an `Err`.
    async fn update_extension_draft(
        &self,
        draft: &ExtensionDraft,
        token: &str,
    ) -> Result<Vec<UserError>, RemoteError>;

    /// Sample payload for a webhook topic, as a JSON string.
    async fn sample_webhook(
        &self,
        topic: &str,
        api_key: &str,
        token: &str,
    ) -> Result<String, RemoteError>;
}
