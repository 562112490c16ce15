//! Partner service operations expressed as GraphQL documents.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use storedev_core::ports::{ExtensionDraft, PartnersPort, RemoteRequestPort};
use storedev_core::{AppModel, AppUrls, ExtensionRegistration, RemoteApp, RemoteError, UserError};
use tracing::{debug, info};

const FIND_APP_QUERY: &str = r"
query FindApp($apiKey: String!) {
  app(apiKey: $apiKey) {
    id
    title
    apiKey
    apiSecretKeys { secret }
    grantedScopes
  }
}";

const GET_URLS_QUERY: &str = r"
query GetURLs($apiKey: String!) {
  app(apiKey: $apiKey) {
    applicationUrl
    redirectUrlWhitelist
  }
}";

const UPDATE_URLS_MUTATION: &str = r"
mutation appUpdate($apiKey: String!, $applicationUrl: Url!, $redirectUrlWhitelist: [Url]!) {
  appUpdate(input: {apiKey: $apiKey, applicationUrl: $applicationUrl, redirectUrlWhitelist: $redirectUrlWhitelist}) {
    userErrors { message field }
  }
}";

const EXTENSION_REGISTRATIONS_QUERY: &str = r"
query ExtensionRegistrations($apiKey: String!) {
  app(apiKey: $apiKey) {
    extensionRegistrations { id uuid title type }
  }
}";

const EXTENSION_CREATE_MUTATION: &str = r"
mutation ExtensionCreate($apiKey: String!, $type: ExtensionType!, $title: String!, $config: JSON!, $context: String) {
  extensionCreate(input: {apiKey: $apiKey, type: $type, title: $title, config: $config, context: $context}) {
    extensionRegistration { id uuid title type }
    userErrors { message field }
  }
}";

const EXTENSION_UPDATE_DRAFT_MUTATION: &str = r"
mutation ExtensionUpdateDraft($apiKey: String!, $registrationId: ID!, $config: JSON!, $context: String) {
  extensionUpdateDraft(input: {apiKey: $apiKey, registrationId: $registrationId, config: $config, context: $context}) {
    userErrors { message field }
  }
}";

const API_VERSIONS_QUERY: &str = r"
query PublicApiVersions {
  publicApiVersions { handle }
}";

const SAMPLE_WEBHOOK_MUTATION: &str = r"
mutation samplePayload($topic: String!, $apiVersion: String!, $apiKey: String, $address: String!, $deliveryMethod: String!, $sharedSecret: String!) {
  sendSampleWebhook(input: {topic: $topic, apiVersion: $apiVersion, apiKey: $apiKey, address: $address, deliveryMethod: $deliveryMethod, sharedSecret: $sharedSecret}) {
    samplePayload
    success
    userErrors { message field }
  }
}";

/// Remote type of theme app extensions.
const THEME_EXTENSION_TYPE: &str = "THEME_APP_EXTENSION";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawApp {
    id: String,
    title: String,
    api_key: String,
    #[serde(default)]
    api_secret_keys: Vec<RawSecret>,
    #[serde(default)]
    granted_scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSecret {
    secret: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRegistration {
    id: String,
    uuid: String,
    title: String,
    #[serde(rename = "type")]
    kind: String,
}

impl From<RawRegistration> for ExtensionRegistration {
    fn from(raw: RawRegistration) -> Self {
        Self {
            uuid: raw.uuid,
            id: raw.id,
            title: raw.title,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserErrorsPayload {
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionCreatePayload {
    extension_registration: Option<RawRegistration>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SampleWebhookPayload {
    sample_payload: Option<String>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Take `data.<key>`, failing when absent.
fn field(mut data: Value, key: &str) -> Result<Value, RemoteError> {
    match data.get_mut(key).map(Value::take) {
        Some(value) => Ok(value),
        None => Err(RemoteError::Decode(format!("missing field {key}"))),
    }
}

fn app_not_found(api_key: &str) -> RemoteError {
    RemoteError::NotFound(format!("Couldn't find an app with api key {api_key}"))
}

/// Latest stable API version handle, e.g. `2024-01`.
fn latest_stable_version(handles: &[String]) -> Option<&str> {
    handles
        .iter()
        .map(String::as_str)
        .filter(|handle| handle.len() == 7 && handle.as_bytes()[4] == b'-')
        .max()
}

/// [`PartnersPort`] over any [`RemoteRequestPort`].
#[derive(Clone)]
pub struct PartnersClient {
    remote: Arc<dyn RemoteRequestPort>,
}

impl PartnersClient {
    pub fn new(remote: Arc<dyn RemoteRequestPort>) -> Self {
        Self { remote }
    }

    async fn registrations(&self, api_key: &str, token: &str) -> Result<Vec<RawRegistration>, RemoteError> {
        let data = self
            .remote
            .request(EXTENSION_REGISTRATIONS_QUERY, token, json!({ "apiKey": api_key }))
            .await?;
        let app = field(data, "app")?;
        if app.is_null() {
            return Err(app_not_found(api_key));
        }
        decode(field(app, "extensionRegistrations")?)
    }

    async fn create_extension(
        &self,
        api_key: &str,
        kind: &str,
        title: &str,
        token: &str,
    ) -> Result<RawRegistration, RemoteError> {
        let variables = json!({
            "apiKey": api_key,
            "type": kind,
            "title": title,
            "config": "{}",
            "context": null,
        });
        let data = self
            .remote
            .request(EXTENSION_CREATE_MUTATION, token, variables)
            .await?;
        let payload: ExtensionCreatePayload = decode(field(data, "extensionCreate")?)?;
        if !payload.user_errors.is_empty() {
            return Err(RemoteError::UserErrors(payload.user_errors));
        }
        payload
            .extension_registration
            .ok_or_else(|| RemoteError::Decode("extensionCreate returned no registration".to_string()))
    }
}

#[async_trait]
impl PartnersPort for PartnersClient {
    async fn fetch_app(&self, api_key: &str, token: &str) -> Result<Option<RemoteApp>, RemoteError> {
        let data = self
            .remote
            .request(FIND_APP_QUERY, token, json!({ "apiKey": api_key }))
            .await?;
        let app = field(data, "app")?;
        if app.is_null() {
            return Ok(None);
        }
        let raw: RawApp = decode(app)?;
        Ok(Some(RemoteApp {
            id: raw.id,
            title: raw.title,
            api_key: raw.api_key,
            api_secret: raw.api_secret_keys.into_iter().next().map(|key| key.secret),
            granted_scopes: raw.granted_scopes,
            new_app: false,
        }))
    }

    async fn get_urls(&self, api_key: &str, token: &str) -> Result<AppUrls, RemoteError> {
        let data = self
            .remote
            .request(GET_URLS_QUERY, token, json!({ "apiKey": api_key }))
            .await?;
        let app = field(data, "app")?;
        if app.is_null() {
            return Err(app_not_found(api_key));
        }
        decode(app)
    }

    async fn update_urls(&self, urls: &AppUrls, api_key: &str, token: &str) -> Result<(), RemoteError> {
        let variables = json!({
            "apiKey": api_key,
            "applicationUrl": urls.application_url,
            "redirectUrlWhitelist": urls.redirect_url_whitelist,
        });
        let data = self
            .remote
            .request(UPDATE_URLS_MUTATION, token, variables)
            .await?;
        let payload: UserErrorsPayload = decode(field(data, "appUpdate")?)?;
        if !payload.user_errors.is_empty() {
            return Err(RemoteError::UserErrors(payload.user_errors));
        }
        info!(url = %urls.application_url, "Updated app URLs");
        Ok(())
    }

    async fn ensure_extension_ids(
        &self,
        app: &AppModel,
        api_key: &str,
        token: &str,
    ) -> Result<BTreeMap<String, ExtensionRegistration>, RemoteError> {
        let mut remote = self.registrations(api_key, token).await?;

        let local = app
            .ui_extensions
            .iter()
            .map(|ext| {
                (
                    ext.local_identifier.as_str(),
                    ext.title.as_str(),
                    ext.extension_type.to_uppercase(),
                    Some(ext.dev_uuid.as_str()),
                )
            })
            .chain(app.theme_extensions.iter().map(|ext| {
                (
                    ext.local_identifier.as_str(),
                    ext.title.as_str(),
                    THEME_EXTENSION_TYPE.to_string(),
                    None,
                )
            }));

        let mut ids = BTreeMap::new();
        for (local_id, title, kind, uuid) in local {
            // A known uuid wins; otherwise match on title and type.
            let position = remote
                .iter()
                .position(|reg| uuid.is_some_and(|uuid| reg.uuid == uuid))
                .or_else(|| {
                    remote
                        .iter()
                        .position(|reg| reg.title == title && reg.kind == kind)
                });
            let registration = match position {
                Some(index) => remote.swap_remove(index),
                None => {
                    debug!(extension = %local_id, %kind, "Creating extension registration");
                    self.create_extension(api_key, &kind, title, token).await?
                }
            };
            ids.insert(local_id.to_string(), registration.into());
        }
        Ok(ids)
    }

    async fn update_extension_draft(
        &self,
        draft: &ExtensionDraft,
        token: &str,
    ) -> Result<Vec<UserError>, RemoteError> {
        let config = serde_json::to_string(&draft.config)
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        let variables = json!({
            "apiKey": draft.api_key,
            "registrationId": draft.registration_id,
            "config": config,
            "context": null,
        });
        let data = self
            .remote
            .request(EXTENSION_UPDATE_DRAFT_MUTATION, token, variables)
            .await?;
        let payload: UserErrorsPayload = decode(field(data, "extensionUpdateDraft")?)?;
        Ok(payload.user_errors)
    }

    async fn sample_webhook(&self, topic: &str, api_key: &str, token: &str) -> Result<String, RemoteError> {
        let data = self.remote.request(API_VERSIONS_QUERY, token, json!({})).await?;
        let versions: Vec<Value> = decode(field(data, "publicApiVersions")?)?;
        let handles: Vec<String> = versions
            .iter()
            .filter_map(|version| version["handle"].as_str().map(str::to_string))
            .collect();
        let api_version = latest_stable_version(&handles)
            .ok_or_else(|| RemoteError::NotFound("No stable API version available".to_string()))?;

        let variables = json!({
            "topic": topic,
            "apiVersion": api_version,
            "apiKey": api_key,
            "address": "http://localhost",
            "deliveryMethod": "localhost",
            "sharedSecret": "",
        });
        let data = self
            .remote
            .request(SAMPLE_WEBHOOK_MUTATION, token, variables)
            .await?;
        let payload: SampleWebhookPayload = decode(field(data, "sendSampleWebhook")?)?;
        if !payload.user_errors.is_empty() {
            return Err(RemoteError::UserErrors(payload.user_errors));
        }
        payload
            .sample_payload
            .ok_or_else(|| RemoteError::Decode("sendSampleWebhook returned no payload".to_string()))
    }
}
