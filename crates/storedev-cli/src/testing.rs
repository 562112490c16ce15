//! Hand-written port fakes shared by the handler tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use storedev_core::ports::{
    AppLoaderPort, BundleOutcome, BundleRequest, DependencyInstallerPort, DevContextPort,
    DevThemePort, ExtensionBundlerPort, ExtensionDraft, PartnersPort, ProductVariantPort,
    PromptPort, SessionPort, TunnelPort,
};
use storedev_core::{
    AdminSession, AppModel, AppUrls, ContextError, DevContext, DevOptions, ExtensionRegistration,
    LoaderError, PromptError, RemoteApp, RemoteError, SessionError, Settings, ToolError,
    UiExtension, UrlUpdateChoice, UserError, Web, WebCommands, WebConfiguration, WebType,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::{CliContext, CliPorts, bootstrap_with};

pub const TUNNEL_URL: &str = "https://tunnel.example";

pub fn test_app(dir: &Path) -> AppModel {
    AppModel {
        directory: dir.to_path_buf(),
        ..AppModel::default()
    }
}

pub fn web(dir: &Path, web_type: WebType, command: &str, port: Option<u16>) -> Web {
    Web {
        directory: dir.to_path_buf(),
        configuration: WebConfiguration {
            web_type,
            commands: WebCommands {
                dev: command.to_string(),
            },
            port,
            auth_callback_path: Vec::new(),
            webhooks_path: None,
        },
    }
}

pub fn ui_extension(dir: &Path, id: &str, kind: &str) -> UiExtension {
    let directory = dir.join("extensions").join(id);
    UiExtension {
        local_identifier: id.to_string(),
        title: id.to_string(),
        extension_type: kind.to_string(),
        entry_point: directory.join("src/index.js"),
        output_bundle_path: directory.join("dist/main.js"),
        directory,
        targets: vec!["purchase.checkout.block.render".to_string()],
        dev_uuid: format!("dev-{id}"),
        previewable: None,
        settings: serde_json::Value::Null,
    }
}

pub fn remote_app() -> RemoteApp {
    RemoteApp {
        id: "1".to_string(),
        title: "Test app".to_string(),
        api_key: "api-key".to_string(),
        api_secret: Some("api-secret".to_string()),
        granted_scopes: vec!["write_products".to_string()],
        new_app: false,
    }
}

#[derive(Debug, Default)]
pub struct FakeSession;

#[async_trait]
impl SessionPort for FakeSession {
    async fn partners_token(&self) -> Result<String, SessionError> {
        Ok("token".to_string())
    }

    async fn admin_session(&self, store_fqdn: &str) -> Result<AdminSession, SessionError> {
        Ok(AdminSession {
            token: "admin-token".to_string(),
            store_fqdn: store_fqdn.to_string(),
        })
    }

    async fn storefront_token(&self) -> Result<String, SessionError> {
        Ok("storefront-token".to_string())
    }
}

#[derive(Debug, Default)]
struct PartnersState {
    drafts: Vec<ExtensionDraft>,
    draft_errors: Vec<UserError>,
    current_urls: AppUrls,
    updated_urls: Vec<AppUrls>,
}

/// Partner service that records every mutation.
#[derive(Debug, Default)]
pub struct FakePartners {
    state: Mutex<PartnersState>,
}

impl FakePartners {
    pub fn sample_payload(&self) -> String {
        r#"{"id":1,"name":"Sample shop"}"#.to_string()
    }

    /// Reject every subsequent draft with `errors`.
    pub fn reject_drafts(&self, errors: Vec<UserError>) {
        self.state.lock().unwrap().draft_errors = errors;
    }

    pub fn updated_urls(&self) -> Vec<AppUrls> {
        self.state.lock().unwrap().updated_urls.clone()
    }

    /// Poll until `count` drafts arrived.
    pub async fn wait_for_drafts(&self, count: usize, timeout: Duration) -> Vec<ExtensionDraft> {
        tokio::time::timeout(timeout, async {
            loop {
                {
                    let state = self.state.lock().unwrap();
                    if state.drafts.len() >= count {
                        return state.drafts.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("drafts did not arrive in time")
    }
}

#[async_trait]
impl PartnersPort for FakePartners {
    async fn fetch_app(&self, _api_key: &str, _token: &str) -> Result<Option<RemoteApp>, RemoteError> {
        Ok(Some(remote_app()))
    }

    async fn get_urls(&self, _api_key: &str, _token: &str) -> Result<AppUrls, RemoteError> {
        Ok(self.state.lock().unwrap().current_urls.clone())
    }

    async fn update_urls(&self, urls: &AppUrls, _api_key: &str, _token: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.current_urls = urls.clone();
        state.updated_urls.push(urls.clone());
        Ok(())
    }

    async fn ensure_extension_ids(
        &self,
        app: &AppModel,
        _api_key: &str,
        _token: &str,
    ) -> Result<BTreeMap<String, ExtensionRegistration>, RemoteError> {
        let ids = app
            .ui_extensions
            .iter()
            .map(|ext| (&ext.local_identifier, &ext.title))
            .chain(
                app.theme_extensions
                    .iter()
                    .map(|ext| (&ext.local_identifier, &ext.title)),
            );
        Ok(ids
            .enumerate()
            .map(|(index, (id, title))| {
                (
                    id.clone(),
                    ExtensionRegistration {
                        uuid: format!("uuid-{id}"),
                        id: (index + 1).to_string(),
                        title: title.clone(),
                    },
                )
            })
            .collect())
    }

    async fn update_extension_draft(
        &self,
        draft: &ExtensionDraft,
        _token: &str,
    ) -> Result<Vec<UserError>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.drafts.push(draft.clone());
        Ok(state.draft_errors.clone())
    }

    async fn sample_webhook(&self, _topic: &str, _api_key: &str, _token: &str) -> Result<String, RemoteError> {
        Ok(self.sample_payload())
    }
}

/// Bundler that builds once per watch and then idles until cancelled.
#[derive(Debug, Default)]
pub struct FakeBundler {
    bundle: Option<Vec<u8>>,
    requests: Mutex<Vec<BundleRequest>>,
}

impl FakeBundler {
    /// Writes `bundle` to the output path and reports one successful build.
    pub fn with_bundle(bundle: Vec<u8>) -> Self {
        Self {
            bundle: Some(bundle),
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<BundleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtensionBundlerPort for FakeBundler {
    async fn watch(
        &self,
        request: BundleRequest,
        outcomes: mpsc::UnboundedSender<BundleOutcome>,
        cancel: CancellationToken,
    ) -> Result<(), ToolError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(bundle) = &self.bundle {
            if let Some(parent) = request.output_path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&request.output_path, bundle).unwrap();
            let _ = outcomes.send(BundleOutcome::default());
        }
        cancel.cancelled().await;
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeDevTheme {
    id: String,
    calls: AtomicUsize,
}

impl FakeDevTheme {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DevThemePort for FakeDevTheme {
    async fn find_or_create(&self, _session: &AdminSession) -> Result<String, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.id.clone())
    }
}

#[derive(Debug)]
pub struct FakeProductVariant {
    id: String,
    failure: Mutex<Option<RemoteError>>,
    calls: AtomicUsize,
}

impl FakeProductVariant {
    pub fn new(result: Result<String, RemoteError>) -> Self {
        let (id, failure) = match result {
            Ok(id) => (id, None),
            Err(e) => (String::new(), Some(e)),
        };
        Self {
            id,
            failure: Mutex::new(failure),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next lookup with `err`.
    pub fn fail_with(&self, err: RemoteError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductVariantPort for FakeProductVariant {
    async fn fetch_product_variant(&self, _store_fqdn: &str) -> Result<String, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure.lock().unwrap().take() {
            return Err(err);
        }
        Ok(self.id.clone())
    }
}

#[derive(Debug)]
pub struct FakeDevContext {
    context: Mutex<DevContext>,
}

impl Default for FakeDevContext {
    fn default() -> Self {
        Self {
            context: Mutex::new(DevContext {
                store_fqdn: "my-store.myshopify.com".to_string(),
                remote_app: remote_app(),
                remote_app_updated: false,
                update_urls: None,
            }),
        }
    }
}

impl FakeDevContext {
    pub fn set_new_app(&self, new_app: bool) {
        self.context.lock().unwrap().remote_app.new_app = new_app;
    }
}

#[async_trait]
impl DevContextPort for FakeDevContext {
    async fn resolve(&self, _options: &DevOptions, _token: &str) -> Result<DevContext, ContextError> {
        Ok(self.context.lock().unwrap().clone())
    }

    async fn remember_update_urls(&self, _directory: &Path, _update: bool) -> Result<(), ContextError> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeLoader {
    app: AppModel,
}

#[async_trait]
impl AppLoaderPort for FakeLoader {
    async fn load(&self, _directory: &Path) -> Result<AppModel, LoaderError> {
        Ok(self.app.clone())
    }
}

#[derive(Debug, Default)]
pub struct FakeInstaller {
    installs: AtomicUsize,
}

impl FakeInstaller {
    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DependencyInstallerPort for FakeInstaller {
    async fn install(&self, _app: &AppModel) -> Result<(), ToolError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeTunnel {
    opened: AtomicUsize,
}

impl FakeTunnel {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelPort for FakeTunnel {
    async fn open(&self, _provider: &str, _port: u16, _cancel: CancellationToken) -> Result<String, ToolError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(TUNNEL_URL.to_string())
    }
}

#[derive(Debug)]
pub struct FakePrompt {
    choice: UrlUpdateChoice,
    asked: AtomicUsize,
    silent: AtomicBool,
}

impl FakePrompt {
    pub fn new(choice: UrlUpdateChoice) -> Self {
        Self {
            choice,
            asked: AtomicUsize::new(0),
            silent: AtomicBool::new(false),
        }
    }

    /// Leave every later question unanswered, like a user who walked away.
    pub fn never_answer(&self) {
        self.silent.store(true, Ordering::SeqCst);
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PromptPort for FakePrompt {
    async fn choose_url_update(
        &self,
        _current: &AppUrls,
        _proposed: &AppUrls,
    ) -> Result<UrlUpdateChoice, PromptError> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        if self.silent.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.choice)
    }
}

/// A context wired entirely with fakes, with handles to inspect them.
pub struct TestFakes {
    pub ctx: CliContext,
    pub partners: Arc<FakePartners>,
    pub dev_context: Arc<FakeDevContext>,
    pub installer: Arc<FakeInstaller>,
    pub bundler: Arc<FakeBundler>,
    pub product_variant: Arc<FakeProductVariant>,
    pub tunnel: Arc<FakeTunnel>,
    pub prompt: Arc<FakePrompt>,
}

pub fn test_context(app: AppModel) -> TestFakes {
    let partners = Arc::new(FakePartners::default());
    let dev_context = Arc::new(FakeDevContext::default());
    let installer = Arc::new(FakeInstaller::default());
    let bundler = Arc::new(FakeBundler::default());
    let product_variant = Arc::new(FakeProductVariant::new(Ok("1".to_string())));
    let tunnel = Arc::new(FakeTunnel::default());
    let prompt = Arc::new(FakePrompt::new(UrlUpdateChoice::No));

    let settings = Settings {
        shutdown_grace_secs: Some(1),
        group_drain_secs: Some(2),
        proxy_drain_secs: Some(1),
        ..Settings::with_defaults()
    };
    let ctx = bootstrap_with(
        settings,
        CliPorts {
            session: Arc::new(FakeSession),
            partners: partners.clone(),
            dev_context: dev_context.clone(),
            app_loader: Arc::new(FakeLoader { app }),
            installer: installer.clone(),
            bundler: bundler.clone(),
            product_variant: product_variant.clone(),
            dev_theme: Arc::new(FakeDevTheme::new("1")),
            tunnel: tunnel.clone(),
            prompt: prompt.clone(),
        },
    );

    TestFakes {
        ctx,
        partners,
        dev_context,
        installer,
        bundler,
        product_variant,
        tunnel,
        prompt,
    }
}
