//! Target assembly.
//!
//! [`assemble_targets`] turns the loaded project and everything resolved while
//! planning into a closed list of [`DevTarget`]s. It starts nothing and reads
//! nothing from the outside world; [`super::launch`] turns the result into
//! runnable actions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use storedev_core::{
    AppModel, ExtensionRegistration, RemoteApp, ThemeExtension, UiExtension, Web, WebType,
};

use super::urls::FrontendUrl;

pub const EXTENSIONS_PREFIX: &str = "extensions";
pub const EXTENSIONS_PATH: &str = "/extensions";
pub const WEBHOOKS_PREFIX: &str = "webhooks";

/// A command line with its working directory and environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    /// Variables set to the port assigned at bind time.
    pub port_vars: Vec<&'static str>,
}

/// Local dev server for previewable UI extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionServerPlan {
    pub app_id: String,
    pub api_key: String,
    pub store_fqdn: String,
    /// Public URL of the proxy, used in links and as `APP_URL` for bundles.
    pub url: String,
    pub granted_scopes: Vec<String>,
    pub checkout_cart_url: Option<String>,
    pub subscription_product_url: Option<String>,
    pub extensions: Vec<UiExtension>,
    pub bundle_env: BTreeMap<String, String>,
}

/// A non-previewable extension and its remote registration, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftExtension {
    pub extension: UiExtension,
    pub registration_id: Option<String>,
}

/// Rebuild non-previewable extensions and push each build as a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftPlan {
    pub api_key: String,
    pub extensions: Vec<DraftExtension>,
    pub bundle_env: BTreeMap<String, String>,
}

/// Deliver one `app/uninstalled` webhook to the local backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookPlan {
    pub address: String,
    pub api_key: String,
    pub api_secret: String,
    pub store_fqdn: String,
}

/// What a target does once started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    Command(CommandPlan),
    ExtensionServer(ExtensionServerPlan),
    Drafts(DraftPlan),
    UninstallWebhook(WebhookPlan),
}

/// One unit of launched work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevTarget {
    /// Reachable through the proxy; gets its port when the proxy binds.
    Proxied {
        log_prefix: String,
        path_prefix: Option<String>,
        custom_port: Option<u16>,
        work: Work,
    },
    Plain { prefix: String, work: Work },
}

impl DevTarget {
    pub fn prefix(&self) -> &str {
        match self {
            Self::Proxied { log_prefix, .. } => log_prefix,
            Self::Plain { prefix, .. } => prefix,
        }
    }

    pub const fn work(&self) -> &Work {
        match self {
            Self::Proxied { work, .. } | Self::Plain { work, .. } => work,
        }
    }

    pub const fn is_proxied(&self) -> bool {
        matches!(self, Self::Proxied { .. })
    }
}

/// Resolved inputs of the theme extension server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSetup {
    /// Configured command, split on whitespace.
    pub command: String,
    pub theme: String,
    /// The theme was created or looked up for this session.
    pub generate_tmp_theme: bool,
    pub port: Option<u16>,
    /// Tokens handed to the theme tooling.
    pub env: BTreeMap<String, String>,
}

/// Everything target assembly needs.
#[derive(Debug, Clone, Copy)]
pub struct Assembly<'a> {
    pub app: &'a AppModel,
    /// Prefix of the api key and secret variables, e.g. `SHOPIFY`.
    pub env_prefix: &'a str,
    pub remote_app: &'a RemoteApp,
    pub remote_app_updated: bool,
    pub store_fqdn: &'a str,
    pub frontend: &'a FrontendUrl,
    pub backend_port: u16,
    pub proxy_url: &'a str,
    pub registrations: &'a BTreeMap<String, ExtensionRegistration>,
    pub checkout_cart_url: Option<&'a str>,
    pub subscription_product_url: Option<&'a str>,
    pub default_webhooks_path: &'a str,
    pub theme: Option<&'a ThemeSetup>,
}

/// Build the list of targets for a session.
///
/// Order: previewable extensions, non-previewable extensions, theme
/// extension, backend, frontend, uninstall webhook.
pub fn assemble_targets(input: &Assembly<'_>) -> Vec<DevTarget> {
    let app = input.app;
    let mut targets = Vec::new();

    let (previewable, non_previewable): (Vec<&UiExtension>, Vec<&UiExtension>) =
        app.ui_extensions.iter().partition(|ext| ext.is_previewable());

    if !previewable.is_empty() {
        targets.push(DevTarget::Proxied {
            log_prefix: EXTENSIONS_PREFIX.to_string(),
            path_prefix: Some(EXTENSIONS_PATH.to_string()),
            custom_port: None,
            work: Work::ExtensionServer(ExtensionServerPlan {
                app_id: input.remote_app.id.clone(),
                api_key: input.remote_app.api_key.clone(),
                store_fqdn: input.store_fqdn.to_string(),
                url: input.proxy_url.to_string(),
                granted_scopes: input.remote_app.granted_scopes.clone(),
                checkout_cart_url: input.checkout_cart_url.map(str::to_string),
                subscription_product_url: input.subscription_product_url.map(str::to_string),
                extensions: previewable.into_iter().cloned().collect(),
                bundle_env: bundle_env(app, input.proxy_url),
            }),
        });
    }

    if !non_previewable.is_empty() {
        let extensions = non_previewable
            .into_iter()
            .map(|extension| DraftExtension {
                registration_id: input
                    .registrations
                    .get(&extension.local_identifier)
                    .map(|registration| registration.id.clone()),
                extension: extension.clone(),
            })
            .collect();
        targets.push(DevTarget::Plain {
            prefix: EXTENSIONS_PREFIX.to_string(),
            work: Work::Drafts(DraftPlan {
                api_key: input.remote_app.api_key.clone(),
                extensions,
                bundle_env: bundle_env(app, input.proxy_url),
            }),
        });
    }

    if let (Some(extension), Some(setup)) = (app.theme_extensions.first(), input.theme) {
        if let Some(plan) = theme_command(extension, setup, input) {
            targets.push(DevTarget::Plain {
                prefix: EXTENSIONS_PREFIX.to_string(),
                work: Work::Command(plan),
            });
        }
    }

    let backend = app.web(WebType::Backend);
    if let Some(web) = backend {
        let port = input.backend_port.to_string();
        let mut env = web_env(input, &input.frontend.exposed_url());
        env.insert("PORT".into(), port.clone());
        env.insert("SERVER_PORT".into(), port.clone());
        env.insert("BACKEND_PORT".into(), port);
        if let Some(plan) = web_command(web, env, Vec::new()) {
            targets.push(DevTarget::Plain {
                prefix: WebType::Backend.as_str().to_string(),
                work: Work::Command(plan),
            });
        }
    }

    if let Some(web) = app.web(WebType::Frontend) {
        let hostname = input.frontend.url.as_str();
        let mut env = web_env(input, hostname);
        env.insert("BACKEND_PORT".into(), input.backend_port.to_string());
        env.insert("APP_URL".into(), hostname.to_string());
        env.insert("APP_ENV".into(), "development".into());

        let label = WebType::Frontend.as_str().to_string();
        if input.frontend.using_localhost {
            let port = input.frontend.port.to_string();
            for var in FRONTEND_PORT_VARS {
                env.insert((*var).to_string(), port.clone());
            }
            if let Some(plan) = web_command(web, env, Vec::new()) {
                targets.push(DevTarget::Plain {
                    prefix: label,
                    work: Work::Command(plan),
                });
            }
        } else if let Some(plan) = web_command(web, env, FRONTEND_PORT_VARS.to_vec()) {
            targets.push(DevTarget::Proxied {
                log_prefix: label,
                path_prefix: None,
                custom_port: web.configuration.port,
                work: Work::Command(plan),
            });
        }
    }

    if let Some(web) = backend {
        if input.remote_app_updated {
            let path = web
                .configuration
                .webhooks_path
                .as_deref()
                .filter(|path| !path.is_empty())
                .unwrap_or(input.default_webhooks_path);
            targets.push(DevTarget::Plain {
                prefix: WEBHOOKS_PREFIX.to_string(),
                work: Work::UninstallWebhook(WebhookPlan {
                    address: format!("http://localhost:{}{path}", input.backend_port),
                    api_key: input.remote_app.api_key.clone(),
                    api_secret: input.remote_app.api_secret.clone().unwrap_or_default(),
                    store_fqdn: input.store_fqdn.to_string(),
                }),
            });
        }
    }

    targets
}

const FRONTEND_PORT_VARS: &[&str] = &["PORT", "FRONTEND_PORT", "SERVER_PORT"];

/// Variables shared by every web process.
fn web_env(input: &Assembly<'_>, hostname: &str) -> BTreeMap<String, String> {
    let prefix = input.env_prefix;
    BTreeMap::from([
        (format!("{prefix}_API_KEY"), input.remote_app.api_key.clone()),
        (
            format!("{prefix}_API_SECRET"),
            input.remote_app.api_secret.clone().unwrap_or_default(),
        ),
        ("HOST".to_string(), hostname.to_string()),
        ("SCOPES".to_string(), input.app.configuration.scopes.clone()),
        ("NODE_ENV".to_string(), "development".to_string()),
    ])
}

fn web_command(
    web: &Web,
    env: BTreeMap<String, String>,
    port_vars: Vec<&'static str>,
) -> Option<CommandPlan> {
    let Some((program, args)) = web.dev_command() else {
        tracing::warn!(web = %web.configuration.web_type, "Web has no dev command, skipping");
        return None;
    };
    Some(CommandPlan {
        program,
        args,
        cwd: web.directory.clone(),
        env,
        port_vars,
    })
}

fn bundle_env(app: &AppModel, url: &str) -> BTreeMap<String, String> {
    let mut env = app.dotenv.clone();
    env.insert("APP_URL".to_string(), url.to_string());
    env
}

fn theme_command(
    extension: &ThemeExtension,
    setup: &ThemeSetup,
    input: &Assembly<'_>,
) -> Option<CommandPlan> {
    let mut parts = setup.command.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    let mut args: Vec<String> = parts.collect();

    let extension_id = input
        .registrations
        .get(&extension.local_identifier)
        .map(|registration| registration.id.clone())
        .unwrap_or_default();

    args.extend([
        "extension".to_string(),
        "serve".to_string(),
        extension.directory.display().to_string(),
        "--api-key".to_string(),
        input.remote_app.api_key.clone(),
        "--extension-id".to_string(),
        extension_id,
        "--extension-title".to_string(),
        extension.local_identifier.clone(),
        "--extension-type".to_string(),
        "THEME_APP_EXTENSION".to_string(),
        "--theme".to_string(),
        setup.theme.clone(),
    ]);
    if let Some(port) = setup.port {
        args.extend(["--port".to_string(), port.to_string()]);
    }
    if setup.generate_tmp_theme {
        args.push("--generate-tmp-theme".to_string());
    }

    Some(CommandPlan {
        program,
        args,
        cwd: input.app.directory.clone(),
        env: setup.env.clone(),
        port_vars: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use storedev_core::{AppConfiguration, WebCommands, WebConfiguration};

    fn web(web_type: WebType, dev: &str, port: Option<u16>) -> Web {
        Web {
            directory: PathBuf::from(format!("/app/web/{web_type}")),
            configuration: WebConfiguration {
                web_type,
                commands: WebCommands {
                    dev: dev.to_string(),
                },
                port,
                auth_callback_path: Vec::new(),
                webhooks_path: None,
            },
        }
    }

    fn extension(id: &str, kind: &str) -> UiExtension {
        UiExtension {
            local_identifier: id.to_string(),
            title: id.to_string(),
            extension_type: kind.to_string(),
            directory: PathBuf::from(format!("/app/extensions/{id}")),
            entry_point: PathBuf::from(format!("/app/extensions/{id}/src/index.js")),
            output_bundle_path: PathBuf::from(format!("/app/extensions/{id}/dist/main.js")),
            targets: Vec::new(),
            dev_uuid: format!("dev-{id}"),
            previewable: None,
            settings: serde_json::Value::Null,
        }
    }

    fn app() -> AppModel {
        AppModel {
            directory: PathBuf::from("/app"),
            configuration: AppConfiguration {
                scopes: "write_products".to_string(),
                ..AppConfiguration::default()
            },
            ..AppModel::default()
        }
    }

    fn remote() -> RemoteApp {
        RemoteApp {
            id: "1".into(),
            title: "My app".into(),
            api_key: "key".into(),
            api_secret: Some("secret".into()),
            granted_scopes: vec!["write_products".into()],
            new_app: false,
        }
    }

    fn tunnel() -> FrontendUrl {
        FrontendUrl {
            url: "https://abc.example".into(),
            port: 4444,
            using_localhost: false,
        }
    }

    fn localhost() -> FrontendUrl {
        FrontendUrl {
            url: "http://localhost".into(),
            port: 5555,
            using_localhost: true,
        }
    }

    struct Fixture {
        app: AppModel,
        remote: RemoteApp,
        frontend: FrontendUrl,
        registrations: BTreeMap<String, ExtensionRegistration>,
        remote_app_updated: bool,
    }

    impl Fixture {
        fn new(app: AppModel, frontend: FrontendUrl) -> Self {
            Self {
                app,
                remote: remote(),
                frontend,
                registrations: BTreeMap::new(),
                remote_app_updated: false,
            }
        }

        fn assemble(&self) -> Vec<DevTarget> {
            let proxy_url = if self.frontend.using_localhost {
                "http://localhost:7777".to_string()
            } else {
                self.frontend.url.clone()
            };
            assemble_targets(&Assembly {
                app: &self.app,
                env_prefix: "SHOPIFY",
                remote_app: &self.remote,
                remote_app_updated: self.remote_app_updated,
                store_fqdn: "my-store.myshopify.com",
                frontend: &self.frontend,
                backend_port: 6000,
                proxy_url: &proxy_url,
                registrations: &self.registrations,
                checkout_cart_url: None,
                subscription_product_url: None,
                default_webhooks_path: "/api/webhooks",
                theme: None,
            })
        }
    }

    fn command(target: &DevTarget) -> &CommandPlan {
        match target.work() {
            Work::Command(plan) => plan,
            other => panic!("expected a command, got {other:?}"),
        }
    }

    #[test]
    fn tunnelled_frontend_is_the_catch_all() {
        let mut app = app();
        app.webs = vec![
            web(WebType::Backend, "npm run dev", None),
            web(WebType::Frontend, "npm run dev -- --host", Some(3000)),
        ];
        let targets = Fixture::new(app, tunnel()).assemble();

        assert_eq!(targets.len(), 2);
        let backend = &targets[0];
        assert_eq!(backend.prefix(), "backend");
        assert!(!backend.is_proxied());
        let env = &command(backend).env;
        assert_eq!(env["PORT"], "6000");
        assert_eq!(env["SERVER_PORT"], "6000");
        assert_eq!(env["BACKEND_PORT"], "6000");
        assert_eq!(env["HOST"], "https://abc.example");
        assert_eq!(env["SHOPIFY_API_KEY"], "key");
        assert_eq!(env["SHOPIFY_API_SECRET"], "secret");
        assert_eq!(env["SCOPES"], "write_products");
        assert_eq!(env["NODE_ENV"], "development");

        let DevTarget::Proxied {
            log_prefix,
            path_prefix,
            custom_port,
            work: Work::Command(plan),
        } = &targets[1]
        else {
            panic!("frontend should be proxied: {:?}", targets[1]);
        };
        assert_eq!(log_prefix, "frontend");
        assert_eq!(*path_prefix, None);
        assert_eq!(*custom_port, Some(3000));
        assert_eq!(plan.program, "npm");
        assert_eq!(plan.args, vec!["run", "dev", "--", "--host"]);
        assert_eq!(plan.cwd, PathBuf::from("/app/web/frontend"));
        assert_eq!(plan.port_vars, vec!["PORT", "FRONTEND_PORT", "SERVER_PORT"]);
        assert_eq!(plan.env["BACKEND_PORT"], "6000");
        assert_eq!(plan.env["APP_URL"], "https://abc.example");
        assert_eq!(plan.env["APP_ENV"], "development");
        assert!(!plan.env.contains_key("PORT"));
    }

    #[test]
    fn localhost_frontend_runs_on_its_own_port() {
        let mut app = app();
        app.webs = vec![web(WebType::Frontend, "npm run dev", None)];
        let targets = Fixture::new(app, localhost()).assemble();

        assert_eq!(targets.len(), 1);
        assert!(!targets[0].is_proxied());
        let plan = command(&targets[0]);
        assert!(plan.port_vars.is_empty());
        assert_eq!(plan.env["PORT"], "5555");
        assert_eq!(plan.env["FRONTEND_PORT"], "5555");
        assert_eq!(plan.env["HOST"], "http://localhost");
    }

    #[test]
    fn backend_only_has_no_proxied_targets() {
        let mut app = app();
        app.webs = vec![web(WebType::Backend, "bin/rails server", None)];
        let targets = Fixture::new(app, tunnel()).assemble();
        assert!(targets.iter().all(|target| !target.is_proxied()));
    }

    #[test]
    fn extensions_split_by_previewability() {
        let mut app = app();
        app.ui_extensions = vec![
            extension("checkout", "checkout_ui_extension"),
            extension("pixel", "web_pixel_extension"),
        ];
        let mut fixture = Fixture::new(app, localhost());
        fixture.registrations.insert(
            "pixel".into(),
            ExtensionRegistration {
                uuid: "uuid-1".into(),
                id: "42".into(),
                title: "pixel".into(),
            },
        );
        let targets = fixture.assemble();

        assert_eq!(targets.len(), 2);
        let DevTarget::Proxied {
            path_prefix,
            work: Work::ExtensionServer(server),
            ..
        } = &targets[0]
        else {
            panic!("previewable extensions should be proxied");
        };
        assert_eq!(path_prefix.as_deref(), Some("/extensions"));
        assert_eq!(server.url, "http://localhost:7777");
        assert_eq!(server.extensions.len(), 1);
        assert_eq!(server.bundle_env["APP_URL"], "http://localhost:7777");

        let Work::Drafts(drafts) = targets[1].work() else {
            panic!("non-previewable extensions should push drafts");
        };
        assert_eq!(targets[1].prefix(), "extensions");
        assert_eq!(drafts.extensions[0].registration_id.as_deref(), Some("42"));
    }

    #[test]
    fn missing_registration_is_kept_for_launch() {
        let mut app = app();
        app.ui_extensions = vec![extension("pixel", "web_pixel_extension")];
        let targets = Fixture::new(app, localhost()).assemble();
        let Work::Drafts(drafts) = targets[0].work() else {
            panic!("expected drafts");
        };
        assert_eq!(drafts.extensions[0].registration_id, None);
    }

    #[test]
    fn uninstall_webhook_follows_app_selection() {
        let mut app = app();
        let mut backend = web(WebType::Backend, "npm run dev", None);
        backend.configuration.webhooks_path = Some("/hooks".into());
        app.webs = vec![backend];

        let mut fixture = Fixture::new(app, tunnel());
        assert_eq!(fixture.assemble().len(), 1);

        fixture.remote_app_updated = true;
        let targets = fixture.assemble();
        assert_eq!(targets.len(), 2);
        let Work::UninstallWebhook(plan) = targets[1].work() else {
            panic!("expected webhook");
        };
        assert_eq!(targets[1].prefix(), "webhooks");
        assert_eq!(plan.address, "http://localhost:6000/hooks");
        assert_eq!(plan.api_secret, "secret");
    }

    #[test]
    fn uninstall_webhook_defaults_its_path() {
        let mut app = app();
        app.webs = vec![web(WebType::Backend, "npm run dev", None)];
        let mut fixture = Fixture::new(app, tunnel());
        fixture.remote_app_updated = true;
        let targets = fixture.assemble();
        let Work::UninstallWebhook(plan) = targets[1].work() else {
            panic!("expected webhook");
        };
        assert_eq!(plan.address, "http://localhost:6000/api/webhooks");
    }

    #[test]
    fn no_webhook_without_backend() {
        let mut app = app();
        app.webs = vec![web(WebType::Frontend, "npm run dev", None)];
        let mut fixture = Fixture::new(app, tunnel());
        fixture.remote_app_updated = true;
        assert!(
            fixture
                .assemble()
                .iter()
                .all(|target| !matches!(target.work(), Work::UninstallWebhook(_)))
        );
    }

    #[test]
    fn blank_dev_command_is_skipped() {
        let mut app = app();
        app.webs = vec![web(WebType::Backend, "  ", None)];
        assert!(Fixture::new(app, tunnel()).assemble().is_empty());
    }

    #[test]
    fn theme_extension_serves_with_tokens() {
        let mut app = app();
        app.theme_extensions = vec![ThemeExtension {
            local_identifier: "theme-ext".into(),
            title: "Theme ext".into(),
            directory: PathBuf::from("/app/extensions/theme-ext"),
        }];
        let mut fixture = Fixture::new(app, tunnel());
        fixture.registrations.insert(
            "theme-ext".into(),
            ExtensionRegistration {
                uuid: "uuid-t".into(),
                id: "77".into(),
                title: "Theme ext".into(),
            },
        );
        let setup = ThemeSetup {
            command: "theme-tool --quiet".into(),
            theme: "123".into(),
            generate_tmp_theme: true,
            port: Some(9293),
            env: BTreeMap::from([("SHOPIFY_SHOP".to_string(), "my-store.myshopify.com".to_string())]),
        };
        let targets = assemble_targets(&Assembly {
            app: &fixture.app,
            env_prefix: "SHOPIFY",
            remote_app: &fixture.remote,
            remote_app_updated: false,
            store_fqdn: "my-store.myshopify.com",
            frontend: &fixture.frontend,
            backend_port: 6000,
            proxy_url: "https://abc.example",
            registrations: &fixture.registrations,
            checkout_cart_url: None,
            subscription_product_url: None,
            default_webhooks_path: "/api/webhooks",
            theme: Some(&setup),
        });

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].prefix(), "extensions");
        let plan = command(&targets[0]);
        assert_eq!(plan.program, "theme-tool");
        assert_eq!(
            plan.args,
            vec![
                "--quiet",
                "extension",
                "serve",
                "/app/extensions/theme-ext",
                "--api-key",
                "key",
                "--extension-id",
                "77",
                "--extension-title",
                "theme-ext",
                "--extension-type",
                "THEME_APP_EXTENSION",
                "--theme",
                "123",
                "--port",
                "9293",
                "--generate-tmp-theme",
            ]
        );
        assert_eq!(plan.env["SHOPIFY_SHOP"], "my-store.myshopify.com");
    }
}
