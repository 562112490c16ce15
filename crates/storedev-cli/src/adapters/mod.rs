//! Concrete implementations of the core ports.
//!
//! Nothing outside [`crate::bootstrap`] names these types; handlers only see
//! the port traits.

pub mod admin;
pub mod cloudflared;
pub mod dev_context;
pub mod env_session;
pub mod esbuild;
pub mod extension_server;
pub mod graphql;
pub mod installer;
pub mod partners;
pub mod prompt;
pub mod toml_loader;

pub use admin::{AdminDevTheme, AdminProductVariant};
pub use cloudflared::CloudflaredTunnel;
pub use dev_context::PartnersDevContext;
pub use env_session::EnvSession;
pub use esbuild::EsbuildBundler;
pub use graphql::GraphqlClient;
pub use installer::PackageManagerInstaller;
pub use partners::PartnersClient;
pub use prompt::StdinPrompt;
pub use toml_loader::TomlAppLoader;
