//! Main commands enum and primary subcommands.
//!
//! This module defines the available commands for the CLI tool.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use storedev_core::DevOptions;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the app's web processes and extensions behind a local proxy
    Dev(DevArgs),
}

/// Flags of `storedev dev`.
///
/// Every flag can also be set through a `STOREDEV_FLAG_*` environment
/// variable.
#[derive(Args, Debug, Clone)]
pub struct DevArgs {
    /// The path to your app directory
    #[arg(long, env = "STOREDEV_FLAG_PATH", default_value = ".")]
    pub path: PathBuf,

    /// The API key of your app
    #[arg(long = "api-key", env = "STOREDEV_FLAG_API_KEY")]
    pub api_key: Option<String>,

    /// Store URL. Must be an existing development store
    #[arg(short = 's', long, env = "STOREDEV_FLAG_STORE")]
    pub store: Option<String>,

    /// Forget the app and store selected for this project
    #[arg(long, env = "STOREDEV_FLAG_RESET")]
    pub reset: bool,

    /// Skip updating the app URLs on the partner service
    #[arg(long = "no-update", env = "STOREDEV_FLAG_NO_UPDATE")]
    pub no_update: bool,

    /// Skip installing dependencies
    #[arg(long, env = "STOREDEV_FLAG_SKIP_DEPENDENCIES_INSTALLATION")]
    pub skip_dependencies_installation: bool,

    /// Resource URL for subscription UI extensions. Format: "/products/{productId}"
    #[arg(long, env = "STOREDEV_FLAG_SUBSCRIPTION_PRODUCT_URL")]
    pub subscription_product_url: Option<String>,

    /// Resource URL for checkout UI extensions. Format: "/cart/{productVariantID}:{productQuantity}"
    #[arg(long, env = "STOREDEV_FLAG_CHECKOUT_CART_URL")]
    pub checkout_cart_url: Option<String>,

    /// Use a custom tunnel, it must be running before executing dev. Format: "https://my-tunnel-url:port"
    #[arg(long, env = "STOREDEV_FLAG_TUNNEL_URL", conflicts_with = "no_tunnel")]
    pub tunnel_url: Option<String>,

    /// Select the tunnel provider
    #[arg(long, env = "STOREDEV_FLAG_TUNNEL_PROVIDER")]
    pub tunnel_provider: Option<String>,

    /// Serve the app on localhost instead of a public tunnel
    #[arg(long, env = "STOREDEV_FLAG_NO_TUNNEL")]
    pub no_tunnel: bool,

    /// Theme ID or name of the theme app extension host theme
    #[arg(short = 't', long, env = "STOREDEV_FLAG_THEME")]
    pub theme: Option<String>,

    /// Local port of the theme app extension development server
    #[arg(long = "theme-app-extension-port", env = "STOREDEV_FLAG_THEME_APP_EXTENSION_PORT")]
    pub theme_app_extension_port: Option<u16>,
}

impl DevArgs {
    pub fn into_options(self) -> DevOptions {
        DevOptions {
            directory: self.path,
            api_key: self.api_key,
            store_fqdn: self.store,
            reset: self.reset,
            update: !self.no_update,
            skip_dependencies_installation: self.skip_dependencies_installation,
            subscription_product_url: self.subscription_product_url,
            checkout_cart_url: self.checkout_cart_url,
            tunnel_url: self.tunnel_url,
            tunnel_provider: self.tunnel_provider,
            no_tunnel: self.no_tunnel,
            theme: self.theme,
            theme_extension_port: self.theme_app_extension_port,
        }
    }
}
