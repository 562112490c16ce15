//! Inputs and resolved context of a dev session.

use std::path::PathBuf;

use super::remote::RemoteApp;

/// Options accepted by the `dev` workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevOptions {
    pub directory: PathBuf,
    pub api_key: Option<String>,
    pub store_fqdn: Option<String>,
    /// Forget the cached app and store selection.
    pub reset: bool,
    /// Reconcile remote app URLs with the local public URL.
    pub update: bool,
    pub skip_dependencies_installation: bool,
    pub subscription_product_url: Option<String>,
    pub checkout_cart_url: Option<String>,
    /// Fixed public URL in the form `https://host:port`.
    pub tunnel_url: Option<String>,
    pub tunnel_provider: Option<String>,
    pub no_tunnel: bool,
    pub theme: Option<String>,
    pub theme_extension_port: Option<u16>,
}

/// Answer to "should the remote app URLs be updated".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlUpdateChoice {
    /// Update now and remember the answer.
    Always,
    Yes,
    No,
    /// Skip now and remember the answer.
    Never,
}

impl UrlUpdateChoice {
    pub const fn should_update(self) -> bool {
        matches!(self, Self::Always | Self::Yes)
    }

    /// Value to persist, if the answer is sticky.
    pub const fn remembered(self) -> Option<bool> {
        match self {
            Self::Always => Some(true),
            Self::Never => Some(false),
            Self::Yes | Self::No => None,
        }
    }
}

/// Result of context resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevContext {
    pub store_fqdn: String,
    pub remote_app: RemoteApp,
    /// The app selection changed since the last session.
    pub remote_app_updated: bool,
    /// Cached answer to the URL update question.
    pub update_urls: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_choices_are_remembered() {
        assert_eq!(UrlUpdateChoice::Always.remembered(), Some(true));
        assert_eq!(UrlUpdateChoice::Never.remembered(), Some(false));
        assert_eq!(UrlUpdateChoice::Yes.remembered(), None);
        assert!(UrlUpdateChoice::Yes.should_update());
        assert!(!UrlUpdateChoice::Never.should_update());
    }
}
