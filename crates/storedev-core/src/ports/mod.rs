//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces the dev workflow expects from infrastructure:
//! remote services, the project loader, bundlers, tunnels and interactive
//! prompts. They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP client or process types in any signature
//! - Remote operations are intent-based (`update_urls`), not query-based
//! - Long-running work takes a `CancellationToken` and resolves `Ok` when cancelled

pub mod app_loader;
pub mod bundler;
pub mod dev_context;
pub mod installer;
pub mod partners;
pub mod prompt;
pub mod remote_request;
pub mod session;
pub mod store;
pub mod tunnel;

use thiserror::Error;

use crate::domain::{UserError, format_user_errors};

pub use app_loader::AppLoaderPort;
pub use bundler::{BundleOutcome, BundleRequest, ExtensionBundlerPort};
pub use dev_context::DevContextPort;
pub use installer::DependencyInstallerPort;
pub use partners::{ExtensionDraft, PartnersPort};
pub use prompt::PromptPort;
pub use remote_request::RemoteRequestPort;
pub use session::SessionPort;
pub use store::{DevThemePort, ProductVariantPort};
pub use tunnel::TunnelPort;

/// Errors from credential lookup.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No token is available for the named service.
    #[error("No {service} token available. Set {variable} and try again.")]
    MissingToken {
        service: &'static str,
        variable: &'static str,
    },
}

/// Errors from remote service calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("Service responded with {status}: {body}")]
    Status { status: u16, body: String },

    /// The response carried top-level GraphQL errors.
    #[error("Remote request failed: {0}")]
    GraphQl(String),

    /// A mutation was rejected with user errors.
    #[error("{}", format_user_errors(.0))]
    UserErrors(Vec<UserError>),

    /// The response did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// A record the caller relies on does not exist.
    #[error("{0}")]
    NotFound(String),
}

/// Errors from loading the local project.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Couldn't find an app in {0}")]
    NotFound(String),

    #[error("Invalid configuration in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
}

/// Errors from resolving the dev context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("No client ID found. Pass --api-key or link the project to an app.")]
    MissingClientId,

    #[error("No development store selected. Pass --store.")]
    MissingStore,

    #[error("Couldn't find app. Make sure you have a valid client ID.")]
    AppNotFound,

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Failed to access the project cache: {0}")]
    Cache(String),
}

/// Errors from local tooling (bundler, tunnel, package manager).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} not found on PATH")]
    NotFound { tool: String },

    #[error("{tool} failed: {message}")]
    Failed { tool: String, message: String },

    #[error("{tool} did not become ready within {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("{tool} is not supported: {message}")]
    Unsupported { tool: String, message: String },
}

/// Errors from an interactive prompt.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to read user input: {0}")]
    Input(String),
}

/// Core error type for semantic domain errors.
///
/// Adapters map this to their own error types (CLI exit codes, rendered
/// error blocks).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),

    /// Invalid user input or project configuration.
    #[error("{0}")]
    Configuration(String),

    /// Internal error (unexpected condition).
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_render_field_qualified() {
        let err = RemoteError::UserErrors(vec![
            UserError::new("bad").with_field(["input", "title"]),
            UserError::new("worse"),
        ]);
        assert_eq!(err.to_string(), "name: bad\nworse");
    }

    #[test]
    fn core_error_is_transparent() {
        let err: CoreError = ContextError::MissingStore.into();
        assert_eq!(err.to_string(), "No development store selected. Pass --store.");
    }
}
