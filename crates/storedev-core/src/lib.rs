//! Core domain types and port definitions for storedev.
//!
//! This crate has no knowledge of processes, sockets or HTTP clients. It
//! describes the local app model, the records owned by remote services and the
//! traits through which the dev workflow reaches them.
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    AdminSession, AppConfiguration, AppModel, AppUrls, DevContext, DevOptions,
    ExtensionRegistration, RemoteApp, ThemeExtension, UiExtension, UrlUpdateChoice, UserError,
    Web, WebCommands, WebConfiguration, WebType, extension_point_target_surface,
    format_user_errors, join_user_error_messages,
};
pub use ports::{
    ContextError, CoreError, LoaderError, PromptError, RemoteError, SessionError, ToolError,
};
pub use settings::{Settings, SettingsError, settings_path, validate_settings};
