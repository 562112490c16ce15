//! Domain types for the dev workflow.

mod app;
mod dev;
mod remote;
mod surface;
mod user_errors;

pub use app::{
    AppConfiguration, AppModel, CHECKOUT_UI_EXTENSION, PREVIEWABLE_EXTENSION_TYPES,
    ThemeExtension, UiExtension, Web, WebCommands, WebConfiguration, WebType,
};
pub use dev::{DevContext, DevOptions, UrlUpdateChoice};
pub use remote::{AdminSession, AppUrls, ExtensionRegistration, RemoteApp};
pub use surface::extension_point_target_surface;
pub use user_errors::{UserError, format_user_errors, join_user_error_messages};
