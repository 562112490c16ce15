use storedev_core::{ContextError, LoaderError, PromptError, RemoteError, SessionError, ToolError};
use storedev_runtime::PortError;
use thiserror::Error;

/// Everything that can stop a dev session.
///
/// Variants before `Launch` happen while planning, before any process or
/// listener starts.
#[derive(Debug, Error)]
pub enum DevError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Port(#[from] PortError),

    /// Invalid flags or project configuration.
    #[error("{0}")]
    Configuration(String),

    /// The session failed after launch, or could not bind its proxy.
    #[error(transparent)]
    Launch(#[from] storedev_runtime::SessionError),
}
