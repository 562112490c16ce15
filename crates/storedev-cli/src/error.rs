//! CLI-specific error types and mappings.
//!
//! This module provides the error type for the CLI adapter and mappings from
//! core and workflow errors to exit codes and user-facing messages.

use storedev_core::{ContextError, CoreError};
use thiserror::Error;

use crate::handlers::dev::DevError;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Core domain error.
    #[error("{0}")]
    Core(String),

    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Invalid project, settings or port configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A child process or local tool failed.
    #[error("Process error: {0}")]
    Process(String),

    /// The partner or admin service could not be reached or refused a request.
    #[error("Remote service error: {0}")]
    Remote(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Core(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Remote(_) => 69,   // EX_UNAVAILABLE
            Self::Process(_) => 71,  // EX_OSERR
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
        }
    }

    /// Short label for the rendered error block.
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Core(_) => "Error",
            Self::Arguments(_) => "Invalid arguments",
            Self::Remote(_) => "Remote service error",
            Self::Process(_) => "Process error",
            Self::Io(_) => "IO error",
            Self::Config(_) => "Configuration error",
        }
    }

    /// Message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Core(msg)
            | Self::Arguments(msg)
            | Self::Io(msg)
            | Self::Config(msg)
            | Self::Process(msg)
            | Self::Remote(msg) => msg,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Session(e) => Self::Config(e.to_string()),
            CoreError::Remote(e) => Self::Remote(e.to_string()),
            CoreError::Loader(e) => Self::Config(e.to_string()),
            CoreError::Context(ContextError::Remote(e)) => Self::Remote(e.to_string()),
            CoreError::Context(e) => Self::Config(e.to_string()),
            CoreError::Tool(e) => Self::Process(e.to_string()),
            CoreError::Prompt(e) => Self::Io(e.to_string()),
            CoreError::Settings(e) => Self::Config(e.to_string()),
            CoreError::Configuration(msg) => Self::Config(msg),
            CoreError::Internal(msg) => Self::Core(msg),
        }
    }
}

impl From<DevError> for CliError {
    fn from(err: DevError) -> Self {
        match err {
            DevError::Session(e) => CoreError::from(e).into(),
            DevError::Context(e) => CoreError::from(e).into(),
            DevError::Loader(e) => CoreError::from(e).into(),
            DevError::Remote(e) => CoreError::from(e).into(),
            DevError::Tool(e) => CoreError::from(e).into(),
            DevError::Prompt(e) => CoreError::from(e).into(),
            DevError::Port(e) => Self::Config(e.to_string()),
            DevError::Configuration(msg) => Self::Config(msg),
            DevError::Launch(storedev_runtime::SessionError::Supervisor(e)) => {
                Self::Config(e.to_string())
            }
            DevError::Launch(storedev_runtime::SessionError::Group(e)) => {
                Self::Process(e.to_string())
            }
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<Self>() {
            Ok(cli) => return cli,
            Err(err) => err,
        };
        let err = match err.downcast::<DevError>() {
            Ok(dev) => return dev.into(),
            Err(err) => err,
        };
        let err = match err.downcast::<CoreError>() {
            Ok(core) => return core.into(),
            Err(err) => err,
        };
        match err.downcast::<std::io::Error>() {
            Ok(io) => io.into(),
            Err(err) => Self::Core(format!("{err:#}")),
        }
    }
}
