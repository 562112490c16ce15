#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]
//! `storedev` command-line interface.
//!
//! Loads a store app from disk, resolves which remote app and store the
//! session targets, and runs every web process and extension behind a single
//! reverse proxy until interrupted.

// Only the binary installs the subscriber.
use tracing_subscriber as _;

pub mod adapters;
pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{Commands, DevArgs};
pub use error::CliError;
pub use parser::Cli;
