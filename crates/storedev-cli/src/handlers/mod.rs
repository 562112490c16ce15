//! Command handlers.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that:
//!   1. Turn CLI input into domain options
//!   2. Drive the workflow through the ports held by `CliContext`
//!   3. Format output for the terminal
//!
//! Handlers should NOT construct adapters themselves; everything concrete is
//! wired in `bootstrap`.

pub mod dev;
