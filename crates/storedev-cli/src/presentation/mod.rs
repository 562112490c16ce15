//! Shared CLI presentation utilities.
//!
//! # Guidelines
//!
//! - Keep this module format-only: no domain transforms
//! - Rendering functions return strings; only [`OutputRenderer`] prints

pub mod error_block;
pub mod output;
pub mod summary;

// Re-export commonly used items
pub use error_block::render_error_block;
pub use output::{OutputRenderer, format_line};
pub use summary::{StartupSummary, UrlsSummary, render_startup_summary};
