//! Error block printed by `main` before exiting.

use console::style;

use crate::error::CliError;

pub fn render_error_block(err: &CliError) -> String {
    let rule = "─".repeat(60);
    format!(
        "{}\n{} {}\n\n{}\n{}",
        style(&rule).red(),
        style("error").red().bold(),
        style(err.title()).bold(),
        err.message(),
        style(&rule).red(),
    )
}
