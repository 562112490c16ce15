//! User input utilities for interactive command-line prompts.
//!
//! Every prompt reads from a `BufRead` so it can be driven by tests; the
//! stdin variants are thin wrappers.

use std::io::{self, BufRead};

use anyhow::{Context, Result, bail};

/// Prompts the user for a string input.
///
/// The prompt goes to stderr so it never mixes with process output.
/// The input is returned with whitespace trimmed.
///
/// # Errors
///
/// Returns an error if reading fails or the input is closed.
pub fn prompt_string_from<R: BufRead>(reader: &mut R, prompt: &str) -> Result<String> {
    eprintln!("{prompt}: ");

    let mut input = String::new();
    let read = reader
        .read_line(&mut input)
        .context("Failed to read user input")?;
    if read == 0 {
        bail!("Input closed before an answer was given");
    }

    Ok(input.trim().to_string())
}

/// Prompts the user to pick one of `choices`.
///
/// Each choice is `(keys, value)`; any key matches case-insensitively. Empty
/// input picks `default` when there is one. Unknown answers re-prompt.
pub fn prompt_choice_from<R: BufRead, T: Copy>(
    reader: &mut R,
    prompt: &str,
    choices: &[(&[&str], T)],
    default: Option<T>,
) -> Result<T> {
    loop {
        let input = prompt_string_from(reader, prompt)?.to_lowercase();
        if input.is_empty() {
            if let Some(default) = default {
                return Ok(default);
            }
        }
        if let Some((_, value)) = choices
            .iter()
            .find(|(keys, _)| keys.iter().any(|key| *key == input))
        {
            return Ok(*value);
        }
        eprintln!("Please enter one of the listed options.");
    }
}

/// [`prompt_choice_from`] on stdin.
pub fn prompt_choice<T: Copy>(
    prompt: &str,
    choices: &[(&[&str], T)],
    default: Option<T>,
) -> Result<T> {
    prompt_choice_from(&mut io::stdin().lock(), prompt, choices, default)
}
