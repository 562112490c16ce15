//! Interactive prompt on the terminal.

use async_trait::async_trait;
use console::style;
use storedev_core::ports::PromptPort;
use storedev_core::{AppUrls, PromptError, UrlUpdateChoice};
use tokio::sync::oneshot;

use crate::utils::input::prompt_choice;

const URL_UPDATE_CHOICES: &[(&[&str], UrlUpdateChoice)] = &[
    (&["a", "always"], UrlUpdateChoice::Always),
    (&["y", "yes"], UrlUpdateChoice::Yes),
    (&["n", "no"], UrlUpdateChoice::No),
    (&["never"], UrlUpdateChoice::Never),
];

fn describe(urls: &AppUrls) -> String {
    let mut lines = vec![format!("  App URL:      {}", urls.application_url)];
    for redirect in &urls.redirect_url_whitelist {
        lines.push(format!("  Redirect URL: {redirect}"));
    }
    lines.join("\n")
}

/// Reads answers from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

#[async_trait]
impl PromptPort for StdinPrompt {
    async fn choose_url_update(
        &self,
        current: &AppUrls,
        proposed: &AppUrls,
    ) -> Result<UrlUpdateChoice, PromptError> {
        eprintln!("{}", style("Your app's URLs need to be updated.").bold());
        eprintln!("Current:\n{}", describe(current));
        eprintln!("New:\n{}", describe(proposed));

        // A detached thread: an interrupted session drops this future and
        // must not wait for a line that never comes.
        let (answer, answered) = oneshot::channel();
        std::thread::spawn(move || {
            let _ = answer.send(prompt_choice(
                "Update the URLs? [a]lways / [y]es / [n]o / never",
                URL_UPDATE_CHOICES,
                Some(UrlUpdateChoice::Yes),
            ));
        });
        answered
            .await
            .map_err(|e| PromptError::Input(e.to_string()))?
            .map_err(|e| PromptError::Input(e.to_string()))
    }
}
