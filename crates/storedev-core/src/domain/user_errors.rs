//! Remote mutation "user errors" and their human-readable rendering.

use serde::{Deserialize, Serialize};

/// A validation error returned by a remote mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    pub message: String,
    /// Path of the offending input field, e.g. `["input", "title"]`.
    #[serde(default)]
    pub field: Option<Vec<String>>,
}

impl UserError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    #[must_use]
    pub fn with_field<I, S>(mut self, field: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field = Some(field.into_iter().map(Into::into).collect());
        self
    }
}

/// Remote field names and the local configuration key they correspond to.
const FIELD_NAMES: &[(&str, &str)] = &[
    ("title", "name"),
    ("api_key", "client_id"),
    ("application_url", "application_url"),
    ("redirect_url_whitelist", "auth > redirect_urls"),
    ("requested_access_scopes", "access_scopes > scopes"),
    ("webhook_api_version", "webhooks > api_version"),
    ("gdpr_webhooks", "webhooks.privacy_compliance"),
    ("proxy_sub_path", "app_proxy > subpath"),
    ("proxy_sub_path_prefix", "app_proxy > prefix"),
    ("proxy_url", "app_proxy > url"),
    ("preferences_url", "app_preferences > url"),
];

fn local_field_name(field: &[String]) -> Option<String> {
    let mut segments = field.iter().map(String::as_str).peekable();
    if segments.peek() == Some(&"input") {
        segments.next();
    }
    let head = segments.next()?;
    let mapped = FIELD_NAMES
        .iter()
        .find(|(remote, _)| *remote == head)
        .map_or(head, |(_, local)| *local);

    let mut name = mapped.to_string();
    for rest in segments {
        name.push_str(" > ");
        name.push_str(rest);
    }
    Some(name)
}

/// Render user errors as one field-qualified line each.
pub fn format_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|error| {
            match error.field.as_deref().and_then(local_field_name) {
                Some(field) => format!("{field}: {}", error.message),
                None => error.message.clone(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join bare user error messages on one line.
pub fn join_user_error_messages(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|error| error.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_without_field_render_message_only() {
        let errors = vec![UserError::new("failed to update app")];
        assert_eq!(format_user_errors(&errors), "failed to update app");
    }

    #[test]
    fn fields_map_to_configuration_keys() {
        let errors = vec![
            UserError::new("I don't like this name").with_field(["input", "title"]),
            UserError::new("funny api key").with_field(["input", "api_key"]),
            UserError::new("this url is blocked").with_field(["input", "application_url"]),
            UserError::new("suspicious").with_field(["input", "redirect_url_whitelist"]),
            UserError::new("invalid scope: read_minds")
                .with_field(["input", "requested_access_scopes"]),
            UserError::new("no.").with_field(["input", "webhook_api_version"]),
            UserError::new("funny object").with_field(["input", "gdpr_webhooks"]),
            UserError::new("this url is blocked 2").with_field([
                "input",
                "gdpr_webhooks",
                "customer_deletion_url",
            ]),
            UserError::new("subpath needs to be good").with_field(["input", "proxy_sub_path"]),
            UserError::new("prefix is invalid").with_field(["input", "proxy_sub_path_prefix"]),
            UserError::new("this url is blocked 5").with_field(["input", "proxy_url"]),
            UserError::new("this url is blocked 6").with_field(["input", "preferences_url"]),
        ];

        let expected = "name: I don't like this name
client_id: funny api key
application_url: this url is blocked
auth > redirect_urls: suspicious
access_scopes > scopes: invalid scope: read_minds
webhooks > api_version: no.
webhooks.privacy_compliance: funny object
webhooks.privacy_compliance > customer_deletion_url: this url is blocked 2
app_proxy > subpath: subpath needs to be good
app_proxy > prefix: prefix is invalid
app_proxy > url: this url is blocked 5
app_preferences > url: this url is blocked 6";

        assert_eq!(format_user_errors(&errors), expected);
    }

    #[test]
    fn unknown_fields_keep_their_path() {
        let errors = vec![UserError::new("too long").with_field(["input", "handle", "value"])];
        assert_eq!(format_user_errors(&errors), "handle > value: too long");
    }

    #[test]
    fn messages_join_with_commas() {
        let errors = vec![UserError::new("first"), UserError::new("second")];
        assert_eq!(join_user_error_messages(&errors), "first, second");
    }
}
