//! Inputs of the theme extension server: host theme and tokens.

use std::collections::BTreeMap;

use storedev_core::ports::{DevThemePort, SessionPort};
use storedev_core::{AppModel, DevOptions};

use super::DevError;
use super::targets::ThemeSetup;

/// Resolve the theme and credentials for the first theme extension.
///
/// Returns `None` when the app has no theme extension. Without `--theme` the
/// store's development theme is found or created.
#[allow(clippy::too_many_arguments)]
pub async fn theme_setup(
    app: &AppModel,
    options: &DevOptions,
    store_fqdn: &str,
    partners_token: &str,
    command: &str,
    env_prefix: &str,
    session: &dyn SessionPort,
    dev_theme: &dyn DevThemePort,
) -> Result<Option<ThemeSetup>, DevError> {
    if app.theme_extensions.is_empty() {
        return Ok(None);
    }

    let admin = session.admin_session(store_fqdn).await?;
    let (theme, generate_tmp_theme) = match &options.theme {
        Some(theme) => (theme.clone(), false),
        None => (dev_theme.find_or_create(&admin).await?, true),
    };
    let storefront_token = session.storefront_token().await?;

    let env = BTreeMap::from([
        (format!("{env_prefix}_CLI_ADMIN_AUTH_TOKEN"), admin.token),
        (format!("{env_prefix}_SHOP"), admin.store_fqdn),
        (
            format!("{env_prefix}_CLI_STOREFRONT_RENDERER_AUTH_TOKEN"),
            storefront_token,
        ),
        (format!("{env_prefix}_CLI_AUTH_TOKEN"), partners_token.to_string()),
    ]);

    Ok(Some(ThemeSetup {
        command: command.to_string(),
        theme,
        generate_tmp_theme,
        port: options.theme_extension_port,
        env,
    }))
}
