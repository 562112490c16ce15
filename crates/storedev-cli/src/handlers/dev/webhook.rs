//! `app/uninstalled` webhook delivery to the local backend.

use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use storedev_core::ports::PartnersPort;
use storedev_runtime::ActionContext;
use tracing::debug;

use super::targets::WebhookPlan;

const UNINSTALL_TOPIC: &str = "app/uninstalled";
/// The backend may still be booting; connection failures are retried.
const DELIVERY_ATTEMPTS: u32 = 30;
const RETRY_DELAY: Duration = Duration::from_millis(500);

type HmacSha256 = Hmac<Sha256>;

/// Base64 HMAC-SHA256 of `payload` keyed with the app secret.
pub fn sign_payload(secret: &str, payload: &[u8]) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow!("Invalid webhook secret: {e}"))?;
    mac.update(payload);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Fetch a sample payload and POST it to the backend, signed.
///
/// Resolves `Ok` without delivering when the session is cancelled first.
pub async fn send_uninstall_webhook(
    plan: &WebhookPlan,
    partners: &dyn PartnersPort,
    token: &str,
    ctx: &ActionContext,
) -> anyhow::Result<()> {
    ctx.stdout.line("Sending APP_UNINSTALLED webhook to app server");

    let payload = partners
        .sample_webhook(UNINSTALL_TOPIC, &plan.api_key, token)
        .await?;
    let signature = sign_payload(&plan.api_secret, payload.as_bytes())?;
    let client = reqwest::Client::new();

    for attempt in 1..=DELIVERY_ATTEMPTS {
        let request = client
            .post(&plan.address)
            .header("content-type", "application/json")
            .header("x-shopify-topic", UNINSTALL_TOPIC)
            .header("x-shopify-shop-domain", &plan.store_fqdn)
            .header("x-shopify-hmac-sha256", &signature)
            .body(payload.clone());

        let response = tokio::select! {
            () = ctx.cancel.cancelled() => return Ok(()),
            response = request.send() => response,
        };

        match response {
            Ok(response) if response.status().is_success() => {
                ctx.stdout.line("App uninstalled");
                return Ok(());
            }
            Ok(response) => {
                bail!(
                    "App uninstall failed: {} responded with {}",
                    plan.address,
                    response.status()
                );
            }
            Err(e) if e.is_connect() && attempt < DELIVERY_ATTEMPTS => {
                debug!(attempt, address = %plan.address, "Backend not reachable yet");
                tokio::select! {
                    () = ctx.cancel.cancelled() => return Ok(()),
                    () = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
            Err(e) => {
                return Err(e).with_context(|| format!("App uninstall failed: {}", plan.address));
            }
        }
    }

    bail!("App uninstall failed: {} never became reachable", plan.address)
}
