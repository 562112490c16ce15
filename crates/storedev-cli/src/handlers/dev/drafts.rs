//! Draft pushing for extensions that cannot be previewed locally.
//!
//! Every extension is bundled in watch mode; each successful build is read,
//! base64-encoded and pushed as a new draft. Rejected drafts are reported on
//! stderr and the watch goes on.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use storedev_core::ports::{
    BundleOutcome, BundleRequest, ExtensionBundlerPort, ExtensionDraft, PartnersPort,
};
use storedev_core::{UiExtension, join_user_error_messages};
use storedev_runtime::{ActionContext, OutputSink};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

use super::targets::DraftPlan;

/// Watch every extension of `plan` until cancelled.
///
/// Fails before bundling anything when an extension has no remote
/// registration.
pub async fn run(
    plan: DraftPlan,
    bundler: Arc<dyn ExtensionBundlerPort>,
    partners: Arc<dyn PartnersPort>,
    token: String,
    ctx: ActionContext,
) -> anyhow::Result<()> {
    let mut watched = Vec::with_capacity(plan.extensions.len());
    for draft in plan.extensions {
        let Some(registration_id) = draft.registration_id else {
            bail!(
                "Extension {} not found on remote app.",
                draft.extension.local_identifier
            );
        };
        watched.push((draft.extension, registration_id));
    }

    let mut watches = JoinSet::new();
    for (extension, registration_id) in watched {
        let watch = DraftWatch {
            extension,
            registration_id,
            api_key: plan.api_key.clone(),
            token: token.clone(),
            bundle_env: plan.bundle_env.clone(),
            bundler: Arc::clone(&bundler),
            partners: Arc::clone(&partners),
            ctx: ctx.clone(),
        };
        watches.spawn(watch.run());
    }

    while let Some(joined) = watches.join_next().await {
        let result = joined.map_err(|e| anyhow!("Extension watcher stopped unexpectedly: {e}"));
        if let Err(e) = result.and_then(|result| result) {
            watches.abort_all();
            return Err(e);
        }
    }
    Ok(())
}

struct DraftWatch {
    extension: UiExtension,
    registration_id: String,
    api_key: String,
    token: String,
    bundle_env: BTreeMap<String, String>,
    bundler: Arc<dyn ExtensionBundlerPort>,
    partners: Arc<dyn PartnersPort>,
    ctx: ActionContext,
}

impl DraftWatch {
    async fn run(self) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = BundleRequest {
            entry_point: self.extension.entry_point.clone(),
            output_path: self.extension.output_bundle_path.clone(),
            working_dir: self.extension.directory.clone(),
            env: self.bundle_env.clone(),
            minify: false,
        };

        let watcher = self.bundler.watch(request, tx, self.ctx.cancel.clone());
        tokio::pin!(watcher);

        loop {
            tokio::select! {
                outcome = rx.recv() => match outcome {
                    Some(outcome) => self.on_build(outcome).await,
                    None => break,
                },
                result = &mut watcher => return result.map_err(Into::into),
            }
        }
        watcher.await.map_err(Into::into)
    }

    async fn on_build(&self, outcome: BundleOutcome) {
        let id = &self.extension.local_identifier;
        let stderr: &OutputSink = &self.ctx.stderr;

        if !outcome.is_success() {
            debug!(extension = %self.extension.dev_uuid, "The JavaScript bundle has an error");
            for error in &outcome.errors {
                stderr.line(error);
            }
            return;
        }
        debug!(extension = %self.extension.dev_uuid, "The JavaScript bundle has changed");

        let content = match tokio::fs::read(&self.extension.output_bundle_path).await {
            Ok(content) if content.is_empty() => return,
            Ok(content) => content,
            Err(e) => {
                stderr.line(format!(
                    "Failed to read the bundle of {id} at {}: {e}",
                    self.extension.output_bundle_path.display()
                ));
                return;
            }
        };

        let draft = ExtensionDraft {
            api_key: self.api_key.clone(),
            registration_id: self.registration_id.clone(),
            config: self.extension.deploy_config(&STANDARD.encode(content)),
        };

        match self.partners.update_extension_draft(&draft, &self.token).await {
            Ok(errors) if errors.is_empty() => {
                debug!(extension = %id, "Drafts updated successfully");
            }
            Ok(errors) => stderr.line(format!(
                "Error while updating drafts: {}",
                join_user_error_messages(&errors)
            )),
            Err(e) => stderr.line(format!("Error while updating drafts: {e}")),
        }
    }
}
