//! Turn assembled [`DevTarget`]s into runnable session targets.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use storedev_core::ports::{ExtensionBundlerPort, PartnersPort};
use storedev_runtime::{ActionContext, ExecRequest, NamedAction, ProxyTarget, Target, exec};

use super::targets::{CommandPlan, DevTarget, Work};
use super::{drafts, webhook};
use crate::adapters::extension_server;

/// Collaborators the launched actions call into.
#[derive(Clone)]
pub struct LaunchDeps {
    pub bundler: Arc<dyn ExtensionBundlerPort>,
    pub partners: Arc<dyn PartnersPort>,
    pub token: String,
    /// How long a child gets between SIGTERM and SIGKILL.
    pub grace: Duration,
}

pub fn runtime_targets(targets: Vec<DevTarget>, deps: &LaunchDeps) -> Vec<Target> {
    targets
        .into_iter()
        .map(|target| runtime_target(target, deps.clone()))
        .collect()
}

fn runtime_target(target: DevTarget, deps: LaunchDeps) -> Target {
    match target {
        DevTarget::Proxied {
            log_prefix,
            path_prefix,
            custom_port,
            work,
        } => ProxyTarget::new(log_prefix, path_prefix, custom_port, move |ctx, port| {
            run_work(work, deps, ctx, Some(port))
        })
        .into(),
        DevTarget::Plain { prefix, work } => {
            NamedAction::new(prefix, move |ctx| run_work(work, deps, ctx, None)).into()
        }
    }
}

async fn run_work(
    work: Work,
    deps: LaunchDeps,
    ctx: ActionContext,
    port: Option<u16>,
) -> anyhow::Result<()> {
    match work {
        Work::Command(plan) => run_command(plan, deps.grace, ctx, port).await,
        Work::ExtensionServer(plan) => {
            let port = port.context("The extension server needs an assigned port")?;
            extension_server::serve(plan, deps.bundler, ctx, port).await
        }
        Work::Drafts(plan) => drafts::run(plan, deps.bundler, deps.partners, deps.token, ctx).await,
        Work::UninstallWebhook(plan) => {
            webhook::send_uninstall_webhook(&plan, deps.partners.as_ref(), &deps.token, &ctx).await
        }
    }
}

async fn run_command(
    plan: CommandPlan,
    grace: Duration,
    ctx: ActionContext,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut env = plan.env;
    if let Some(port) = port {
        for var in plan.port_vars {
            env.insert(var.to_string(), port.to_string());
        }
    }

    let request = ExecRequest::new(plan.program, plan.args)
        .cwd(plan.cwd)
        .envs(env)
        .grace(grace);
    exec(&request, ctx.stdout, ctx.stderr, &ctx.cancel).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use storedev_runtime::OutputMux;
    use tokio_util::sync::CancellationToken;

    use crate::testing::{FakeBundler, FakePartners};

    fn deps() -> LaunchDeps {
        LaunchDeps {
            bundler: Arc::new(FakeBundler::default()),
            partners: Arc::new(FakePartners::default()),
            token: "token".into(),
            grace: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn port_vars_receive_the_bound_port() {
        let dir = tempfile::tempdir().unwrap();
        let plan = CommandPlan {
            program: "sh".into(),
            args: vec!["-c".into(), "echo $PORT:$FRONTEND_PORT:$APP_ENV".into()],
            cwd: dir.path().to_path_buf(),
            env: BTreeMap::from([("APP_ENV".to_string(), "development".to_string())]),
            port_vars: vec!["PORT", "FRONTEND_PORT"],
        };
        let (mux, mut rx) = OutputMux::new();
        let (stdout, stderr) = mux.pair("frontend");
        let ctx = ActionContext {
            stdout,
            stderr,
            cancel: CancellationToken::new(),
        };

        run_work(Work::Command(plan), deps(), ctx, Some(4321)).await.unwrap();

        let line = rx.recv().await.unwrap();
        assert_eq!(line.text(), "4321:4321:development");
    }

    #[test]
    fn targets_keep_their_kind_and_prefix() {
        let plan = CommandPlan {
            program: "true".into(),
            args: Vec::new(),
            cwd: ".".into(),
            env: BTreeMap::new(),
            port_vars: Vec::new(),
        };
        let targets = runtime_targets(
            vec![
                DevTarget::Proxied {
                    log_prefix: "frontend".into(),
                    path_prefix: None,
                    custom_port: Some(3000),
                    work: Work::Command(plan.clone()),
                },
                DevTarget::Plain {
                    prefix: "backend".into(),
                    work: Work::Command(plan),
                },
            ],
            &deps(),
        );

        assert!(matches!(&targets[0], Target::Proxied(t) if t.custom_port == Some(3000)));
        assert_eq!(targets[1].prefix(), "backend");
        assert!(matches!(&targets[1], Target::Plain(_)));
    }
}
