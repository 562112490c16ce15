//! Extension bundling with `esbuild --watch`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use storedev_core::ToolError;
use storedev_core::ports::{BundleOutcome, BundleRequest, ExtensionBundlerPort};
use storedev_runtime::shutdown_child;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const TOOL: &str = "esbuild";

/// Turns esbuild's log into one [`BundleOutcome`] per build.
#[derive(Debug, Default)]
pub struct BuildLogParser {
    current: BundleOutcome,
}

impl BuildLogParser {
    /// Feed one log line; returns the outcome when a build just finished.
    pub fn push(&mut self, line: &str) -> Option<BundleOutcome> {
        let line = line.trim();
        if line.contains("build started") {
            self.current = BundleOutcome::default();
        } else if let Some(message) = message_after(line, "[ERROR]") {
            self.current.errors.push(message);
        } else if let Some(message) = message_after(line, "[WARNING]") {
            self.current.warnings.push(message);
        } else if line.contains("build finished") {
            return Some(std::mem::take(&mut self.current));
        }
        None
    }
}

fn message_after(line: &str, marker: &str) -> Option<String> {
    let start = line.find(marker)? + marker.len();
    Some(line[start..].trim().to_string())
}

/// Command line for a watching build of `request`.
pub fn build_args(request: &BundleRequest) -> Vec<String> {
    let mut args = vec![
        request.entry_point.display().to_string(),
        "--bundle".to_string(),
        format!("--outfile={}", request.output_path.display()),
        "--watch=forever".to_string(),
        "--log-level=info".to_string(),
        "--target=es6".to_string(),
        "--legal-comments=none".to_string(),
    ];
    if request.minify {
        args.push("--minify".to_string());
    }
    for (key, value) in &request.env {
        args.push(format!("--define:process.env.{key}={}", serde_json::Value::from(value.as_str())));
    }
    args
}

/// `esbuild` on PATH, or the copy installed in the project.
fn find_esbuild(working_dir: &Path) -> Option<PathBuf> {
    which::which(TOOL).ok().or_else(|| {
        working_dir
            .ancestors()
            .map(|dir| dir.join("node_modules").join(".bin").join(TOOL))
            .find(|candidate| candidate.is_file())
    })
}

pub struct EsbuildBundler {
    grace: Duration,
}

impl EsbuildBundler {
    pub const fn new(grace: Duration) -> Self {
        Self { grace }
    }
}

#[async_trait]
impl ExtensionBundlerPort for EsbuildBundler {
    async fn watch(
        &self,
        request: BundleRequest,
        outcomes: mpsc::UnboundedSender<BundleOutcome>,
        cancel: CancellationToken,
    ) -> Result<(), ToolError> {
        let binary = find_esbuild(&request.working_dir).ok_or_else(|| ToolError::NotFound {
            tool: TOOL.to_string(),
        })?;

        let mut command = Command::new(binary);
        command
            .args(build_args(&request))
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn().map_err(|e| ToolError::Failed {
            tool: TOOL.to_string(),
            message: e.to_string(),
        })?;
        debug!(entry = %request.entry_point.display(), "Watching extension");

        let stderr = child.stderr.take().ok_or_else(|| ToolError::Failed {
            tool: TOOL.to_string(),
            message: "stderr was not captured".to_string(),
        })?;
        let mut lines = BufReader::new(stderr).lines();
        let mut parser = BuildLogParser::default();

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    if let Err(e) = shutdown_child(&mut child, self.grace).await {
                        warn!(error = %e, "Failed to stop esbuild");
                    }
                    return Ok(());
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(outcome) = parser.push(&line) {
                            let _ = outcomes.send(outcome);
                        }
                    }
                    Ok(None) | Err(_) => {
                        let status = child.wait().await.map_err(|e| ToolError::Failed {
                            tool: TOOL.to_string(),
                            message: e.to_string(),
                        })?;
                        return Err(ToolError::Failed {
                            tool: TOOL.to_string(),
                            message: format!("watcher stopped ({status})"),
                        });
                    }
                }
            }
        }
    }
}
