//! Quick tunnels through `cloudflared`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use storedev_core::ToolError;
use storedev_core::ports::TunnelPort;
use storedev_runtime::shutdown_child;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TOOL: &str = "cloudflared";
pub const CLOUDFLARE_PROVIDER: &str = "cloudflare";

const QUICK_TUNNEL_DOMAIN: &str = ".trycloudflare.com";
/// Subdomains that belong to cloudflared itself rather than to a tunnel.
const RESERVED_SUBDOMAINS: &[&str] = &["api"];

/// Extract a quick tunnel URL from a cloudflared log line.
///
/// Only a bare `https://<name>.trycloudflare.com` counts; URLs with a path,
/// like the API endpoint quoted in request errors, do not.
pub fn extract_tunnel_url(line: &str) -> Option<&str> {
    line.match_indices("https://").find_map(|(start, scheme)| {
        let rest = &line[start..];
        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '|' | '\\'))
            .unwrap_or(rest.len());
        let url = &rest[..end];
        is_quick_tunnel_host(&url[scheme.len()..]).then_some(url)
    })
}

fn is_quick_tunnel_host(host: &str) -> bool {
    host.strip_suffix(QUICK_TUNNEL_DOMAIN).is_some_and(|name| {
        !name.is_empty()
            && !RESERVED_SUBDOMAINS.contains(&name)
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

fn failed(message: impl Into<String>) -> ToolError {
    ToolError::Failed {
        tool: TOOL.to_string(),
        message: message.into(),
    }
}

async fn read_tunnel_url(
    stderr: ChildStderr,
) -> Result<(String, BufReader<ChildStderr>), ToolError> {
    let mut reader = BufReader::new(stderr);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => return Err(failed("exited before the tunnel was ready")),
            Ok(_) => {
                if let Some(url) = extract_tunnel_url(&line) {
                    return Ok((url.to_string(), reader));
                }
            }
            Err(e) => return Err(failed(e.to_string())),
        }
    }
}

pub struct CloudflaredTunnel {
    timeout: Duration,
    grace: Duration,
}

impl CloudflaredTunnel {
    pub const fn new(timeout: Duration, grace: Duration) -> Self {
        Self { timeout, grace }
    }
}

#[async_trait]
impl TunnelPort for CloudflaredTunnel {
    async fn open(
        &self,
        provider: &str,
        port: u16,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        if provider != CLOUDFLARE_PROVIDER {
            return Err(ToolError::Unsupported {
                tool: format!("tunnel provider {provider}"),
                message: format!("only {CLOUDFLARE_PROVIDER} tunnels can be opened"),
            });
        }
        let binary = which::which(TOOL).map_err(|_| ToolError::NotFound {
            tool: TOOL.to_string(),
        })?;

        let mut command = Command::new(binary);
        command
            .args([
                "tunnel",
                "--url",
                &format!("http://localhost:{port}"),
                "--no-autoupdate",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn().map_err(|e| failed(e.to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| failed("stderr was not captured"))?;

        let (url, mut reader) = match tokio::time::timeout(self.timeout, read_tunnel_url(stderr)).await {
            Ok(Ok(ready)) => ready,
            Ok(Err(e)) => {
                let _ = shutdown_child(&mut child, self.grace).await;
                return Err(e);
            }
            Err(_elapsed) => {
                let _ = shutdown_child(&mut child, self.grace).await;
                return Err(ToolError::Timeout {
                    tool: TOOL.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
        };
        info!(%url, port, "Tunnel ready");

        // cloudflared dies of SIGPIPE if its log output stops being read.
        let grace = self.grace;
        tokio::spawn(async move {
            let mut sink = tokio::io::sink();
            tokio::select! {
                _ = tokio::io::copy(&mut reader, &mut sink) => {
                    warn!("cloudflared closed its log output");
                }
                () = cancel.cancelled() => {
                    debug!("Closing tunnel");
                }
            }
            if let Err(e) = shutdown_child(&mut child, grace).await {
                warn!(error = %e, "Failed to stop cloudflared");
            }
        });

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_found_in_the_banner() {
        let line = "2024-01-01T00:00:00Z INF |  https://fancy-rabbit.trycloudflare.com                |";
        assert_eq!(
            extract_tunnel_url(line),
            Some("https://fancy-rabbit.trycloudflare.com")
        );
    }

    #[test]
    fn other_urls_are_ignored() {
        assert_eq!(
            extract_tunnel_url("INF Visit https://www.cloudflare.com/website-terms/"),
            None
        );
        assert_eq!(extract_tunnel_url("INF Starting tunnel"), None);
        assert_eq!(
            extract_tunnel_url(
                r#"ERR Error requesting quick Tunnel error="Post \"https://api.trycloudflare.com/tunnel\": dial tcp: lookup api.trycloudflare.com: no such host""#
            ),
            None
        );
        assert_eq!(extract_tunnel_url("INF https://api.trycloudflare.com"), None);
        assert_eq!(
            extract_tunnel_url("INF https://a.b.trycloudflare.com/path"),
            None
        );
    }

    #[tokio::test]
    async fn unknown_providers_are_unsupported() {
        let tunnel = CloudflaredTunnel::new(Duration::from_secs(1), Duration::from_secs(1));
        let err = tunnel
            .open("ngrok", 3000, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Unsupported { .. }), "{err:?}");
    }
}
