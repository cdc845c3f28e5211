//! Sidecar process management.
//!
//! Optional: the binaries can also attach to an already-running sidecar.
//! When a sidecar directory is configured, the process is spawned here, its
//! pino log lines are forwarded into `tracing`, and shutdown is SIGTERM
//! first, kill after a grace period.

use std::{path::PathBuf, process::Stdio, time::Duration};

use anyhow::{bail, Context, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
};
use tracing::{debug, error, info, warn};

/// Configuration for spawning the sidecar.
#[derive(Clone, Debug)]
pub struct SidecarConfig {
    /// Directory containing the sidecar package (package.json).
    pub dir: PathBuf,
    /// Port for the sidecar's WebSocket server.
    pub port: u16,
    /// Root directory for per-session credential state.
    pub auth_root: PathBuf,
}

/// Handle to a running sidecar process.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, wait up to five seconds, then kill.
    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping sidecar process");

        #[cfg(unix)]
        {
            use nix::{
                sys::signal::{kill, Signal},
                unistd::Pid,
            };

            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill().await;
        }

        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "sidecar process exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for sidecar process"),
            Err(_) => {
                warn!("sidecar did not exit in time, killing");
                let _ = self.child.kill().await;
            }
        }

        Ok(())
    }
}

/// Spawn the sidecar process and wait for it to come up.
pub async fn start(config: SidecarConfig) -> Result<SidecarProcess> {
    if !config.dir.join("package.json").exists() {
        bail!(
            "sidecar not found at {} (missing package.json)",
            config.dir.display()
        );
    }

    // Prefer a built entry point, fall back to the package root.
    let entry = if config.dir.join("dist/index.js").exists() {
        "dist/index.js"
    } else {
        "index.js"
    };

    info!(dir = %config.dir.display(), port = config.port, "starting sidecar process");

    let mut child = Command::new("node")
        .arg(entry)
        .current_dir(&config.dir)
        .env("WABOT_SIDECAR_PORT", config.port.to_string())
        .env("WABOT_AUTH_DIR", &config.auth_root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn sidecar process")?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                forward_log_line(&line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "sidecar", "{line}");
            }
        });
    }

    // Give the process a moment to fail fast (bad node, missing deps).
    tokio::time::sleep(Duration::from_millis(500)).await;
    match child.try_wait() {
        Ok(Some(status)) => bail!("sidecar exited immediately with status {status}"),
        Ok(None) => {}
        Err(e) => bail!("failed to check sidecar status: {e}"),
    }

    info!(port = config.port, "sidecar process started");
    Ok(SidecarProcess {
        child,
        port: config.port,
    })
}

/// Route one sidecar stdout line into tracing. The sidecar logs pino JSON;
/// anything else passes through at info.
fn forward_log_line(line: &str) {
    match pino_level_and_msg(line) {
        Some((level, msg)) => match level {
            10 | 20 => debug!(target: "sidecar", "{msg}"),
            30 => info!(target: "sidecar", "{msg}"),
            40 => warn!(target: "sidecar", "{msg}"),
            _ => error!(target: "sidecar", "{msg}"),
        },
        None => info!(target: "sidecar", "{line}"),
    }
}

/// Parse a pino JSON log line into (level, message).
fn pino_level_and_msg(line: &str) -> Option<(u64, String)> {
    if !line.starts_with('{') {
        return None;
    }
    let log: serde_json::Value = serde_json::from_str(line).ok()?;
    let level = log.get("level")?.as_u64()?;
    let msg = log
        .get("msg")
        .and_then(|v| v.as_str())
        .unwrap_or(line)
        .to_string();
    Some((level, msg))
}
