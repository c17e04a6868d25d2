// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawning and finding the daemon binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::client::ClientError;

/// Locate the `pgd` binary: `PG_DAEMON_BINARY` override, else next to the
/// current executable, else `$PATH`.
pub fn daemon_binary() -> PathBuf {
    if let Ok(path) = std::env::var("PG_DAEMON_BINARY") {
        return PathBuf::from(path);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("pgd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("pgd")
}

/// Start `pgd` detached and wait for its READY line.
pub async fn start_background(
    socket_path: &Path,
    timeout: Duration,
) -> Result<(), ClientError> {
    let binary = daemon_binary();
    let mut child = tokio::process::Command::new(&binary)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(format!("{}: {e}", binary.display())))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ClientError::DaemonStartFailed("no stdout pipe".to_string()))?;
    let mut lines = BufReader::new(stdout).lines();

    let ready = tokio::time::timeout(timeout, async {
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim() == "READY" {
                return true;
            }
        }
        false
    })
    .await;

    match ready {
        Ok(true) => {
            // The daemon keeps running after we exit; wait only for READY
            if socket_path.exists() {
                Ok(())
            } else {
                Err(ClientError::DaemonStartFailed(
                    "daemon reported ready but the socket is missing".to_string(),
                ))
            }
        }
        Ok(false) => {
            let detail = read_failure_detail(&mut child).await;
            Err(ClientError::DaemonStartFailed(detail))
        }
        Err(_) => Err(ClientError::DaemonStartFailed(format!(
            "timed out after {}s waiting for READY",
            timeout.as_secs()
        ))),
    }
}

async fn read_failure_detail(child: &mut tokio::process::Child) -> String {
    let mut detail = "daemon exited before READY".to_string();
    if let Some(stderr) = child.stderr.take() {
        let mut lines = BufReader::new(stderr).lines();
        if let Ok(Ok(Some(line))) = tokio::time::timeout(
            Duration::from_millis(500),
            lines.next_line(),
        )
        .await
        {
            detail = line;
        }
    }
    detail
}
