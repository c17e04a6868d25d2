// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Production OS adapter for Unix hosts.
//!
//! Children are spawned through `sh -c` in their own process group so that
//! group signals reliably reach shell wrappers and grandchildren. Per-PID
//! CPU/memory comes from a persistent `sysinfo::System` (CPU usage needs
//! refresh-to-refresh deltas); thread, fd, and socket counts come from
//! `/proc` where available.

use super::{
    Child, ChildInner, OsAdapter, OsError, SampleError, SignalKind, SpawnError, SpawnRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use pg_core::{HostMetrics, MetricSample};
use std::process::Stdio;
use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::process::Command;

#[derive(Clone)]
pub struct UnixOsAdapter {
    sys: Arc<Mutex<System>>,
}

impl UnixOsAdapter {
    pub fn new() -> Self {
        Self {
            sys: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl Default for UnixOsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OsAdapter for UnixOsAdapter {
    async fn spawn(&self, req: SpawnRequest) -> Result<Child, SpawnError> {
        if !req.cwd.is_dir() {
            return Err(SpawnError::WorkingDirMissing(
                req.cwd.display().to_string(),
            ));
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&req.command)
            .current_dir(&req.cwd)
            .envs(&req.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(req.stdout))
            .stderr(Stdio::from(req.stderr))
            // New process group; pgid == child pid
            .process_group(0);

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SpawnError::NotFound(req.command.clone()),
            std::io::ErrorKind::PermissionDenied => {
                SpawnError::PermissionDenied(req.command.clone())
            }
            _ => SpawnError::Other(e.to_string()),
        })?;

        let pid = child
            .id()
            .ok_or_else(|| SpawnError::Other("child exited before pid was read".to_string()))?;

        tracing::debug!(pid, command = %req.command, cwd = %req.cwd.display(), "spawned child");

        Ok(Child {
            pid,
            pgid: pid as i32,
            inner: ChildInner::Unix(child),
        })
    }

    async fn signal(&self, pgid: i32, kind: SignalKind) -> Result<(), OsError> {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid as NixPid;

        let sig = match kind {
            SignalKind::Term => Signal::SIGTERM,
            SignalKind::Kill => Signal::SIGKILL,
            SignalKind::Interrupt => Signal::SIGINT,
        };

        match killpg(NixPid::from_raw(pgid), sig) {
            Ok(()) => Ok(()),
            // Group already gone: the signal's purpose is served
            Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(OsError::Other(format!(
                "killpg({pgid}, {sig}) failed: {e}"
            ))),
        }
    }

    async fn wait_exit(&self, child: Child) -> Result<Option<i32>, OsError> {
        match child.inner {
            ChildInner::Unix(mut inner) => {
                let status = inner.wait().await?;
                Ok(status.code())
            }
            #[cfg(any(test, feature = "test-support"))]
            ChildInner::Fake(_) => Err(OsError::Other(
                "fake child handed to the unix adapter".to_string(),
            )),
        }
    }

    async fn sample(&self, pid: u32) -> Result<MetricSample, SampleError> {
        let (cpu_percent, rss_bytes, memory_percent) = {
            let mut sys = self.sys.lock();
            let spid = Pid::from_u32(pid);
            sys.refresh_memory();
            sys.refresh_processes(ProcessesToUpdate::Some(&[spid]), true);
            let proc_ = sys.process(spid).ok_or(SampleError::NotFound(pid))?;
            let total = sys.total_memory();
            let rss = proc_.memory();
            let mem_pct = if total > 0 {
                rss as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            (proc_.cpu_usage() as f64, rss, mem_pct)
        };

        let (threads, open_files, connections) = proc_counts(pid);

        Ok(MetricSample {
            taken_at: chrono::Utc::now(),
            cpu_percent,
            rss_bytes,
            memory_percent,
            threads,
            open_files,
            connections,
            uptime_seconds: 0.0,
        })
    }

    async fn host_metrics(&self) -> Result<HostMetrics, OsError> {
        let mut sys = self.sys.lock();
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        let total = sys.total_memory();
        let used = sys.used_memory();
        let load = System::load_average();
        Ok(HostMetrics {
            cpu_percent: sys.global_cpu_usage() as f64,
            memory_used_bytes: used,
            memory_total_bytes: total,
            memory_percent: if total > 0 {
                used as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            load_average: (load.one, load.five, load.fifteen),
            uptime_seconds: System::uptime(),
        })
    }

    async fn list_connections(&self) -> Result<Vec<(u16, u32)>, OsError> {
        tokio::task::spawn_blocking(listening_sockets)
            .await
            .map_err(|e| OsError::Other(e.to_string()))
    }
}

/// Thread, fd, and socket counts from `/proc`; zeros where unavailable.
#[cfg(target_os = "linux")]
fn proc_counts(pid: u32) -> (u32, u32, u32) {
    let threads = std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            // Fields after the parenthesized comm; num_threads is the 18th
            let rest = stat.rsplit_once(')').map(|(_, r)| r.trim().to_string())?;
            rest.split_whitespace().nth(17)?.parse::<u32>().ok()
        })
        .unwrap_or(0);

    let mut open_files = 0u32;
    let mut connections = 0u32;
    if let Ok(entries) = std::fs::read_dir(format!("/proc/{pid}/fd")) {
        for entry in entries.flatten() {
            open_files += 1;
            if let Ok(target) = std::fs::read_link(entry.path()) {
                if target.to_string_lossy().starts_with("socket:") {
                    connections += 1;
                }
            }
        }
    }

    (threads, open_files, connections)
}

#[cfg(not(target_os = "linux"))]
fn proc_counts(_pid: u32) -> (u32, u32, u32) {
    (0, 0, 0)
}

/// Listening TCP sockets as `(port, pid)`, resolved through fd inodes.
#[cfg(target_os = "linux")]
fn listening_sockets() -> Vec<(u16, u32)> {
    use std::collections::HashMap;

    // socket inode -> pid
    let mut inode_owner: HashMap<u64, u32> = HashMap::new();
    if let Ok(entries) = std::fs::read_dir("/proc") {
        for entry in entries.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_string_lossy()
                .parse::<u32>()
                .ok()
            else {
                continue;
            };
            let Ok(fds) = std::fs::read_dir(format!("/proc/{pid}/fd")) else {
                continue;
            };
            for fd in fds.flatten() {
                if let Ok(target) = std::fs::read_link(fd.path()) {
                    let target = target.to_string_lossy().to_string();
                    if let Some(inode) = target
                        .strip_prefix("socket:[")
                        .and_then(|s| s.strip_suffix(']'))
                        .and_then(|s| s.parse::<u64>().ok())
                    {
                        inode_owner.entry(inode).or_insert(pid);
                    }
                }
            }
        }
    }

    let mut out = Vec::new();
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        let Ok(contents) = std::fs::read_to_string(table) else {
            continue;
        };
        for line in contents.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            // local_address, state, inode; 0A == LISTEN
            if fields.len() < 10 || fields[3] != "0A" {
                continue;
            }
            let Some(port) = fields[1]
                .rsplit_once(':')
                .and_then(|(_, p)| u16::from_str_radix(p, 16).ok())
            else {
                continue;
            };
            let Some(pid) = fields[9]
                .parse::<u64>()
                .ok()
                .and_then(|inode| inode_owner.get(&inode).copied())
            else {
                continue;
            };
            out.push((port, pid));
        }
    }
    out
}

#[cfg(not(target_os = "linux"))]
fn listening_sockets() -> Vec<(u16, u32)> {
    Vec::new()
}

#[cfg(test)]
#[path = "unix_tests.rs"]
mod tests;
