//! Shared helpers for black-box specs.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// `pg` command with an isolated state directory.
pub fn pg(state_dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("pg").unwrap();
    cmd.env("PG_STATE_DIR", state_dir);
    cmd.env_remove("PG_CONFIG");
    cmd
}

/// `pgd` command with an isolated state directory.
pub fn pgd(state_dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("pgd").unwrap();
    cmd.env("PG_STATE_DIR", state_dir);
    cmd.env_remove("PG_CONFIG");
    cmd
}

/// Running daemon; killed on drop so a failing test cannot leak it.
pub struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl DaemonGuard {
    /// Wait (bounded) for the daemon process to exit on its own.
    pub fn wait_for_exit(mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return true,
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(50))
                }
                _ => return false,
            }
        }
    }
}

/// Spawn `pgd` against `state_dir` and block until it prints READY.
pub fn spawn_daemon(state_dir: &Path) -> DaemonGuard {
    let bin = assert_cmd::cargo::cargo_bin("pgd");
    let mut child = Command::new(bin)
        .env("PG_STATE_DIR", state_dir)
        .env_remove("PG_CONFIG")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn pgd");

    let stdout = child.stdout.take().expect("stdout pipe");
    let mut lines = BufReader::new(stdout).lines();
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        assert!(Instant::now() < deadline, "pgd never printed READY");
        match lines.next() {
            Some(Ok(line)) if line.trim() == "READY" => break,
            Some(Ok(_)) => continue,
            other => panic!("pgd exited before READY: {other:?}"),
        }
    }

    DaemonGuard { child }
}
