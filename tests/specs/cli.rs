//! CLI surface specs: help, version, and daemon-absent error paths.

use crate::prelude::*;

fn stdout_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}

fn stderr_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).to_string()
}

#[test]
fn help_describes_the_tool() {
    let dir = tempfile::tempdir().unwrap();
    let assert = pg(dir.path()).arg("--help").assert().success();
    let stdout = stdout_of(assert);
    assert!(stdout.contains("ProcessGuard"));
    assert!(stdout.contains("start"));
    assert!(stdout.contains("alerts"));
}

#[test]
fn version_prints_the_crate_version() {
    let dir = tempfile::tempdir().unwrap();
    let assert = pg(dir.path()).arg("--version").assert().success();
    assert!(stdout_of(assert).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_fails_with_usage() {
    let dir = tempfile::tempdir().unwrap();
    pg(dir.path()).arg("frobnicate").assert().failure();
}

#[test]
fn query_without_daemon_reports_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let assert = pg(dir.path()).arg("status").assert().failure();
    assert!(stderr_of(assert).contains("daemon not running"));
}

#[test]
fn stop_without_daemon_reports_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let assert = pg(dir.path()).args(["stop", "web"]).assert().failure();
    assert!(stderr_of(assert).contains("daemon not running"));
}
