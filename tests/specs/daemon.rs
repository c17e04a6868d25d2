//! Daemon lifecycle specs: config validation, startup/shutdown, and a
//! small end-to-end supervise pass.

use crate::prelude::*;
use std::time::Duration;

fn stderr_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).to_string()
}

fn stdout_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}

#[test]
fn help_describes_the_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let assert = pgd(dir.path()).arg("--help").assert().success();
    let stdout = stdout_of(assert);
    assert!(stdout.contains("ProcessGuard daemon"));
    assert!(stdout.contains("PG_STATE_DIR"));
}

#[test]
fn malformed_config_refuses_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, "{this is not json").unwrap();

    let mut cmd = pgd(dir.path());
    cmd.env("PG_CONFIG", &config);
    let assert = cmd.assert().failure();
    assert!(stderr_of(assert).contains("configuration error"));
}

#[test]
fn explicit_missing_config_refuses_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = pgd(dir.path());
    cmd.env("PG_CONFIG", dir.path().join("nope.json"));
    let assert = cmd.assert().failure();
    assert!(stderr_of(assert).contains("not found"));
}

#[test]
fn cyclic_dependencies_refuse_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(
        &config,
        r#"{"processes": [
            {"name": "a", "command": "true", "depends_on": ["b"]},
            {"name": "b", "command": "true", "depends_on": ["a"]}
        ]}"#,
    )
    .unwrap();

    let mut cmd = pgd(dir.path());
    cmd.env("PG_CONFIG", &config);
    let assert = cmd.assert().failure();
    assert!(stderr_of(assert).contains("cycle"));
}

#[test]
fn daemon_serves_status_and_stops_on_command() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = spawn_daemon(dir.path());

    let assert = pg(dir.path()).arg("status").assert().success();
    let stdout = stdout_of(assert);
    assert!(stdout.contains("pgd"));
    assert!(stdout.contains("no processes registered"));

    let assert = pg(dir.path()).args(["daemon", "stop"]).assert().success();
    assert!(stdout_of(assert).contains("shutting down"));

    assert!(
        daemon.wait_for_exit(Duration::from_secs(20)),
        "daemon did not exit after stop"
    );
}

#[test]
fn supervises_a_configured_process_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"processes": [
            {"name": "echoer", "command": "echo hello-from-echoer", "auto_restart": false}
        ]}"#,
    )
    .unwrap();
    let _daemon = spawn_daemon(dir.path());

    // Registered but stopped
    let assert = pg(dir.path()).arg("status").assert().success();
    assert!(stdout_of(assert).contains("echoer"));

    pg(dir.path()).args(["start", "echoer"]).assert().success();

    // The command exits immediately; give the daemon a moment to reap it
    std::thread::sleep(Duration::from_millis(1500));

    let assert = pg(dir.path())
        .args(["logs", "echoer", "-n", "10"])
        .assert()
        .success();
    assert!(stdout_of(assert).contains("hello-from-echoer"));

    // A clean early exit still counts as a crash, with auto_restart off
    // the process holds in failed
    let assert = pg(dir.path()).args(["crashes", "echoer"]).assert().success();
    let stdout = stdout_of(assert);
    assert!(stdout.contains("1 crash(es)"), "{stdout}");

    let assert = pg(dir.path()).args(["show", "echoer"]).assert().success();
    assert!(stdout_of(assert).contains("state:     failed"));
}

#[test]
fn dependency_gate_is_enforced_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"processes": [
            {"name": "db", "command": "sleep 60"},
            {"name": "api", "command": "sleep 60", "depends_on": ["db"]}
        ]}"#,
    )
    .unwrap();
    let _daemon = spawn_daemon(dir.path());

    let assert = pg(dir.path()).args(["start", "api"]).assert().failure();
    assert!(stderr_of(assert).contains("dependency_not_ready"));

    pg(dir.path())
        .args(["start", "api", "--ignore-dependencies"])
        .assert()
        .success();

    pg(dir.path()).args(["stop", "api"]).assert().success();
}
