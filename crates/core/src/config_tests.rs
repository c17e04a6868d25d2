// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn minimal_json_fills_defaults() {
    let cfg: ProcessConfig =
        serde_json::from_str(r#"{"name": "web", "command": "python app.py"}"#).unwrap();
    assert_eq!(cfg.name, "web");
    assert!(cfg.auto_restart);
    assert_eq!(cfg.max_restarts, 5);
    assert_eq!(cfg.restart_delay_seconds, 0.0);
    assert_eq!(cfg.cpu_threshold_percent, 90.0);
    assert_eq!(cfg.crash.max_crashes, 3);
    assert_eq!(cfg.crash.window_seconds, 60);
    assert_eq!(cfg.crash.action, CrashAction::Disable);
    assert!(cfg.depends_on.is_empty());
    cfg.validate().unwrap();
}

#[test]
fn crash_action_uses_snake_case() {
    let cfg: ProcessConfig = serde_json::from_str(
        r#"{"name": "db", "command": "postgres", "crash": {"action": "kill_dependencies"}}"#,
    )
    .unwrap();
    assert_eq!(cfg.crash.action, CrashAction::KillDependencies);
    assert_eq!(cfg.crash.action.to_string(), "kill_dependencies");
}

#[test]
fn serde_roundtrip_preserves_config() {
    let mut cfg = ProcessConfig::new("api", "node server.js");
    cfg.depends_on = vec!["db".to_string()];
    cfg.restart_delay_seconds = 1.5;
    cfg.crash.action = CrashAction::Quarantine;
    let json = serde_json::to_string(&cfg).unwrap();
    let back: ProcessConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[yare::parameterized(
    cpu_over      = { "cpu_threshold_percent", 120.0 },
    cpu_negative  = { "cpu_threshold_percent", -1.0 },
    mem_over      = { "memory_threshold_percent", 100.5 },
    mem_nan       = { "memory_threshold_percent", f64::NAN },
)]
fn threshold_out_of_range_is_rejected(field: &str, value: f64) {
    let mut cfg = ProcessConfig::new("p", "true");
    match field {
        "cpu_threshold_percent" => cfg.cpu_threshold_percent = value,
        _ => cfg.memory_threshold_percent = value,
    }
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::ThresholdOutOfRange { .. })
    ));
}

#[test]
fn empty_name_and_command_are_rejected() {
    assert_eq!(
        ProcessConfig::new("", "true").validate(),
        Err(ConfigError::EmptyName)
    );
    assert!(matches!(
        ProcessConfig::new("p", "  ").validate(),
        Err(ConfigError::EmptyCommand(_))
    ));
}

#[test]
fn path_escaping_names_are_rejected() {
    assert!(matches!(
        ProcessConfig::new("a/b", "true").validate(),
        Err(ConfigError::InvalidName(_))
    ));
    assert!(matches!(
        ProcessConfig::new("..", "true").validate(),
        Err(ConfigError::InvalidName(_))
    ));
}

#[test]
fn negative_restart_delay_is_rejected() {
    let mut cfg = ProcessConfig::new("p", "true");
    cfg.restart_delay_seconds = -0.5;
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::InvalidRestartDelay { .. })
    ));
}

#[test]
fn self_dependency_is_rejected() {
    let mut cfg = ProcessConfig::new("p", "true");
    cfg.depends_on = vec!["p".to_string()];
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::SelfDependency { .. })
    ));
}

#[test]
fn zero_window_means_unbounded() {
    let policy = CrashPolicy {
        window_seconds: 0,
        ..CrashPolicy::default()
    };
    assert!(policy.window().is_none());
    let bounded = CrashPolicy::default();
    assert_eq!(bounded.window(), Some(Duration::from_secs(60)));
}
